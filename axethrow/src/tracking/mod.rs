//! Projectile tracking.
//!
//! [`feed`] turns console responses into position snapshots; [`tracker`]
//! turns consecutive snapshots into lifecycle events.

pub mod feed;
pub mod tracker;

pub use feed::{EntityFeed, EntitySource, Snapshot};
pub use tracker::{
    EntitySnapshot, EntityTracker, Subscription, TrackedEntity, TrackerEvent, TrackerEventKind,
};

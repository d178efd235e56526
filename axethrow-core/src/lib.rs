//! `Axethrow` Core - shared geometry, calibration and configuration types
//!
//! This crate holds everything the `axethrow` runtime needs that does not
//! touch the async runtime or the host: the segment/box intersection engine,
//! the calibration geometry captured by the setup wizard, the leaderboard,
//! and the configuration schema with its error types.

pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod leaderboard;

pub use calibration::{CalibrationGeometry, TargetFace};
pub use geometry::{Axis, Point3, Vec3, Vector3, Volume, intersect_segment_box};
pub use leaderboard::{Leaderboard, ScoreOutcome};

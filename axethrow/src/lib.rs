//! `Axethrow` - timed axe-throwing target minigame
//!
//! This library provides the projectile tracking feed, the session state
//! machine and the host bridge for running the game inside a shared,
//! mutable block-building world.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod observability;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod setup;
pub mod tracking;

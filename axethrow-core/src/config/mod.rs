//! Configuration schema
//!
//! Types deserialized from the game's YAML configuration file.

pub mod schema;

pub use schema::*;

//! Configuration module
//!
//! Loading and validation of game configuration files. The schema itself
//! lives in `axethrow-core` so it can be shared without the async stack.

pub mod loader;
pub mod validation;

pub use axethrow_core::config::schema;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::*;
pub use validation::{ValidationResult, Validator};

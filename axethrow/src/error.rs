//! Error types for `Axethrow`
//!
//! Exit codes, the top-level error type and the host bridge and storage
//! errors. Configuration errors live in `axethrow-core` and are re-exported
//! here.

use std::path::PathBuf;
use thiserror::Error;

pub use axethrow_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `Axethrow` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Host bridge error (closed channel, malformed frame)
    pub const HOST_ERROR: i32 = 4;

    /// Store error (unreadable or corrupt state file)
    pub const STORE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Axethrow` operations.
///
/// Aggregates the domain-specific errors and maps each to an exit code.
#[derive(Debug, Error)]
pub enum AxethrowError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host bridge error
    #[error(transparent)]
    Host(#[from] HostError),

    /// Persistent store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AxethrowError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Host(_) => ExitCode::HOST_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Host Errors
// ============================================================================

/// Errors raised by the host bridge: console queries and world mutations.
#[derive(Debug, Error)]
pub enum HostError {
    /// I/O error on the bridge
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A directive or message could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The bridge has shut down
    #[error("host bridge closed")]
    Closed,

    /// An inbound line exceeded the frame size limit
    #[error("frame too large: limit is {limit} bytes")]
    FrameTooLarge {
        /// Configured size limit in bytes
        limit: usize,
    },

    /// The host rejected a request
    #[error("host rejected request: {0}")]
    Rejected(String),
}

// ============================================================================
// Store Errors
// ============================================================================

/// Errors raised by the persistent key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the store file
    #[error("store I/O error on {path}: {source}")]
    Io {
        /// Path to the store file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Stored content is not valid JSON for the expected type
    #[error("corrupt store {path}: {source}")]
    Corrupt {
        /// Path to the store file
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Axethrow` operations.
pub type Result<T> = std::result::Result<T, AxethrowError>;

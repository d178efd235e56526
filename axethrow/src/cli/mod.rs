//! Command-line interface
//!
//! Argument definitions and command handlers for the `axethrow` binary.

pub mod args;
pub mod commands;

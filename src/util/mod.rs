//! Shared utilities: constants, configuration, error types, and timestamp
//! helpers.

pub mod config;
pub mod constants;
pub mod error;
pub mod time;

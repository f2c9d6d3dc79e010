//! siemview library crate.
//!
//! Re-exports the core modules so that integration tests and the binary
//! can access them. The command-line entry point is in `main.rs`.

pub mod core;
pub mod export;
pub mod util;

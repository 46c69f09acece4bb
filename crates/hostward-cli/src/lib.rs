//! # hostward-cli
//!
//! Command-line front end for hostward.
//!
//! ## Features
//!
//! - **Progressive assessment**: one spinner per category while probes run
//! - **Machine-readable reports**: JSON and YAML with node identity
//! - **Signature inspection**: the embedded denylist, its version and digest
//!
//! Exit status is the worst classification seen: 0 passed, 1 warning,
//! 2 failed. Errors exit with [`EXIT_ERROR`].

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;

/// Exit status for usage and runtime errors.
pub const EXIT_ERROR: u8 = 3;

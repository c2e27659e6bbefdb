//! Shared utilities for rowbridge CLI binaries.
//!
//! Holds the pieces every binary needs before it touches a channel: the
//! `--log-level` argument and the stderr logging setup.

pub mod args;
pub mod logging;

pub use args::LogLevel;
pub use logging::init_logging;

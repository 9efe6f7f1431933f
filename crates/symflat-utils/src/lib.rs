//! # symflat Utilities
//!
//! Shared utilities for the symflat workspace.
//!
//! The core library only emits `tracing` events; this crate owns subscriber
//! setup, so binaries and tests choose how logs are formatted and where they
//! go.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with, LogFormat, LogLevel, LoggingConfig, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};

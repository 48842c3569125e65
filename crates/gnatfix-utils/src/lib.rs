//! # gnatfix Utilities
//!
//! Shared helpers for gnatfix binaries, chiefly logging setup on top of
//! `tracing`.

pub mod logging;

pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};

//! Common infrastructure for the doorcam stack
//!
//! Shared by every crate in the workspace:
//!
//! - `errors`: the base error type and context helpers
//! - `logging`: tracing subscriber setup

pub mod errors;
pub mod logging;

pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

//! Error types shared across the doorcam crates

pub mod types;
pub mod context;

pub use types::{Error, Result};
pub use context::{ErrorContext, ErrorExt};

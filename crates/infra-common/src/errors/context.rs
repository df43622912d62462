use crate::errors::types::{Error, Result};
use std::fmt;

/// Context information for an error
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Component where the error occurred
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional context information
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        ErrorContext {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    /// Add details to the context
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in component '{}' during operation '{}'", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Extension trait for adding context to errors
pub trait ErrorExt<T> {
    /// Add context to an error
    fn context(self, ctx: ErrorContext) -> Result<T>;

    /// Add simple context with component and operation
    fn with_context<S: Into<String>, U: Into<String>>(
        self,
        component: S,
        operation: U,
    ) -> Result<T>;
}

impl Error {
    /// Wrap this error with context, keeping configuration errors recognisable
    pub fn in_context(self, ctx: &ErrorContext) -> Error {
        match self {
            Error::Config(msg) => Error::Config(format!("{} [{}]", msg, ctx)),
            Error::Internal(msg) => Error::Internal(format!("{} [{}]", msg, ctx)),
            other => Error::Custom(format!("{} [{}]", other, ctx)),
        }
    }
}

impl<T, E> ErrorExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, ctx: ErrorContext) -> Result<T> {
        self.map_err(|e| e.into().in_context(&ctx))
    }

    fn with_context<S: Into<String>, U: Into<String>>(
        self,
        component: S,
        operation: U,
    ) -> Result<T> {
        self.context(ErrorContext::new(component, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("platform", "load").with_details("cameras[0]");
        assert_eq!(
            ctx.to_string(),
            "in component 'platform' during operation 'load' (cameras[0])"
        );
    }

    #[test]
    fn test_config_error_keeps_variant() {
        let result: std::result::Result<(), Error> = Err(Error::config("missing source"));
        let err = result.with_context("platform", "load").unwrap_err();
        match err {
            Error::Config(msg) => {
                assert!(msg.starts_with("missing source"));
                assert!(msg.contains("platform"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_io_error_becomes_custom() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.with_context("snapshot", "read").unwrap_err();
        assert!(matches!(err, Error::Custom(_)));
        assert!(err.to_string().contains("gone"));
    }
}

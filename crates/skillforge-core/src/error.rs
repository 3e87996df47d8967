//! Domain error types.

use thiserror::Error;

/// Top-level error type shared by the event bus, dead-letter queue and
/// registrars.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A caller supplied an argument the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record exists but is in a state that forbids the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Create an `InvalidArgument` error from a message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an `Infrastructure` error from a message.
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category_prefix() {
        assert_eq!(
            DomainError::invalid_argument("handler name must not be empty").to_string(),
            "invalid argument: handler name must not be empty"
        );
        assert_eq!(
            DomainError::NotFound("dead letter entry 42".into()).to_string(),
            "not found: dead letter entry 42"
        );
        assert_eq!(
            DomainError::infrastructure("connection refused").to_string(),
            "infrastructure error: connection refused"
        );
    }
}

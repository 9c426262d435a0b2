//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Raised by value constructors when input does not validate.
/// Authentication failures have their own taxonomy in `quizgate-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            DomainError::validation("username too short").to_string(),
            "validation failed: username too short"
        );
        assert_eq!(DomainError::invalid_id("nope").to_string(), "invalid identifier: nope");
    }
}

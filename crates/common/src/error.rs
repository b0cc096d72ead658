//! Common error types for Huddle components.

use thiserror::Error;

/// Errors produced when parsing externally supplied identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Identifier was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Identifier exceeded the maximum length.
    #[error("{kind} exceeds {max} characters")]
    TooLong {
        /// Which identifier was rejected.
        kind: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// Identifier contained a character outside the accepted set.
    #[error("{0} contains invalid characters")]
    InvalidCharacters(&'static str),

    /// Identifier was not a valid UUID.
    #[error("{0} is not a valid UUID")]
    NotUuid(&'static str),
}

/// Result type alias using `IdError`
pub type Result<T> = std::result::Result<T, IdError>;

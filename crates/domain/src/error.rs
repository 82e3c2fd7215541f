//! Domain error types.

use common::IdError;
use thiserror::Error;

/// Errors raised while validating domain input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A caller-supplied identifier is malformed.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// A required field was not supplied.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field value is outside what the domain accepts.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

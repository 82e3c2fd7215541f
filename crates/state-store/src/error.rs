use common::ResumptionToken;
use thiserror::Error;

/// Errors that can occur when interacting with the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Errors specific to resolving an approval.
#[derive(Debug, Error)]
pub enum ApprovalStoreError {
    /// No record exists for the token.
    #[error("No pending approval for token {0}")]
    NotFound(ResumptionToken),

    /// The record was already resolved by an earlier decision.
    #[error("Approval {0} was already resolved")]
    AlreadyResolved(ResumptionToken),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for ApprovalStoreError {
    fn from(err: sqlx::Error) -> Self {
        ApprovalStoreError::Store(StoreError::Database(err))
    }
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

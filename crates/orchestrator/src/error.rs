//! Orchestrator error types.

use common::{IdError, ResumptionToken};
use domain::{DomainError, IntentStatus};
use state_store::{ApprovalStoreError, StoreError};
use thiserror::Error;

/// Errors reported by the external payment processor boundary.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor has no object with this identifier.
    #[error("No such object: {0}")]
    NotFound(String),

    /// Transport, authentication, or processor-side failure.
    #[error("Payment processor error: {0}")]
    Upstream(String),

    /// The call did not complete within the configured bound.
    #[error("Payment processor call timed out")]
    Timeout,
}

/// A downstream collaborator (CRM, access provisioning, scheduler, notifier) failed.
#[derive(Debug, Error)]
#[error("{service} failed: {reason}")]
pub struct ServiceError {
    pub service: &'static str,
    pub reason: String,
}

impl ServiceError {
    pub fn new(service: &'static str, reason: impl Into<String>) -> Self {
        Self {
            service,
            reason: reason.into(),
        }
    }
}

/// Errors returned by the payment orchestration operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed identifier or missing field; rejected before any external call.
    #[error("Invalid input: {0}")]
    Input(String),

    /// The processor has no intent with this identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The intent is not in a state this operation accepts.
    #[error("Invalid state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: IntentStatus,
        actual: IntentStatus,
    },

    /// The processor or network failed; safe to retry.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The idempotency store failed.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

impl From<IdError> for OrchestratorError {
    fn from(err: IdError) -> Self {
        OrchestratorError::Input(err.to_string())
    }
}

impl From<DomainError> for OrchestratorError {
    fn from(err: DomainError) -> Self {
        OrchestratorError::Input(err.to_string())
    }
}

impl From<ProcessorError> for OrchestratorError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::NotFound(id) => OrchestratorError::NotFound(id),
            other => OrchestratorError::Upstream(other.to_string()),
        }
    }
}

/// Errors from the approval workflow controller.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No suspension exists for the token.
    #[error("No pending approval for {0}")]
    NotFound(ResumptionToken),

    /// A decision was already delivered for the token.
    #[error("Approval {0} was already resolved")]
    AlreadyResolved(ResumptionToken),

    /// Another workflow instance is already suspended on the token.
    #[error("A workflow is already waiting on {0}")]
    AlreadyPending(ResumptionToken),

    /// The caller-supplied deadline elapsed; the approval stays pending.
    #[error("Timed out waiting for a decision on {0}")]
    TimedOut(ResumptionToken),

    /// The waiter was dropped before a decision arrived.
    #[error("Suspension on {0} was interrupted")]
    Interrupted(ResumptionToken),

    /// The split payment identifier was empty.
    #[error("Invalid input: {0}")]
    Input(#[from] IdError),

    /// The approval store failed.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ApprovalStoreError> for ApprovalError {
    fn from(err: ApprovalStoreError) -> Self {
        match err {
            ApprovalStoreError::NotFound(token) => ApprovalError::NotFound(token),
            ApprovalStoreError::AlreadyResolved(token) => ApprovalError::AlreadyResolved(token),
            ApprovalStoreError::Store(e) => ApprovalError::Store(e),
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

use std::time::Duration;

use async_trait::async_trait;
use common::{PaymentIntentId, ResumptionToken};
use domain::{Decision, SplitPaymentApproval};

use crate::error::{ApprovalStoreError, Result};

/// Identifies one externally-visible effect for one payment intent.
///
/// Derived from the intent id and the action name, so every delivery of the
/// same payment event computes the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    intent_id: PaymentIntentId,
    action: String,
}

impl IdempotencyKey {
    pub fn new(intent_id: &PaymentIntentId, action: impl Into<String>) -> Self {
        Self {
            intent_id: intent_id.clone(),
            action: action.into(),
        }
    }

    pub fn intent_id(&self) -> &PaymentIntentId {
        &self.intent_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.intent_id, self.action)
    }
}

/// How an attempt to claim a key ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now holds the claim and must perform the effect.
    Acquired,
    /// Another delivery holds the claim and has not finished its effect.
    InFlight,
    /// The effect behind the key already completed.
    Completed,
}

/// Lifecycle of a held claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    InFlight,
    Completed,
}

/// Durable claims guarding externally-visible effects.
///
/// A claim is taken before the effect runs and is either completed after it
/// succeeds or released after it fails. All implementations must be
/// thread-safe (Send + Sync) and `try_claim` must be an atomic check-and-set:
/// under concurrent calls for the same key, exactly one caller observes
/// `Acquired`.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Claims the key.
    ///
    /// An in-flight claim older than `stale_after` belongs to a delivery that
    /// crashed or hung; it is taken over and reported as `Acquired`.
    async fn try_claim(&self, key: &IdempotencyKey, stale_after: Duration) -> Result<ClaimOutcome>;

    /// Marks the effect behind a held claim as done. Completed claims are never
    /// released or taken over.
    async fn complete(&self, key: &IdempotencyKey) -> Result<()>;

    /// Gives an in-flight claim back so a later delivery can perform the effect.
    ///
    /// Releasing an unclaimed or completed key is not an error and changes nothing.
    async fn release(&self, key: &IdempotencyKey) -> Result<()>;

    /// Returns the state of the claim on the key, if any.
    async fn claim_state(&self, key: &IdempotencyKey) -> Result<Option<ClaimState>>;
}

/// Result of registering a suspension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInsert {
    /// No record existed; a pending one was created.
    Created(SplitPaymentApproval),
    /// A record already existed and was left untouched.
    Existing(SplitPaymentApproval),
}

/// Durable approval state keyed by resumption token.
///
/// Resolved records are retained so a repeated decision can be reported as
/// `AlreadyResolved` rather than `NotFound`.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Creates a pending record unless one already exists for the token.
    async fn insert_pending(&self, token: &ResumptionToken) -> Result<PendingInsert>;

    /// Atomically moves a pending record to resolved with `decision`.
    async fn resolve(
        &self,
        token: &ResumptionToken,
        decision: &Decision,
    ) -> std::result::Result<SplitPaymentApproval, ApprovalStoreError>;

    /// Loads the record for a token.
    async fn get(&self, token: &ResumptionToken) -> Result<Option<SplitPaymentApproval>>;

    /// Lists pending records, oldest first.
    async fn list_pending(&self) -> Result<Vec<SplitPaymentApproval>>;
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ResumptionToken;
use domain::{Decision, SplitPaymentApproval};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    ApprovalStoreError, Result,
    store::{
        ApprovalStore, ClaimOutcome, ClaimState, IdempotencyKey, IdempotencyStore, PendingInsert,
    },
};

#[derive(Debug, Clone, Copy)]
struct Claim {
    claimed_at: Instant,
    completed: bool,
}

/// In-memory state store for tests and development.
///
/// Provides the same atomicity as the PostgreSQL implementation within one
/// process: every check-and-set runs under a single write lock.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    claims: Arc<RwLock<HashMap<IdempotencyKey, Claim>>>,
    approvals: Arc<RwLock<HashMap<ResumptionToken, SplitPaymentApproval>>>,
}

impl InMemoryStateStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of held idempotency claims, in flight or completed.
    pub async fn claim_count(&self) -> usize {
        self.claims.read().await.len()
    }

    /// Returns the number of approval records, pending or resolved.
    pub async fn approval_count(&self) -> usize {
        self.approvals.read().await.len()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStateStore {
    async fn try_claim(&self, key: &IdempotencyKey, stale_after: Duration) -> Result<ClaimOutcome> {
        let mut claims = self.claims.write().await;
        match claims.get_mut(key) {
            Some(claim) if claim.completed => Ok(ClaimOutcome::Completed),
            Some(claim) if claim.claimed_at.elapsed() < stale_after => Ok(ClaimOutcome::InFlight),
            Some(claim) => {
                tracing::warn!(key = %key, "taking over stale idempotency claim");
                claim.claimed_at = Instant::now();
                Ok(ClaimOutcome::Acquired)
            }
            None => {
                claims.insert(
                    key.clone(),
                    Claim {
                        claimed_at: Instant::now(),
                        completed: false,
                    },
                );
                Ok(ClaimOutcome::Acquired)
            }
        }
    }

    async fn complete(&self, key: &IdempotencyKey) -> Result<()> {
        if let Some(claim) = self.claims.write().await.get_mut(key) {
            claim.completed = true;
        }
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<()> {
        let mut claims = self.claims.write().await;
        if claims.get(key).is_some_and(|claim| !claim.completed) {
            claims.remove(key);
        }
        Ok(())
    }

    async fn claim_state(&self, key: &IdempotencyKey) -> Result<Option<ClaimState>> {
        Ok(self.claims.read().await.get(key).map(|claim| {
            if claim.completed {
                ClaimState::Completed
            } else {
                ClaimState::InFlight
            }
        }))
    }
}

#[async_trait]
impl ApprovalStore for InMemoryStateStore {
    async fn insert_pending(&self, token: &ResumptionToken) -> Result<PendingInsert> {
        let mut approvals = self.approvals.write().await;
        if let Some(existing) = approvals.get(token) {
            return Ok(PendingInsert::Existing(existing.clone()));
        }
        let record = SplitPaymentApproval::pending(token.clone());
        approvals.insert(token.clone(), record.clone());
        Ok(PendingInsert::Created(record))
    }

    async fn resolve(
        &self,
        token: &ResumptionToken,
        decision: &Decision,
    ) -> std::result::Result<SplitPaymentApproval, ApprovalStoreError> {
        let mut approvals = self.approvals.write().await;
        let record = approvals
            .get_mut(token)
            .ok_or_else(|| ApprovalStoreError::NotFound(token.clone()))?;

        if record.is_resolved() {
            return Err(ApprovalStoreError::AlreadyResolved(token.clone()));
        }

        record.resolve(decision.clone());
        Ok(record.clone())
    }

    async fn get(&self, token: &ResumptionToken) -> Result<Option<SplitPaymentApproval>> {
        Ok(self.approvals.read().await.get(token).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<SplitPaymentApproval>> {
        let approvals = self.approvals.read().await;
        let mut pending: Vec<_> = approvals
            .values()
            .filter(|a| !a.is_resolved())
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }
}

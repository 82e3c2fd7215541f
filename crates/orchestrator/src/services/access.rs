//! Access provisioning for purchased programs and memberships.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::PaymentIntentId;
use domain::PaymentIntent;

use crate::error::ServiceError;

/// What kind of access was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Program,
    Membership,
}

/// Trait for the system that unlocks purchased content.
#[async_trait]
pub trait AccessProvisioner: Send + Sync {
    /// Grants access to the program bought with this intent.
    async fn grant_program_access(&self, intent: &PaymentIntent) -> Result<(), ServiceError>;

    /// Provisions the recurring membership bought with this intent.
    async fn grant_membership_access(&self, intent: &PaymentIntent) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryAccessState {
    grants: Vec<(PaymentIntentId, AccessKind)>,
    fail: bool,
    delay: Option<Duration>,
}

/// In-memory access provisioner that records every grant.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessProvisioner {
    state: Arc<RwLock<InMemoryAccessState>>,
}

impl InMemoryAccessProvisioner {
    /// Creates a new in-memory provisioner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every grant to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Makes every grant sleep before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Number of grants of `kind` performed for `intent_id`.
    pub fn grant_count(&self, intent_id: &PaymentIntentId, kind: AccessKind) -> usize {
        self.state
            .read()
            .unwrap()
            .grants
            .iter()
            .filter(|(id, k)| id == intent_id && *k == kind)
            .count()
    }

    /// Total grants performed.
    pub fn total_grants(&self) -> usize {
        self.state.read().unwrap().grants.len()
    }

    async fn record(&self, intent: &PaymentIntent, kind: AccessKind) -> Result<(), ServiceError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(ServiceError::new("access", "provisioning backend unavailable"));
        }
        state.grants.push((intent.id.clone(), kind));
        Ok(())
    }
}

#[async_trait]
impl AccessProvisioner for InMemoryAccessProvisioner {
    async fn grant_program_access(&self, intent: &PaymentIntent) -> Result<(), ServiceError> {
        self.record(intent, AccessKind::Program).await
    }

    async fn grant_membership_access(&self, intent: &PaymentIntent) -> Result<(), ServiceError> {
        self.record(intent, AccessKind::Membership).await
    }
}

//! CRM contact synchronisation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::PaymentIntentId;
use domain::{FunnelType, PaymentIntent};

use crate::error::ServiceError;

/// Trait for the CRM that tracks paying customers.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Creates or updates the contact behind this intent, tagged with the funnel.
    async fn upsert_contact(
        &self,
        intent: &PaymentIntent,
        funnel: FunnelType,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCrmState {
    upserts: Vec<(PaymentIntentId, FunnelType)>,
    fail: bool,
}

/// In-memory CRM that records every upsert.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCrmClient {
    state: Arc<RwLock<InMemoryCrmState>>,
}

impl InMemoryCrmClient {
    /// Creates a new in-memory CRM.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every upsert to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Number of upserts performed for `intent_id`.
    pub fn upsert_count(&self, intent_id: &PaymentIntentId) -> usize {
        self.state
            .read()
            .unwrap()
            .upserts
            .iter()
            .filter(|(id, _)| id == intent_id)
            .count()
    }
}

#[async_trait]
impl CrmClient for InMemoryCrmClient {
    async fn upsert_contact(
        &self,
        intent: &PaymentIntent,
        funnel: FunnelType,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(ServiceError::new("crm", "CRM unavailable"));
        }
        state.upserts.push((intent.id.clone(), funnel));
        Ok(())
    }
}

//! Payment processor boundary and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{PaymentIntentId, SetupIntentId};
use domain::{Metadata, PaymentIntent};

use crate::error::ProcessorError;

/// Trait for the external payment processor.
///
/// The metadata write is a wholesale replace, not a partial patch; callers
/// that must preserve existing keys merge before writing.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Retrieves a payment intent by id.
    async fn retrieve_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Replaces the intent's metadata with exactly `metadata`.
    async fn replace_payment_intent_metadata(
        &self,
        id: &PaymentIntentId,
        metadata: &Metadata,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Retrieves the client secret of a setup intent.
    async fn retrieve_setup_intent_client_secret(
        &self,
        id: &SetupIntentId,
    ) -> Result<String, ProcessorError>;
}

#[derive(Debug, Default)]
struct InMemoryProcessorState {
    intents: HashMap<PaymentIntentId, PaymentIntent>,
    setup_secrets: HashMap<SetupIntentId, String>,
    retrieve_calls: usize,
    replace_calls: usize,
    fail_upstream: bool,
    delay: Option<Duration>,
}

/// In-memory payment processor for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<RwLock<InMemoryProcessorState>>,
}

impl InMemoryPaymentProcessor {
    /// Creates a new empty processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or overwrites a payment intent.
    pub fn insert_intent(&self, intent: PaymentIntent) {
        self.state
            .write()
            .unwrap()
            .intents
            .insert(intent.id.clone(), intent);
    }

    /// Seeds a setup intent's client secret.
    pub fn insert_setup_intent(&self, id: SetupIntentId, client_secret: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .setup_secrets
            .insert(id, client_secret.into());
    }

    /// Returns the stored copy of an intent.
    pub fn intent(&self, id: &PaymentIntentId) -> Option<PaymentIntent> {
        self.state.read().unwrap().intents.get(id).cloned()
    }

    /// Configures every call to fail with an upstream error.
    pub fn set_fail_upstream(&self, fail: bool) {
        self.state.write().unwrap().fail_upstream = fail;
    }

    /// Makes every call sleep before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Number of intent retrievals served.
    pub fn retrieve_calls(&self) -> usize {
        self.state.read().unwrap().retrieve_calls
    }

    /// Number of metadata replacements served.
    pub fn replace_calls(&self) -> usize {
        self.state.read().unwrap().replace_calls
    }

    async fn simulate_latency(&self) -> Result<(), ProcessorError> {
        let (delay, fail) = {
            let state = self.state.read().unwrap();
            (state.delay, state.fail_upstream)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ProcessorError::Upstream(
                "processor unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn retrieve_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<PaymentIntent, ProcessorError> {
        self.simulate_latency().await?;
        let mut state = self.state.write().unwrap();
        state.retrieve_calls += 1;
        state
            .intents
            .get(id)
            .cloned()
            .ok_or_else(|| ProcessorError::NotFound(id.to_string()))
    }

    async fn replace_payment_intent_metadata(
        &self,
        id: &PaymentIntentId,
        metadata: &Metadata,
    ) -> Result<PaymentIntent, ProcessorError> {
        self.simulate_latency().await?;
        let mut state = self.state.write().unwrap();
        state.replace_calls += 1;
        let intent = state
            .intents
            .get_mut(id)
            .ok_or_else(|| ProcessorError::NotFound(id.to_string()))?;
        intent.metadata = metadata.clone();
        Ok(intent.clone())
    }

    async fn retrieve_setup_intent_client_secret(
        &self,
        id: &SetupIntentId,
    ) -> Result<String, ProcessorError> {
        self.simulate_latency().await?;
        self.state
            .read()
            .unwrap()
            .setup_secrets
            .get(id)
            .cloned()
            .ok_or_else(|| ProcessorError::NotFound(id.to_string()))
    }
}

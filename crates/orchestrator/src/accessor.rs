//! Intent accessor: validated, time-bounded reads and merged metadata writes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::{ClientSecretTarget, PaymentIntentId};
use domain::{Metadata, PaymentIntent, merge};

use crate::error::{ProcessorError, Result};
use crate::services::processor::PaymentProcessor;

/// Front door to the payment processor.
///
/// Identifiers are validated before any network call, and every call is
/// bounded by the configured timeout.
#[derive(Clone)]
pub struct IntentAccessor {
    processor: Arc<dyn PaymentProcessor>,
    timeout: Duration,
}

impl IntentAccessor {
    pub fn new(processor: Arc<dyn PaymentProcessor>, timeout: Duration) -> Self {
        Self { processor, timeout }
    }

    /// Retrieves an intent by its raw identifier.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, raw_id: &str) -> Result<PaymentIntent> {
        let id = PaymentIntentId::parse(raw_id)?;
        self.retrieve_by_id(&id).await
    }

    pub async fn retrieve_by_id(&self, id: &PaymentIntentId) -> Result<PaymentIntent> {
        Ok(self
            .bounded(self.processor.retrieve_payment_intent(id))
            .await?)
    }

    /// Merges `patch` into the intent's current metadata and writes the result.
    ///
    /// The processor replaces metadata wholesale, so the current map is read
    /// first. Returns the metadata as written.
    #[tracing::instrument(skip(self, patch), fields(keys = patch.len()))]
    pub async fn update_metadata(&self, raw_id: &str, patch: &Metadata) -> Result<Metadata> {
        let id = PaymentIntentId::parse(raw_id)?;
        let current = self.retrieve_by_id(&id).await?;
        let merged = merge(&current.metadata, patch);

        let updated = self
            .bounded(self.processor.replace_payment_intent_metadata(&id, &merged))
            .await?;

        tracing::debug!(
            before = current.metadata.len(),
            after = updated.metadata.len(),
            "metadata merged"
        );
        Ok(merged)
    }

    /// Returns the client secret of a payment intent or setup intent.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_client_secret(&self, raw_id: &str) -> Result<String> {
        match ClientSecretTarget::parse(raw_id)? {
            ClientSecretTarget::PaymentIntent(id) => {
                let intent = self.retrieve_by_id(&id).await?;
                intent.client_secret.ok_or_else(|| {
                    ProcessorError::Upstream(format!("payment intent {id} has no client secret"))
                        .into()
                })
            }
            ClientSecretTarget::SetupIntent(id) => Ok(self
                .bounded(self.processor.retrieve_setup_intent_client_secret(&id))
                .await?),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, ProcessorError>>,
    ) -> std::result::Result<T, ProcessorError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProcessorError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::services::processor::InMemoryPaymentProcessor;
    use common::SetupIntentId;
    use domain::IntentStatus;

    fn setup() -> (IntentAccessor, InMemoryPaymentProcessor) {
        let processor = InMemoryPaymentProcessor::new();
        let accessor = IntentAccessor::new(Arc::new(processor.clone()), Duration::from_millis(200));
        (accessor, processor)
    }

    fn intent(id: &str, metadata: &[(&str, &str)]) -> PaymentIntent {
        PaymentIntent {
            id: PaymentIntentId::parse(id).unwrap(),
            status: IntentStatus::Succeeded,
            amount: 1000,
            currency: "usd".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            client_secret: Some(format!("{id}_secret_abc")),
        }
    }

    #[tokio::test]
    async fn malformed_id_makes_no_call() {
        let (accessor, processor) = setup();

        let result = accessor.retrieve("seti_123").await;

        assert!(matches!(result, Err(OrchestratorError::Input(_))));
        assert_eq!(processor.retrieve_calls(), 0);
    }

    #[tokio::test]
    async fn missing_intent_is_not_found() {
        let (accessor, _) = setup();
        let result = accessor.retrieve("pi_missing").await;
        assert!(matches!(result, Err(OrchestratorError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_preserves_unrelated_keys() {
        let (accessor, processor) = setup();
        processor.insert_intent(intent(
            "pi_1",
            &[("funnel_type", "coaching"), ("customer_email", "a@b.com")],
        ));

        let patch = Metadata::from([("billing_city".to_string(), "LA".to_string())]);
        let merged = accessor.update_metadata("pi_1", &patch).await.unwrap();

        let stored = processor
            .intent(&PaymentIntentId::parse("pi_1").unwrap())
            .unwrap();
        assert_eq!(stored.metadata, merged);
        assert_eq!(stored.metadata["funnel_type"], "coaching");
        assert_eq!(stored.metadata["customer_email"], "a@b.com");
        assert_eq!(stored.metadata["billing_city"], "LA");
    }

    #[tokio::test]
    async fn slow_processor_times_out_as_upstream() {
        let (accessor, processor) = setup();
        processor.insert_intent(intent("pi_1", &[]));
        processor.set_delay(Some(Duration::from_secs(5)));

        let result = accessor.retrieve("pi_1").await;
        assert!(matches!(result, Err(OrchestratorError::Upstream(_))));
    }

    #[tokio::test]
    async fn client_secret_for_both_intent_kinds() {
        let (accessor, processor) = setup();
        processor.insert_intent(intent("pi_1", &[]));
        processor.insert_setup_intent(SetupIntentId::parse("seti_1").unwrap(), "seti_1_secret");

        assert_eq!(
            accessor.retrieve_client_secret("pi_1").await.unwrap(),
            "pi_1_secret_abc"
        );
        assert_eq!(
            accessor.retrieve_client_secret("seti_1").await.unwrap(),
            "seti_1_secret"
        );
    }

    #[tokio::test]
    async fn client_secret_rejects_subscription_ids() {
        let (accessor, _) = setup();
        let result = accessor.retrieve_client_secret("sub_1").await;
        assert!(matches!(result, Err(OrchestratorError::Input(_))));
    }
}

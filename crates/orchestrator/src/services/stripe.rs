//! HTTP client for a Stripe-compatible payment processor API.

use std::time::Duration;

use async_trait::async_trait;
use common::{PaymentIntentId, SetupIntentId};
use domain::{Metadata, PaymentIntent};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ProcessorError;
use crate::services::processor::PaymentProcessor;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetupIntentBody {
    client_secret: Option<String>,
}

/// Payment processor backed by the processor's REST API.
#[derive(Debug, Clone)]
pub struct HttpPaymentProcessor {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentProcessor {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProcessorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessorError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        object_id: &str,
    ) -> Result<T, ProcessorError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(map_transport_error);
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| status.to_string());

        if status == StatusCode::NOT_FOUND {
            return Err(ProcessorError::NotFound(object_id.to_string()));
        }
        Err(ProcessorError::Upstream(format!("{status}: {message}")))
    }
}

fn map_transport_error(err: reqwest::Error) -> ProcessorError {
    if err.is_timeout() {
        ProcessorError::Timeout
    } else {
        ProcessorError::Upstream(err.to_string())
    }
}

/// Encodes metadata in the processor's bracketed form fields.
fn metadata_form(metadata: &Metadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
        .collect()
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn retrieve_payment_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<PaymentIntent, ProcessorError> {
        let request = self
            .client
            .get(self.url(&format!("/v1/payment_intents/{id}")));
        self.send(request, id.as_str()).await
    }

    async fn replace_payment_intent_metadata(
        &self,
        id: &PaymentIntentId,
        metadata: &Metadata,
    ) -> Result<PaymentIntent, ProcessorError> {
        let request = self
            .client
            .post(self.url(&format!("/v1/payment_intents/{id}")))
            .form(&metadata_form(metadata));
        self.send(request, id.as_str()).await
    }

    async fn retrieve_setup_intent_client_secret(
        &self,
        id: &SetupIntentId,
    ) -> Result<String, ProcessorError> {
        let request = self.client.get(self.url(&format!("/v1/setup_intents/{id}")));
        let body: SetupIntentBody = self.send(request, id.as_str()).await?;
        body.client_secret
            .ok_or_else(|| ProcessorError::Upstream(format!("setup intent {id} has no client secret")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_encoded_as_bracketed_fields() {
        let metadata = Metadata::from([
            ("billing_city".to_string(), "LA".to_string()),
            ("funnel_type".to_string(), "coaching".to_string()),
        ]);

        assert_eq!(
            metadata_form(&metadata),
            vec![
                ("metadata[billing_city]".to_string(), "LA".to_string()),
                ("metadata[funnel_type]".to_string(), "coaching".to_string()),
            ]
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let processor =
            HttpPaymentProcessor::new("http://localhost:1234/", "sk_test", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            processor.url("/v1/payment_intents/pi_1"),
            "http://localhost:1234/v1/payment_intents/pi_1"
        );
    }
}

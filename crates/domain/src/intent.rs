//! Payment intent as read from the payment processor.

use common::PaymentIntentId;
use serde::{Deserialize, Serialize};

use crate::metadata::{Metadata, keys};

/// Status of a payment intent.
///
/// The processor reports several "waiting on someone" statuses; they all
/// collapse into `RequiresAction` since none of them permits dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[serde(
        alias = "requires_payment_method",
        alias = "requires_confirmation",
        alias = "requires_capture"
    )]
    RequiresAction,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentStatus {
    /// Returns the status name as the processor spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
            IntentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment attempt tracked by the processor.
///
/// Owned by the processor; this system reads it and writes its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub status: IntentStatus,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
}

impl PaymentIntent {
    /// Returns true once the processor has captured the payment.
    pub fn is_succeeded(&self) -> bool {
        self.status == IntentStatus::Succeeded
    }

    /// Returns the declared funnel, falling back to the legacy `type` key.
    pub fn funnel_type(&self) -> Option<&str> {
        self.metadata
            .get(keys::FUNNEL_TYPE)
            .or_else(|| self.metadata.get(keys::LEGACY_TYPE))
            .map(String::as_str)
    }

    /// Returns a non-empty metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the customer email recorded at checkout.
    pub fn customer_email(&self) -> Option<&str> {
        self.metadata_value(keys::CUSTOMER_EMAIL)
    }
}

//! Checkout-side signals: billing address, cart contents, and cart recovery.

use domain::{
    BillingAddress, CustomerInfo, IntentStatus, Metadata, add_ons_patch, metadata::keys,
    parse_add_ons,
};
use serde::Serialize;

use crate::accessor::IntentAccessor;
use crate::error::Result;
use crate::notify::NotificationFacade;
use crate::services::notifier::{Notification, NotificationKind};

/// Everything the client needs to resume an abandoned checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    pub payment_intent_id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    pub funnel_type: Option<String>,
    pub customer: CustomerInfo,
    pub add_ons: Vec<String>,
    pub client_secret: Option<String>,
}

/// Metadata writes and reads issued by the checkout flow.
#[derive(Clone)]
pub struct CheckoutService {
    accessor: IntentAccessor,
    notifications: NotificationFacade,
}

impl CheckoutService {
    pub fn new(accessor: IntentAccessor, notifications: NotificationFacade) -> Self {
        Self {
            accessor,
            notifications,
        }
    }

    /// Records the billing address on the intent, keeping all other metadata.
    #[tracing::instrument(skip(self, address))]
    pub async fn update_billing_address(
        &self,
        raw_id: &str,
        address: &BillingAddress,
    ) -> Result<Metadata> {
        self.accessor
            .update_metadata(raw_id, &address.to_metadata_patch())
            .await
    }

    /// Records the cart's add-ons on the intent, keeping all other metadata.
    #[tracing::instrument(skip(self, add_ons), fields(count = add_ons.len()))]
    pub async fn update_cart(&self, raw_id: &str, add_ons: &[String]) -> Result<Metadata> {
        self.accessor
            .update_metadata(raw_id, &add_ons_patch(add_ons))
            .await
    }

    /// Reads back what was captured for an intent so checkout can resume.
    #[tracing::instrument(skip(self))]
    pub async fn recover(&self, raw_id: &str) -> Result<RecoveryInfo> {
        let intent = self.accessor.retrieve(raw_id).await?;

        let info = RecoveryInfo {
            payment_intent_id: intent.id.to_string(),
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency.clone(),
            funnel_type: intent.funnel_type().map(String::from),
            customer: CustomerInfo::from_intent(&intent),
            add_ons: intent
                .metadata
                .get(keys::ADD_ONS)
                .map(|raw| parse_add_ons(raw))
                .unwrap_or_default(),
            client_secret: intent.client_secret.clone(),
        };

        self.notifications.notify(
            Notification::new(NotificationKind::CartRecovery, "Checkout recovery requested")
                .field("payment_intent", info.payment_intent_id.as_str())
                .field("status", info.status.as_str())
                .field("email", info.customer.email.clone().unwrap_or_default())
                .field("add_ons", info.add_ons.join(", ")),
        );

        Ok(info)
    }

    /// Returns the client secret for a payment or setup intent the caller already knows.
    pub async fn client_secret(&self, raw_id: &str) -> Result<String> {
        self.accessor.retrieve_client_secret(raw_id).await
    }
}

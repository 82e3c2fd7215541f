//! Cart recovery: customer details and add-ons kept in intent metadata.

use serde::{Deserialize, Serialize};

use crate::intent::PaymentIntent;
use crate::metadata::{Metadata, keys};

/// Customer details captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl CustomerInfo {
    /// Extracts customer details from an intent's metadata.
    pub fn from_intent(intent: &PaymentIntent) -> Self {
        Self {
            email: intent.metadata_value(keys::CUSTOMER_EMAIL).map(String::from),
            name: intent.metadata_value(keys::CUSTOMER_NAME).map(String::from),
            phone: intent.metadata_value(keys::CUSTOMER_PHONE).map(String::from),
        }
    }
}

/// Parses the comma-separated add-ons field, dropping blank entries.
pub fn parse_add_ons(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Encodes add-ons back into the comma-separated metadata form.
pub fn join_add_ons<S: AsRef<str>>(add_ons: &[S]) -> String {
    add_ons
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the metadata patch that records the cart's add-ons.
pub fn add_ons_patch<S: AsRef<str>>(add_ons: &[S]) -> Metadata {
    Metadata::from([(keys::ADD_ONS.to_string(), join_add_ons(add_ons))])
}

//! Billing address value object.

use serde::{Deserialize, Serialize};

use crate::metadata::{Metadata, keys};

/// Billing address collected after payment.
///
/// Has no lifecycle of its own: it only exists as a metadata patch. Missing
/// fields are written as empty strings so a later update clears stale values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingAddress {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "postalCode")]
    pub postal_code: String,
    pub country: String,
}

impl BillingAddress {
    /// Builds the metadata patch for this address, one `billing_*` key per field.
    pub fn to_metadata_patch(&self) -> Metadata {
        [
            (keys::BILLING_LINE1, &self.line1),
            (keys::BILLING_LINE2, &self.line2),
            (keys::BILLING_CITY, &self.city),
            (keys::BILLING_STATE, &self.state),
            (keys::BILLING_POSTAL_CODE, &self.postal_code),
            (keys::BILLING_COUNTRY, &self.country),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.trim().to_string()))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_contains_every_field() {
        let address = BillingAddress {
            city: "LA".to_string(),
            ..Default::default()
        };

        let patch = address.to_metadata_patch();
        assert_eq!(patch.len(), 6);
        assert_eq!(patch[keys::BILLING_CITY], "LA");
        assert_eq!(patch[keys::BILLING_COUNTRY], "");
        assert_eq!(patch[keys::BILLING_LINE2], "");
    }

    #[test]
    fn missing_json_fields_default_to_empty() {
        let address: BillingAddress = serde_json::from_str(r#"{"city":"LA"}"#).unwrap();
        assert_eq!(address.city, "LA");
        assert_eq!(address.country, "");
    }

    #[test]
    fn postal_code_accepts_camel_case() {
        let address: BillingAddress = serde_json::from_str(r#"{"postalCode":"90001"}"#).unwrap();
        assert_eq!(address.postal_code, "90001");
    }
}

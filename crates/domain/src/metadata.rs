//! Payment intent metadata and the merge engine.
//!
//! The processor's metadata update replaces the whole map, so every write this
//! system performs goes through [`merge`] first. Values are always strings;
//! numbers and booleans are encoded as strings by the checkout flow.

use std::collections::BTreeMap;

/// String-to-string metadata attached to a payment intent.
pub type Metadata = BTreeMap<String, String>;

/// Well-known metadata keys written by the checkout flow.
pub mod keys {
    /// Selects which funnel handler processes the intent.
    pub const FUNNEL_TYPE: &str = "funnel_type";
    /// Older checkouts wrote the funnel under this key.
    pub const LEGACY_TYPE: &str = "type";
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const CUSTOMER_PHONE: &str = "customer_phone";
    /// Comma-separated list of add-on identifiers in the cart.
    pub const ADD_ONS: &str = "add_ons";

    pub const BILLING_LINE1: &str = "billing_line1";
    pub const BILLING_LINE2: &str = "billing_line2";
    pub const BILLING_CITY: &str = "billing_city";
    pub const BILLING_STATE: &str = "billing_state";
    pub const BILLING_POSTAL_CODE: &str = "billing_postal_code";
    pub const BILLING_COUNTRY: &str = "billing_country";
}

/// Computes the next metadata map from the current one and a patch.
///
/// Keys in `patch` overwrite `current`; keys only in `current` are kept
/// untouched; keys only in `patch` are added. There is no deletion: clearing
/// a field means writing an empty string for it.
pub fn merge(current: &Metadata, patch: &Metadata) -> Metadata {
    let mut next = current.clone();
    for (key, value) in patch {
        next.insert(key.clone(), value.clone());
    }
    next
}

//! Property tests for the metadata merge engine.

use std::collections::BTreeSet;

use domain::{BillingAddress, Metadata, merge};
use proptest::prelude::*;

fn metadata_strategy() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-z_]{1,12}", "[ -~]{0,24}", 0..16)
}

proptest! {
    #[test]
    fn keys_only_in_current_are_unchanged(current in metadata_strategy(), patch in metadata_strategy()) {
        let merged = merge(&current, &patch);
        for (key, value) in &current {
            if !patch.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    #[test]
    fn patch_values_always_win(current in metadata_strategy(), patch in metadata_strategy()) {
        let merged = merge(&current, &patch);
        for (key, value) in &patch {
            prop_assert_eq!(merged.get(key), Some(value));
        }
    }

    #[test]
    fn key_count_is_size_of_union(current in metadata_strategy(), patch in metadata_strategy()) {
        let merged = merge(&current, &patch);
        let union: BTreeSet<&String> = current.keys().chain(patch.keys()).collect();
        prop_assert_eq!(merged.len(), union.len());
    }

    #[test]
    fn merge_is_idempotent(current in metadata_strategy(), patch in metadata_strategy()) {
        let once = merge(&current, &patch);
        let twice = merge(&once, &patch);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn billing_patch_never_drops_funnel_type(
        current in metadata_strategy(),
        funnel in "[a-z_]{1,16}",
        city in "[A-Za-z ]{0,16}",
    ) {
        let mut current = current;
        current.insert("funnel_type".to_string(), funnel.clone());
        let address = BillingAddress { city, ..Default::default() };

        let merged = merge(&current, &address.to_metadata_patch());
        prop_assert_eq!(merged.get("funnel_type"), Some(&funnel));
    }
}

#[test]
fn billing_update_scenario_keeps_funnel_type() {
    let current = Metadata::from([("funnel_type".to_string(), "coaching".to_string())]);
    let address = BillingAddress {
        city: "LA".to_string(),
        ..Default::default()
    };

    let merged = merge(&current, &address.to_metadata_patch());

    assert_eq!(merged["funnel_type"], "coaching");
    assert_eq!(merged["billing_city"], "LA");
    assert_eq!(merged["billing_country"], "");
    assert_eq!(merged.len(), 7);
}

//! Shared identifier types for the payment orchestration system.

pub mod types;

pub use types::{
    ClientSecretTarget, IdError, PAYMENT_INTENT_PREFIX, PaymentIntentId, ResumptionToken,
    SETUP_INTENT_PREFIX, SPLIT_PAYMENT_NAMESPACE, SUBSCRIPTION_PREFIX, SetupIntentId,
    SubscriptionId,
};

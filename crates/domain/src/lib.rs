//! Domain layer for post-payment orchestration.
//!
//! This crate is pure: it performs no I/O. It provides
//! - the payment intent model as read from the processor
//! - the metadata merge engine used by every metadata write
//! - the funnel classifier and the dispatch result type
//! - billing address and cart recovery value objects
//! - the split payment approval record

pub mod approval;
pub mod billing;
pub mod error;
pub mod funnel;
pub mod intent;
pub mod metadata;
pub mod recovery;

pub use approval::{ApprovalState, Decision, SplitPaymentApproval};
pub use billing::BillingAddress;
pub use error::DomainError;
pub use funnel::{Classification, FailedAction, FunnelDispatchResult, FunnelType, classify};
pub use intent::{IntentStatus, PaymentIntent};
pub use metadata::{Metadata, merge};
pub use recovery::{CustomerInfo, add_ons_patch, join_add_ons, parse_add_ons};

//! HTTP route handlers.

pub mod approvals;
pub mod health;
pub mod metrics;
pub mod payments;

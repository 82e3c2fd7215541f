//! Durable state for post-payment orchestration.
//!
//! Two concerns live here: idempotency claims keyed by (intent id, action)
//! and approval suspensions keyed by resumption token. Both have an
//! in-memory implementation for tests and development and a PostgreSQL
//! implementation for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{ApprovalStoreError, Result, StoreError};
pub use memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;
pub use store::{
    ApprovalStore, ClaimOutcome, ClaimState, IdempotencyKey, IdempotencyStore, PendingInsert,
};

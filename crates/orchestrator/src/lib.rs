//! Post-payment orchestration.
//!
//! This crate turns payment-completion signals into bounded, idempotent
//! downstream actions and runs workflows that pause for a human decision:
//!
//! 1. [`IntentAccessor`] reads intents and writes merged metadata
//! 2. [`FunnelDispatcher`] classifies a succeeded intent and runs its funnel handler
//! 3. [`ApprovalController`] suspends on a resumption token until a decision arrives
//! 4. [`NotificationFacade`] tells operators what happened, on a best-effort basis

pub mod accessor;
pub mod approval;
pub mod checkout;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod services;
pub mod workflow;

pub use accessor::IntentAccessor;
pub use approval::{ApprovalController, SuspensionHandle};
pub use checkout::{CheckoutService, RecoveryInfo};
pub use dispatcher::{FunnelDispatcher, FunnelServices};
pub use error::{ApprovalError, OrchestratorError, ProcessorError, Result, ServiceError};
pub use handlers::{ActionOutcome, ActionRunner, DEFAULT_CLAIM_TTL, FunnelHandler};
pub use notify::{NotificationFacade, NotifyConfig, NotifyStats};
pub use services::{
    AccessKind, AccessProvisioner, CoachingScheduler, CrmClient, HttpPaymentProcessor,
    InMemoryAccessProvisioner, InMemoryCoachingScheduler, InMemoryCrmClient, InMemoryNotifier,
    InMemoryPaymentProcessor, LogNotifier, Notification, NotificationKind, Notifier,
    PaymentProcessor, WebhookNotifier,
};
pub use workflow::{ApprovalRun, SplitPaymentWorkflow};

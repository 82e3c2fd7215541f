//! External collaborator traits with in-memory and HTTP implementations.

pub mod access;
pub mod coaching;
pub mod crm;
pub mod notifier;
pub mod processor;
pub mod stripe;

pub use access::{AccessKind, AccessProvisioner, InMemoryAccessProvisioner};
pub use coaching::{CoachingScheduler, InMemoryCoachingScheduler};
pub use crm::{CrmClient, InMemoryCrmClient};
pub use notifier::{
    InMemoryNotifier, LogNotifier, Notification, NotificationKind, Notifier, WebhookNotifier,
};
pub use processor::{InMemoryPaymentProcessor, PaymentProcessor};
pub use stripe::HttpPaymentProcessor;

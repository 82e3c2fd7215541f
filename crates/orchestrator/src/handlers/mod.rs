//! Funnel handlers.
//!
//! Each handler turns a succeeded intent into its funnel's fixed action list.
//! Every action runs behind an idempotency claim on (intent id, action), so a
//! redelivered webhook reports the same actions without repeating effects.

pub mod coaching;
pub mod enrollment;
pub mod membership;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::PaymentIntentId;
use domain::{FunnelDispatchResult, FunnelType, IntentStatus, PaymentIntent};
use state_store::{ClaimOutcome, IdempotencyKey, IdempotencyStore};

use crate::error::{OrchestratorError, Result, ServiceError};
use crate::notify::NotificationFacade;
use crate::services::notifier::{Notification, NotificationKind};

pub use coaching::CoachingHandler;
pub use enrollment::EnrollmentProgramHandler;
pub use membership::MembershipHandler;

/// How long an in-flight claim is honoured before another delivery may take it over.
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(300);

/// How one guarded action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The claim was won and the effect succeeded.
    Performed,
    /// An earlier delivery completed the effect.
    AlreadyDone,
    /// Another delivery holds the claim and has not finished; the caller
    /// should retry.
    InProgress,
    /// The effect or the claim itself failed; the claim is not held.
    Failed(String),
}

impl ActionOutcome {
    fn label(&self) -> &'static str {
        match self {
            ActionOutcome::Performed => "performed",
            ActionOutcome::AlreadyDone => "skipped",
            ActionOutcome::InProgress => "in_progress",
            ActionOutcome::Failed(_) => "failed",
        }
    }

    /// Folds this outcome into a dispatch result.
    ///
    /// Only completed effects count as taken; an action still running on
    /// another delivery is reported as not complete.
    pub fn record(self, action: &str, result: &mut FunnelDispatchResult) {
        match self {
            ActionOutcome::Performed | ActionOutcome::AlreadyDone => result.record_taken(action),
            ActionOutcome::InProgress => {
                result.record_failed(action, "in progress on another delivery")
            }
            ActionOutcome::Failed(reason) => result.record_failed(action, reason),
        }
    }
}

/// Runs externally visible effects at most once per (intent, action).
#[derive(Clone)]
pub struct ActionRunner {
    store: Arc<dyn IdempotencyStore>,
    claim_ttl: Duration,
}

impl ActionRunner {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self::with_claim_ttl(store, DEFAULT_CLAIM_TTL)
    }

    /// Uses `claim_ttl` as the age after which an unfinished claim is stale.
    pub fn with_claim_ttl(store: Arc<dyn IdempotencyStore>, claim_ttl: Duration) -> Self {
        Self { store, claim_ttl }
    }

    /// Claims the key and runs `effect`.
    ///
    /// The claim is completed when the effect succeeds and released when it
    /// fails, so only finished effects are ever reported as done.
    #[tracing::instrument(skip(self, effect), fields(intent_id = %intent_id))]
    pub async fn run<F, Fut>(
        &self,
        intent_id: &PaymentIntentId,
        action: &'static str,
        effect: F,
    ) -> ActionOutcome
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<(), ServiceError>> + Send,
    {
        let key = IdempotencyKey::new(intent_id, action);

        let outcome = match self.store.try_claim(&key, self.claim_ttl).await {
            Ok(ClaimOutcome::Completed) => {
                tracing::debug!("action already completed");
                ActionOutcome::AlreadyDone
            }
            Ok(ClaimOutcome::InFlight) => {
                tracing::info!("action in progress on another delivery");
                ActionOutcome::InProgress
            }
            Err(e) => {
                tracing::error!(error = %e, "idempotency claim failed");
                ActionOutcome::Failed("idempotency store unavailable".to_string())
            }
            Ok(ClaimOutcome::Acquired) => match effect().await {
                Ok(()) => {
                    if let Err(e) = self.store.complete(&key).await {
                        // The claim goes stale and a later delivery repeats the effect.
                        tracing::error!(error = %e, "failed to mark action complete");
                    }
                    ActionOutcome::Performed
                }
                Err(e) => {
                    tracing::warn!(error = %e, "action failed, releasing claim");
                    if let Err(release) = self.store.release(&key).await {
                        tracing::error!(error = %release, "failed to release idempotency claim");
                    }
                    ActionOutcome::Failed(e.to_string())
                }
            },
        };

        metrics::counter!(
            "funnel_action_total",
            "action" => action,
            "outcome" => outcome.label()
        )
        .increment(1);
        outcome
    }
}

/// Rejects intents that have not completed payment.
pub fn ensure_succeeded(intent: &PaymentIntent) -> Result<()> {
    if intent.is_succeeded() {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidState {
            expected: IntentStatus::Succeeded,
            actual: intent.status,
        })
    }
}

/// Shared capability of the three funnel handlers.
#[async_trait]
pub trait FunnelHandler: Send + Sync {
    fn funnel(&self) -> FunnelType;

    fn runner(&self) -> &ActionRunner;

    /// Performs the effect behind one of this funnel's actions.
    async fn perform(
        &self,
        action: &'static str,
        intent: &PaymentIntent,
    ) -> std::result::Result<(), ServiceError>;

    /// Runs every action of the funnel in order.
    ///
    /// A failing action does not stop the ones after it; completed actions are
    /// never rolled back.
    async fn handle(&self, intent: &PaymentIntent) -> Result<FunnelDispatchResult> {
        ensure_succeeded(intent)?;

        let mut result = FunnelDispatchResult::new();
        for &action in self.funnel().actions() {
            self.runner()
                .run(&intent.id, action, || self.perform(action, intent))
                .await
                .record(action, &mut result);
        }
        Ok(result)
    }
}

/// Effect of the `notify_ops` action shared by every funnel.
pub(crate) fn notify_ops(
    notifications: &NotificationFacade,
    funnel: FunnelType,
    intent: &PaymentIntent,
) -> std::result::Result<(), ServiceError> {
    notifications.notify(
        Notification::new(
            NotificationKind::PaymentSucceeded,
            format!("New {funnel} purchase"),
        )
        .field("payment_intent", intent.id.as_str())
        .field("amount", format!("{} {}", intent.amount, intent.currency))
        .field("email", intent.customer_email().unwrap_or_default()),
    );
    Ok(())
}

pub(crate) fn unsupported(funnel: FunnelType, action: &str) -> ServiceError {
    ServiceError::new("handler", format!("{funnel} has no action '{action}'"))
}

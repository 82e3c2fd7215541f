//! Post-payment dispatch: classify a succeeded intent and run its funnel handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::PaymentIntentId;
use domain::{Classification, FunnelDispatchResult, FunnelType, PaymentIntent, classify};
use state_store::IdempotencyStore;

use crate::accessor::IntentAccessor;
use crate::error::{OrchestratorError, Result};
use crate::handlers::{
    ActionRunner, CoachingHandler, EnrollmentProgramHandler, FunnelHandler, MembershipHandler,
    ensure_succeeded,
};
use crate::notify::NotificationFacade;
use crate::services::notifier::{Notification, NotificationKind};
use crate::services::{AccessProvisioner, CoachingScheduler, CrmClient};

/// Collaborators the funnel handlers act on.
#[derive(Clone)]
pub struct FunnelServices {
    pub idempotency: Arc<dyn IdempotencyStore>,
    /// Age after which an unfinished action claim is taken over.
    pub claim_ttl: Duration,
    pub access: Arc<dyn AccessProvisioner>,
    pub crm: Arc<dyn CrmClient>,
    pub scheduler: Arc<dyn CoachingScheduler>,
    pub notifications: NotificationFacade,
}

/// Routes succeeded intents to exactly one funnel handler.
pub struct FunnelDispatcher {
    accessor: IntentAccessor,
    notifications: NotificationFacade,
    enrollment: EnrollmentProgramHandler,
    membership: MembershipHandler,
    coaching: CoachingHandler,
}

impl FunnelDispatcher {
    pub fn new(accessor: IntentAccessor, services: FunnelServices) -> Self {
        let runner = ActionRunner::with_claim_ttl(services.idempotency, services.claim_ttl);

        Self {
            enrollment: EnrollmentProgramHandler::new(
                runner.clone(),
                services.access.clone(),
                services.crm.clone(),
                services.notifications.clone(),
            ),
            membership: MembershipHandler::new(
                runner.clone(),
                services.access,
                services.notifications.clone(),
            ),
            coaching: CoachingHandler::new(
                runner,
                services.scheduler,
                services.crm,
                services.notifications.clone(),
            ),
            notifications: services.notifications,
            accessor,
        }
    }

    /// Handles a post-payment signal for a raw intent id.
    ///
    /// Upstream failures are surfaced to operators before being returned, since
    /// the caller is usually a webhook retry loop nobody is watching.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, raw_id: &str) -> Result<FunnelDispatchResult> {
        let id = PaymentIntentId::parse(raw_id)?;

        let intent = match self.accessor.retrieve_by_id(&id).await {
            Ok(intent) => intent,
            Err(err) => {
                if let OrchestratorError::Upstream(reason) = &err {
                    self.notifications.notify(
                        Notification::new(
                            NotificationKind::WebhookFailure,
                            "Post-payment dispatch could not load intent",
                        )
                        .field("payment_intent", id.as_str())
                        .field("error", reason.as_str()),
                    );
                }
                return Err(err);
            }
        };

        self.dispatch_intent(&intent).await
    }

    /// Dispatches an already retrieved intent.
    #[tracing::instrument(skip(self, intent), fields(intent_id = %intent.id))]
    pub async fn dispatch_intent(&self, intent: &PaymentIntent) -> Result<FunnelDispatchResult> {
        ensure_succeeded(intent)?;
        let start = Instant::now();

        let classification = classify(intent);
        let result = match classification {
            Classification::Unclassified(_) => {
                let reason = classification.skipped_reason().unwrap_or_default();
                tracing::info!(reason = %reason, "dispatch skipped");
                metrics::counter!("funnel_dispatch_skipped_total").increment(1);
                FunnelDispatchResult::skipped(reason)
            }
            Classification::Funnel(funnel) => {
                metrics::counter!("funnel_dispatch_total", "funnel" => funnel.as_str())
                    .increment(1);

                let result = self.handler(funnel).handle(intent).await?;
                if !result.success {
                    self.report_partial_failure(funnel, intent, &result);
                }
                tracing::info!(
                    funnel = %funnel,
                    success = result.success,
                    actions = ?result.actions_taken,
                    "dispatch complete"
                );
                result
            }
        };

        metrics::histogram!("funnel_dispatch_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        Ok(result)
    }

    fn handler(&self, funnel: FunnelType) -> &dyn FunnelHandler {
        match funnel {
            FunnelType::EnrollmentProgram => &self.enrollment,
            FunnelType::Membership => &self.membership,
            FunnelType::Coaching => &self.coaching,
        }
    }

    fn report_partial_failure(
        &self,
        funnel: FunnelType,
        intent: &PaymentIntent,
        result: &FunnelDispatchResult,
    ) {
        let failed = result
            .failed_actions
            .iter()
            .map(|f| format!("{} ({})", f.action, f.reason))
            .collect::<Vec<_>>()
            .join(", ");

        self.notifications.notify(
            Notification::new(
                NotificationKind::PaymentHandlerFailure,
                format!("{funnel} handler partially failed"),
            )
            .field("payment_intent", intent.id.as_str())
            .field("completed", result.actions_taken.join(", "))
            .field("failed", failed),
        );
    }
}

//! Split-payment approval workflow.
//!
//! Requesting an approval suspends a background task on the split payment's
//! token. The task finishes when an operator's decision is resolved against
//! that token, and reports the outcome to ops.

use std::time::Duration;

use common::ResumptionToken;
use domain::{Decision, SplitPaymentApproval};
use tokio::task::JoinHandle;

use crate::approval::{ApprovalController, SuspensionHandle};
use crate::error::ApprovalError;
use crate::notify::NotificationFacade;
use crate::services::notifier::{Notification, NotificationKind};

/// A running approval workflow.
#[derive(Debug)]
pub struct ApprovalRun {
    pub token: ResumptionToken,
    /// True when the token was already resolved and the run replayed it.
    pub replayed: bool,
    pub completion: JoinHandle<Result<Decision, ApprovalError>>,
}

#[derive(Clone)]
pub struct SplitPaymentWorkflow {
    controller: ApprovalController,
    notifications: NotificationFacade,
}

impl SplitPaymentWorkflow {
    pub fn new(controller: ApprovalController, notifications: NotificationFacade) -> Self {
        Self {
            controller,
            notifications,
        }
    }

    pub fn controller(&self) -> &ApprovalController {
        &self.controller
    }

    /// Starts a workflow that waits for an operator decision on the split payment.
    #[tracing::instrument(skip(self))]
    pub async fn request_approval(
        &self,
        split_payment_id: &str,
        deadline: Option<Duration>,
    ) -> Result<ApprovalRun, ApprovalError> {
        let token = ResumptionToken::for_split_payment(split_payment_id)?;
        let handle = self.controller.begin_suspend(token.clone(), deadline).await?;

        if !handle.is_replay() {
            self.notifications.notify(
                Notification::new(
                    NotificationKind::ApprovalRequested,
                    "Split payment awaiting approval",
                )
                .field("split_payment", split_payment_id.trim())
                .field("token", token.as_str()),
            );
        }

        Ok(self.spawn_continuation(handle))
    }

    /// Delivers an operator decision for the split payment.
    #[tracing::instrument(skip(self, decision))]
    pub async fn resume(
        &self,
        split_payment_id: &str,
        decision: Decision,
    ) -> Result<SplitPaymentApproval, ApprovalError> {
        let token = ResumptionToken::for_split_payment(split_payment_id)?;
        self.controller.resolve(&token, decision).await
    }

    /// Returns the durable approval record for the split payment.
    pub async fn status(
        &self,
        split_payment_id: &str,
    ) -> Result<Option<SplitPaymentApproval>, ApprovalError> {
        let token = ResumptionToken::for_split_payment(split_payment_id)?;
        self.controller.status(&token).await
    }

    /// Re-attaches workflows to every approval still pending in the store.
    ///
    /// Called at startup so decisions for approvals requested before a restart
    /// still complete their workflow.
    pub async fn resume_pending(&self) -> Result<Vec<ApprovalRun>, ApprovalError> {
        let mut runs = Vec::new();
        for record in self.controller.pending().await? {
            match self.controller.begin_suspend(record.token.clone(), None).await {
                Ok(handle) => runs.push(self.spawn_continuation(handle)),
                Err(ApprovalError::AlreadyPending(token)) => {
                    tracing::debug!(token = %token, "approval already has a live waiter");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(count = runs.len(), "re-attached pending approvals");
        Ok(runs)
    }

    fn spawn_continuation(&self, handle: SuspensionHandle) -> ApprovalRun {
        let token = handle.token().clone();
        let replayed = handle.is_replay();
        let notifications = self.notifications.clone();
        let task_token = token.clone();

        let completion = tokio::spawn(async move {
            let outcome = handle.wait().await;
            match &outcome {
                Ok(decision) if !replayed => {
                    tracing::info!(token = %task_token, approved = decision.approved, "approval resolved");
                    notifications.notify(
                        Notification::new(
                            NotificationKind::ApprovalResolved,
                            if decision.approved {
                                "Split payment approved"
                            } else {
                                "Split payment rejected"
                            },
                        )
                        .field("split_payment", task_token.split_payment_id().unwrap_or_default())
                        .field("comment", decision.comment.clone().unwrap_or_default()),
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(token = %task_token, error = %e, "approval workflow ended without a decision"),
            }
            outcome
        });

        ApprovalRun {
            token,
            replayed,
            completion,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::notify::NotifyConfig;
    use crate::services::InMemoryNotifier;
    use state_store::InMemoryStateStore;

    #[tokio::test]
    async fn run_completes_with_operator_decision() {
        let sink = InMemoryNotifier::new();
        let notifications = NotificationFacade::spawn(Arc::new(sink.clone()), NotifyConfig::default());
        let workflow = SplitPaymentWorkflow::new(
            ApprovalController::new(Arc::new(InMemoryStateStore::new())),
            notifications.clone(),
        );

        let run = workflow.request_approval("sp_9", None).await.unwrap();
        assert_eq!(run.token.as_str(), "split-payment:sp_9");

        workflow
            .resume("sp_9", Decision::approve(Some("fine".to_string())))
            .await
            .unwrap();

        let decision = run.completion.await.unwrap().unwrap();
        assert_eq!(decision, Decision::approve(Some("fine".to_string())));

        notifications.close().await;
        assert_eq!(sink.count(NotificationKind::ApprovalRequested), 1);
        assert_eq!(sink.count(NotificationKind::ApprovalResolved), 1);
    }

    #[tokio::test]
    async fn empty_split_payment_id_is_input_error() {
        let notifications =
            NotificationFacade::spawn(Arc::new(InMemoryNotifier::new()), NotifyConfig::default());
        let workflow = SplitPaymentWorkflow::new(
            ApprovalController::new(Arc::new(InMemoryStateStore::new())),
            notifications,
        );

        let result = workflow.request_approval("  ", None).await;
        assert!(matches!(result, Err(ApprovalError::Input(_))));
    }
}

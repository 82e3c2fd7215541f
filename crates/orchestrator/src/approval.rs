//! Approval workflow controller.
//!
//! A workflow suspends on a resumption token and is woken, exactly once, by
//! the decision delivered for that token. The durable record lives in the
//! [`ApprovalStore`]; the live waiters live here, keyed by token.
//!
//! `begin_suspend` and `resolve` hold a lock on their token across the store
//! call, so a decision can never land between the record becoming pending and
//! its waiter being registered. Different tokens never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use common::ResumptionToken;
use dashmap::DashMap;
use domain::{Decision, SplitPaymentApproval};
use state_store::{ApprovalStore, PendingInsert, StoreError};
use tokio::sync::{Mutex, OwnedMutexGuard, oneshot};
use uuid::Uuid;

use crate::error::ApprovalError;

struct Waiter {
    instance: Uuid,
    sender: oneshot::Sender<Decision>,
}

type Waiters = Arc<DashMap<ResumptionToken, Waiter>>;

/// Per-token mutexes, created on demand and dropped once unused.
#[derive(Clone, Default)]
struct TokenLocks(Arc<DashMap<ResumptionToken, Arc<Mutex<()>>>>);

impl TokenLocks {
    async fn lock(&self, token: &ResumptionToken) -> TokenGuard {
        let lock = self.0.entry(token.clone()).or_default().value().clone();
        TokenGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.clone(),
            token: token.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }
}

struct TokenGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: TokenLocks,
    token: ResumptionToken,
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still holds the mutex when nobody else is queued on it.
        self.locks
            .0
            .remove_if(&self.token, |_, lock| Arc::strong_count(lock) == 1);
    }
}

enum Suspension {
    Waiting(oneshot::Receiver<Decision>),
    Replayed(Decision),
}

/// A suspended workflow instance's side of the token.
pub struct SuspensionHandle {
    token: ResumptionToken,
    instance: Uuid,
    deadline: Option<Duration>,
    suspension: Suspension,
    waiters: Waiters,
}

impl std::fmt::Debug for SuspensionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspensionHandle")
            .field("token", &self.token)
            .field("instance", &self.instance)
            .field("deadline", &self.deadline)
            .field("replayed", &self.is_replay())
            .finish()
    }
}

impl SuspensionHandle {
    pub fn token(&self) -> &ResumptionToken {
        &self.token
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// True when the token was already resolved and the decision is replayed.
    pub fn is_replay(&self) -> bool {
        matches!(self.suspension, Suspension::Replayed(_))
    }

    /// Waits for the decision without polling.
    ///
    /// With a deadline, elapsing it yields `TimedOut`; the record stays
    /// pending and a later `begin_suspend` can re-attach to it.
    pub async fn wait(self) -> Result<Decision, ApprovalError> {
        let receiver = match self.suspension {
            Suspension::Replayed(decision) => return Ok(decision),
            Suspension::Waiting(receiver) => receiver,
        };

        let received = match self.deadline {
            None => receiver.await,
            Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.waiters
                        .remove_if(&self.token, |_, w| w.instance == self.instance);
                    tracing::warn!(token = %self.token, "approval wait timed out");
                    return Err(ApprovalError::TimedOut(self.token));
                }
            },
        };

        received.map_err(|_| ApprovalError::Interrupted(self.token))
    }
}

/// Creates suspensions and delivers decisions to them.
#[derive(Clone)]
pub struct ApprovalController {
    store: Arc<dyn ApprovalStore>,
    waiters: Waiters,
    locks: TokenLocks,
}

impl ApprovalController {
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self {
            store,
            waiters: Arc::new(DashMap::new()),
            locks: TokenLocks::default(),
        }
    }

    /// Suspends on `token`, creating the pending record on first use.
    ///
    /// A pending token whose previous waiter is gone is re-attached; one with a
    /// live waiter is `AlreadyPending`. A resolved token replays its decision.
    #[tracing::instrument(skip(self), fields(token = %token))]
    pub async fn begin_suspend(
        &self,
        token: ResumptionToken,
        deadline: Option<Duration>,
    ) -> Result<SuspensionHandle, ApprovalError> {
        let _guard = self.locks.lock(&token).await;
        let instance = Uuid::new_v4();

        match self.store.insert_pending(&token).await? {
            PendingInsert::Created(_) => {
                metrics::counter!("approvals_suspended_total").increment(1);
                tracing::info!(%instance, "workflow suspended awaiting approval");
            }
            PendingInsert::Existing(record) if record.is_resolved() => {
                let decision = record.decision.ok_or_else(|| {
                    StoreError::Corrupt(format!("resolved approval {token} has no decision"))
                })?;
                tracing::info!(%instance, "approval already resolved, replaying decision");
                return Ok(SuspensionHandle {
                    token,
                    instance,
                    deadline,
                    suspension: Suspension::Replayed(decision),
                    waiters: self.waiters.clone(),
                });
            }
            PendingInsert::Existing(_) => {
                if self.has_waiter(&token) {
                    return Err(ApprovalError::AlreadyPending(token));
                }
                tracing::info!(%instance, "re-attached to pending approval");
            }
        }

        let (sender, receiver) = oneshot::channel();
        self.waiters
            .insert(token.clone(), Waiter { instance, sender });

        Ok(SuspensionHandle {
            token,
            instance,
            deadline,
            suspension: Suspension::Waiting(receiver),
            waiters: self.waiters.clone(),
        })
    }

    /// Delivers `decision` to the suspension on `token`.
    ///
    /// Fails `NotFound` for an unknown token and `AlreadyResolved` for a token
    /// that already received its decision.
    #[tracing::instrument(skip(self, decision), fields(token = %token, approved = decision.approved))]
    pub async fn resolve(
        &self,
        token: &ResumptionToken,
        decision: Decision,
    ) -> Result<SplitPaymentApproval, ApprovalError> {
        let _guard = self.locks.lock(token).await;
        let record = self.store.resolve(token, &decision).await?;

        let approved = if decision.approved { "true" } else { "false" };
        metrics::counter!("approvals_resolved_total", "approved" => approved).increment(1);

        match self.waiters.remove(token) {
            Some((_, waiter)) => {
                if waiter.sender.send(decision).is_err() {
                    tracing::warn!(instance = %waiter.instance, "waiter dropped before delivery");
                }
            }
            None => tracing::info!("no live waiter; decision stored for replay"),
        }

        Ok(record)
    }

    /// Returns the durable record for `token`.
    pub async fn status(
        &self,
        token: &ResumptionToken,
    ) -> Result<Option<SplitPaymentApproval>, ApprovalError> {
        Ok(self.store.get(token).await?)
    }

    /// Lists approvals still waiting for a decision.
    pub async fn pending(&self) -> Result<Vec<SplitPaymentApproval>, ApprovalError> {
        Ok(self.store.list_pending().await?)
    }

    /// True when a workflow instance is currently waiting on `token`.
    pub fn has_waiter(&self, token: &ResumptionToken) -> bool {
        self.waiters
            .get(token)
            .is_some_and(|waiter| !waiter.sender.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use state_store::{ApprovalStoreError, InMemoryStateStore};

    /// Store whose pending inserts for one token take a long time.
    struct SlowStore {
        inner: InMemoryStateStore,
        slow: ResumptionToken,
    }

    #[async_trait]
    impl ApprovalStore for SlowStore {
        async fn insert_pending(
            &self,
            token: &ResumptionToken,
        ) -> state_store::Result<PendingInsert> {
            if *token == self.slow {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            self.inner.insert_pending(token).await
        }

        async fn resolve(
            &self,
            token: &ResumptionToken,
            decision: &Decision,
        ) -> Result<SplitPaymentApproval, ApprovalStoreError> {
            self.inner.resolve(token, decision).await
        }

        async fn get(
            &self,
            token: &ResumptionToken,
        ) -> state_store::Result<Option<SplitPaymentApproval>> {
            self.inner.get(token).await
        }

        async fn list_pending(&self) -> state_store::Result<Vec<SplitPaymentApproval>> {
            self.inner.list_pending().await
        }
    }

    fn token(id: &str) -> ResumptionToken {
        ResumptionToken::for_split_payment(id).unwrap()
    }

    fn controller() -> ApprovalController {
        ApprovalController::new(Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn decision_is_delivered_exactly() {
        let controller = controller();
        let handle = controller.begin_suspend(token("sp_1"), None).await.unwrap();

        let decision = Decision::reject(Some("amounts differ".to_string()));
        controller.resolve(&token("sp_1"), decision.clone()).await.unwrap();

        assert_eq!(handle.wait().await.unwrap(), decision);
    }

    #[tokio::test]
    async fn resolving_unknown_token_is_not_found() {
        let controller = controller();
        let result = controller
            .resolve(&token("never"), Decision::approve(None))
            .await;
        assert!(matches!(result, Err(ApprovalError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_resolve_is_already_resolved() {
        let controller = controller();
        let _handle = controller.begin_suspend(token("sp_1"), None).await.unwrap();
        controller
            .resolve(&token("sp_1"), Decision::approve(None))
            .await
            .unwrap();

        let result = controller
            .resolve(&token("sp_1"), Decision::approve(None))
            .await;
        assert!(matches!(result, Err(ApprovalError::AlreadyResolved(_))));
    }

    #[tokio::test]
    async fn live_waiter_blocks_second_suspend() {
        let controller = controller();
        let _handle = controller.begin_suspend(token("sp_1"), None).await.unwrap();

        let result = controller.begin_suspend(token("sp_1"), None).await;
        assert!(matches!(result, Err(ApprovalError::AlreadyPending(_))));
    }

    #[tokio::test]
    async fn dropped_waiter_can_be_reattached() {
        let controller = controller();
        let handle = controller.begin_suspend(token("sp_1"), None).await.unwrap();
        drop(handle);

        let reattached = controller.begin_suspend(token("sp_1"), None).await.unwrap();
        controller
            .resolve(&token("sp_1"), Decision::approve(None))
            .await
            .unwrap();

        assert!(reattached.wait().await.unwrap().approved);
    }

    #[tokio::test]
    async fn resolved_token_replays_decision() {
        let controller = controller();
        let handle = controller.begin_suspend(token("sp_1"), None).await.unwrap();
        drop(handle);
        controller
            .resolve(&token("sp_1"), Decision::approve(Some("ok".to_string())))
            .await
            .unwrap();

        let replay = controller.begin_suspend(token("sp_1"), None).await.unwrap();
        assert!(replay.is_replay());
        assert_eq!(
            replay.wait().await.unwrap(),
            Decision::approve(Some("ok".to_string()))
        );
    }

    #[tokio::test]
    async fn deadline_times_out_and_leaves_record_pending() {
        let controller = controller();
        let handle = controller
            .begin_suspend(token("sp_1"), Some(Duration::from_millis(20)))
            .await
            .unwrap();

        let result = handle.wait().await;
        assert!(matches!(result, Err(ApprovalError::TimedOut(_))));
        assert!(!controller.has_waiter(&token("sp_1")));

        let record = controller.status(&token("sp_1")).await.unwrap().unwrap();
        assert!(!record.is_resolved());
    }

    #[tokio::test]
    async fn resolve_without_waiter_is_stored() {
        let controller = controller();
        drop(controller.begin_suspend(token("sp_1"), None).await.unwrap());

        controller
            .resolve(&token("sp_1"), Decision::reject(None))
            .await
            .unwrap();

        let record = controller.status(&token("sp_1")).await.unwrap().unwrap();
        assert_eq!(record.decision, Some(Decision::reject(None)));
    }

    #[tokio::test]
    async fn slow_store_call_does_not_block_other_tokens() {
        let controller = ApprovalController::new(Arc::new(SlowStore {
            inner: InMemoryStateStore::new(),
            slow: token("sp_slow"),
        }));

        let slow = tokio::spawn({
            let controller = controller.clone();
            async move { controller.begin_suspend(token("sp_slow"), None).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_millis(150), async {
            let handle = controller.begin_suspend(token("sp_fast"), None).await?;
            controller
                .resolve(&token("sp_fast"), Decision::approve(None))
                .await?;
            handle.wait().await
        })
        .await
        .expect("other token waited on the slow store call");
        assert!(fast.unwrap().approved);

        let _slow_handle = slow.await.unwrap().unwrap();
        assert!(controller.has_waiter(&token("sp_slow")));
    }

    #[tokio::test]
    async fn same_token_calls_are_serialized() {
        let controller = ApprovalController::new(Arc::new(SlowStore {
            inner: InMemoryStateStore::new(),
            slow: token("sp_1"),
        }));

        let suspend = tokio::spawn({
            let controller = controller.clone();
            async move { controller.begin_suspend(token("sp_1"), None).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Waits for the suspension to register, then finds its record.
        controller
            .resolve(&token("sp_1"), Decision::reject(None))
            .await
            .unwrap();

        let handle = suspend.await.unwrap().unwrap();
        assert_eq!(handle.wait().await.unwrap(), Decision::reject(None));
        assert_eq!(controller.locks.len(), 0);
    }
}

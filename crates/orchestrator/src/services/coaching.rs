//! Scheduling for 1:1 coaching purchases.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::PaymentIntentId;
use domain::PaymentIntent;

use crate::error::ServiceError;

/// Trait for the calendar system that books coaching calls.
#[async_trait]
pub trait CoachingScheduler: Send + Sync {
    /// Books the onboarding call for the customer behind this intent.
    async fn schedule_call(&self, intent: &PaymentIntent) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemorySchedulerState {
    scheduled: Vec<PaymentIntentId>,
    fail: bool,
}

/// In-memory scheduler that records every booking.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoachingScheduler {
    state: Arc<RwLock<InMemorySchedulerState>>,
}

impl InMemoryCoachingScheduler {
    /// Creates a new in-memory scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every booking to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Number of calls booked for `intent_id`.
    pub fn call_count(&self, intent_id: &PaymentIntentId) -> usize {
        self.state
            .read()
            .unwrap()
            .scheduled
            .iter()
            .filter(|id| *id == intent_id)
            .count()
    }
}

#[async_trait]
impl CoachingScheduler for InMemoryCoachingScheduler {
    async fn schedule_call(&self, intent: &PaymentIntent) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(ServiceError::new("coaching", "calendar unavailable"));
        }
        state.scheduled.push(intent.id.clone());
        Ok(())
    }
}

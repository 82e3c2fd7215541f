//! 1:1 coaching purchases: book the call, CRM contact, ops ping.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{FunnelType, PaymentIntent};

use super::{ActionRunner, FunnelHandler, notify_ops, unsupported};
use crate::error::ServiceError;
use crate::notify::NotificationFacade;
use crate::services::{CoachingScheduler, CrmClient};

pub struct CoachingHandler {
    runner: ActionRunner,
    scheduler: Arc<dyn CoachingScheduler>,
    crm: Arc<dyn CrmClient>,
    notifications: NotificationFacade,
}

impl CoachingHandler {
    pub fn new(
        runner: ActionRunner,
        scheduler: Arc<dyn CoachingScheduler>,
        crm: Arc<dyn CrmClient>,
        notifications: NotificationFacade,
    ) -> Self {
        Self {
            runner,
            scheduler,
            crm,
            notifications,
        }
    }
}

#[async_trait]
impl FunnelHandler for CoachingHandler {
    fn funnel(&self) -> FunnelType {
        FunnelType::Coaching
    }

    fn runner(&self) -> &ActionRunner {
        &self.runner
    }

    async fn perform(
        &self,
        action: &'static str,
        intent: &PaymentIntent,
    ) -> Result<(), ServiceError> {
        match action {
            FunnelType::SCHEDULE_COACHING_CALL => self.scheduler.schedule_call(intent).await,
            FunnelType::SYNC_CRM => self.crm.upsert_contact(intent, self.funnel()).await,
            FunnelType::NOTIFY_OPS => notify_ops(&self.notifications, self.funnel(), intent),
            other => Err(unsupported(self.funnel(), other)),
        }
    }
}

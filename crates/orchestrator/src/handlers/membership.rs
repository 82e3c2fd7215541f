//! Membership purchases: recurring access and an ops ping.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{FunnelType, PaymentIntent};

use super::{ActionRunner, FunnelHandler, notify_ops, unsupported};
use crate::error::ServiceError;
use crate::notify::NotificationFacade;
use crate::services::AccessProvisioner;

pub struct MembershipHandler {
    runner: ActionRunner,
    access: Arc<dyn AccessProvisioner>,
    notifications: NotificationFacade,
}

impl MembershipHandler {
    pub fn new(
        runner: ActionRunner,
        access: Arc<dyn AccessProvisioner>,
        notifications: NotificationFacade,
    ) -> Self {
        Self {
            runner,
            access,
            notifications,
        }
    }
}

#[async_trait]
impl FunnelHandler for MembershipHandler {
    fn funnel(&self) -> FunnelType {
        FunnelType::Membership
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
            FunnelType::GRANT_MEMBERSHIP_ACCESS => {
                self.access.grant_membership_access(intent).await
            }
            FunnelType::NOTIFY_OPS => notify_ops(&self.notifications, self.funnel(), intent),
            other => Err(unsupported(self.funnel(), other)),
        }
    }
}

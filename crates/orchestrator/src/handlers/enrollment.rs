//! Enrollment program purchases: course access, CRM contact, ops ping.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{FunnelType, PaymentIntent};

use super::{ActionRunner, FunnelHandler, notify_ops, unsupported};
use crate::error::ServiceError;
use crate::notify::NotificationFacade;
use crate::services::{AccessProvisioner, CrmClient};

pub struct EnrollmentProgramHandler {
    runner: ActionRunner,
    access: Arc<dyn AccessProvisioner>,
    crm: Arc<dyn CrmClient>,
    notifications: NotificationFacade,
}

impl EnrollmentProgramHandler {
    pub fn new(
        runner: ActionRunner,
        access: Arc<dyn AccessProvisioner>,
        crm: Arc<dyn CrmClient>,
        notifications: NotificationFacade,
    ) -> Self {
        Self {
            runner,
            access,
            crm,
            notifications,
        }
    }
}

#[async_trait]
impl FunnelHandler for EnrollmentProgramHandler {
    fn funnel(&self) -> FunnelType {
        FunnelType::EnrollmentProgram
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
            FunnelType::GRANT_PROGRAM_ACCESS => self.access.grant_program_access(intent).await,
            FunnelType::SYNC_CRM => self.crm.upsert_contact(intent, self.funnel()).await,
            FunnelType::NOTIFY_OPS => notify_ops(&self.notifications, self.funnel(), intent),
            other => Err(unsupported(self.funnel(), other)),
        }
    }
}

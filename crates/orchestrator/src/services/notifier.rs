//! Operational notification sinks.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::ServiceError;

/// What an operator is being told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CartRecovery,
    PaymentSucceeded,
    PaymentHandlerFailure,
    WebhookFailure,
    ApprovalRequested,
    ApprovalResolved,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CartRecovery => "cart_recovery",
            NotificationKind::PaymentSucceeded => "payment_succeeded",
            NotificationKind::PaymentHandlerFailure => "payment_handler_failure",
            NotificationKind::WebhookFailure => "webhook_failure",
            NotificationKind::ApprovalRequested => "approval_requested",
            NotificationKind::ApprovalResolved => "approval_resolved",
        }
    }
}

/// One operational message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub fields: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a labelled field; empty values are skipped.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.fields.insert(name.into(), value);
        }
        self
    }

    /// Renders the message as plain text for chat webhooks and logs.
    pub fn text(&self) -> String {
        let mut text = self.title.clone();
        for (name, value) in &self.fields {
            text.push_str(&format!("\n{name}: {value}"));
        }
        text
    }
}

/// Trait for a notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: String,
    kind: &'a str,
    fields: &'a BTreeMap<String, String>,
}

/// Posts notifications to an ops chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::new("notifier", e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError> {
        let payload = WebhookPayload {
            text: notification.text(),
            kind: notification.kind.as_str(),
            fields: &notification.fields,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::new("notifier", e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::new(
                "notifier",
                format!("webhook responded {}", response.status()),
            ));
        }
        Ok(())
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError> {
        tracing::info!(
            kind = notification.kind.as_str(),
            text = %notification.text(),
            "notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail: bool,
    delay: Option<Duration>,
}

/// In-memory notifier that records every delivered message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every send to fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Makes every send sleep before completing.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state.read().unwrap().sent.clone()
    }

    /// Number of delivered messages of `kind`.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), ServiceError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(ServiceError::new("notifier", "sink unavailable"));
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}

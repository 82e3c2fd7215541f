//! Split payment approval record.

use chrono::{DateTime, Utc};
use common::ResumptionToken;
use serde::{Deserialize, Serialize};

/// The human decision delivered to a suspended workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Decision {
    pub fn approve(comment: Option<String>) -> Self {
        Self {
            approved: true,
            comment,
        }
    }

    pub fn reject(comment: Option<String>) -> Self {
        Self {
            approved: false,
            comment,
        }
    }
}

/// Lifecycle of an approval.
///
/// ```text
/// (none) ──suspend──► Pending ──resolve──► Resolved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Resolved,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Resolved => "resolved",
        }
    }

    /// Parses the stored form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApprovalState::Pending),
            "resolved" => Some(ApprovalState::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending or resolved human decision on one split payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPaymentApproval {
    pub token: ResumptionToken,
    pub state: ApprovalState,
    pub decision: Option<Decision>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SplitPaymentApproval {
    /// A fresh pending approval for `token`.
    pub fn pending(token: ResumptionToken) -> Self {
        Self {
            token,
            state: ApprovalState::Pending,
            decision: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// The business identifier this approval was requested for.
    pub fn split_payment_id(&self) -> Option<&str> {
        self.token.split_payment_id()
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ApprovalState::Resolved
    }

    /// Records the decision. Callers check the state first.
    pub fn resolve(&mut self, decision: Decision) {
        self.state = ApprovalState::Resolved;
        self.decision = Some(decision);
        self.resolved_at = Some(Utc::now());
    }
}

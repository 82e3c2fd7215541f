//! Funnel classification and the dispatch result.

use serde::{Deserialize, Serialize};

use crate::intent::PaymentIntent;

/// The downstream provisioning path a succeeded payment takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelType {
    EnrollmentProgram,
    Membership,
    Coaching,
}

impl FunnelType {
    /// Action names, also used as idempotency key suffixes.
    pub const GRANT_PROGRAM_ACCESS: &'static str = "grant_program_access";
    pub const GRANT_MEMBERSHIP_ACCESS: &'static str = "grant_membership_access";
    pub const SCHEDULE_COACHING_CALL: &'static str = "schedule_coaching_call";
    pub const SYNC_CRM: &'static str = "sync_crm";
    pub const NOTIFY_OPS: &'static str = "notify_ops";

    /// Maps a metadata literal to a funnel.
    ///
    /// Matching ignores case, surrounding whitespace, and `-` versus `_`.
    pub fn from_literal(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "enrollment" | "enrollment_program" | "program" | "course" => {
                Some(FunnelType::EnrollmentProgram)
            }
            "membership" => Some(FunnelType::Membership),
            "coaching" | "one_on_one" | "1on1" | "1_on_1" => Some(FunnelType::Coaching),
            _ => None,
        }
    }

    /// Returns the canonical funnel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelType::EnrollmentProgram => "enrollment_program",
            FunnelType::Membership => "membership",
            FunnelType::Coaching => "coaching",
        }
    }

    /// Returns the actions this funnel performs, in execution order.
    pub fn actions(&self) -> &'static [&'static str] {
        match self {
            FunnelType::EnrollmentProgram => &[
                Self::GRANT_PROGRAM_ACCESS,
                Self::SYNC_CRM,
                Self::NOTIFY_OPS,
            ],
            FunnelType::Membership => &[Self::GRANT_MEMBERSHIP_ACCESS, Self::NOTIFY_OPS],
            FunnelType::Coaching => &[
                Self::SCHEDULE_COACHING_CALL,
                Self::SYNC_CRM,
                Self::NOTIFY_OPS,
            ],
        }
    }
}

impl std::fmt::Display for FunnelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Funnel(FunnelType),
    /// Unknown or missing funnel; carries the raw value when there was one.
    Unclassified(Option<String>),
}

impl Classification {
    /// The skip reason reported when dispatch has nothing to do.
    pub fn skipped_reason(&self) -> Option<String> {
        match self {
            Classification::Funnel(_) => None,
            Classification::Unclassified(Some(value)) => {
                Some(format!("Unknown funnel type: {value}"))
            }
            Classification::Unclassified(None) => Some("Unknown funnel type: (none)".to_string()),
        }
    }
}

/// Classifies an intent by its declared funnel type.
pub fn classify(intent: &PaymentIntent) -> Classification {
    match intent.funnel_type() {
        Some(value) => match FunnelType::from_literal(value) {
            Some(funnel) => Classification::Funnel(funnel),
            None => Classification::Unclassified(Some(value.to_string())),
        },
        None => Classification::Unclassified(None),
    }
}

/// Outcome of one funnel handler invocation.
///
/// `actions_taken` lists every action whose effect is in place, including
/// ones a previous delivery already performed. Partial failure is reported
/// with `success: false`; completed actions are never rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelDispatchResult {
    pub success: bool,
    pub actions_taken: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_actions: Vec<FailedAction>,
}

/// An action that did not complete, with the collaborator's reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAction {
    pub action: String,
    pub reason: String,
}

impl FunnelDispatchResult {
    /// A successful no-op result.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            actions_taken: Vec::new(),
            skipped_reason: Some(reason.into()),
            failed_actions: Vec::new(),
        }
    }

    /// Starts an empty, successful result to accumulate actions into.
    pub fn new() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Records an action whose effect is in place.
    pub fn record_taken(&mut self, action: impl Into<String>) {
        self.actions_taken.push(action.into());
    }

    /// Records an action that failed; the result becomes unsuccessful.
    pub fn record_failed(&mut self, action: impl Into<String>, reason: impl Into<String>) {
        self.success = false;
        self.failed_actions.push(FailedAction {
            action: action.into(),
            reason: reason.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentStatus;
    use common::PaymentIntentId;

    fn intent(metadata: &[(&str, &str)]) -> PaymentIntent {
        PaymentIntent {
            id: PaymentIntentId::parse("pi_1").unwrap(),
            status: IntentStatus::Succeeded,
            amount: 100,
            currency: "usd".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            client_secret: None,
        }
    }

    #[test]
    fn classifies_known_literals() {
        assert_eq!(
            classify(&intent(&[("funnel_type", "membership")])),
            Classification::Funnel(FunnelType::Membership)
        );
        assert_eq!(
            classify(&intent(&[("funnel_type", "coaching")])),
            Classification::Funnel(FunnelType::Coaching)
        );
        assert_eq!(
            classify(&intent(&[("funnel_type", "enrollment_program")])),
            Classification::Funnel(FunnelType::EnrollmentProgram)
        );
    }

    #[test]
    fn classification_is_loose_about_case_and_separators() {
        assert_eq!(
            classify(&intent(&[("funnel_type", " Enrollment-Program ")])),
            Classification::Funnel(FunnelType::EnrollmentProgram)
        );
        assert_eq!(
            classify(&intent(&[("funnel_type", "1on1")])),
            Classification::Funnel(FunnelType::Coaching)
        );
    }

    #[test]
    fn legacy_type_key_is_honoured() {
        assert_eq!(
            classify(&intent(&[("type", "membership")])),
            Classification::Funnel(FunnelType::Membership)
        );
    }

    #[test]
    fn unknown_funnel_reports_value() {
        let classification = classify(&intent(&[("funnel_type", "unknown_x")]));
        assert_eq!(
            classification,
            Classification::Unclassified(Some("unknown_x".to_string()))
        );
        assert_eq!(
            classification.skipped_reason().as_deref(),
            Some("Unknown funnel type: unknown_x")
        );
    }

    #[test]
    fn missing_funnel_is_unclassified() {
        let classification = classify(&intent(&[]));
        assert_eq!(classification, Classification::Unclassified(None));
        assert!(classification.skipped_reason().is_some());
    }

    #[test]
    fn membership_actions_in_order() {
        assert_eq!(
            FunnelType::Membership.actions(),
            &["grant_membership_access", "notify_ops"]
        );
    }

    #[test]
    fn skipped_result_is_successful_and_empty() {
        let result = FunnelDispatchResult::skipped("Unknown funnel type: x");
        assert!(result.success);
        assert!(result.actions_taken.is_empty());
    }

    #[test]
    fn recording_a_failure_keeps_taken_actions() {
        let mut result = FunnelDispatchResult::new();
        result.record_taken("grant_program_access");
        result.record_failed("sync_crm", "crm unavailable");

        assert!(!result.success);
        assert_eq!(result.actions_taken, vec!["grant_program_access"]);
        assert_eq!(result.failed_actions[0].action, "sync_crm");
    }

    #[test]
    fn result_serializes_snake_case_fields() {
        let mut result = FunnelDispatchResult::new();
        result.record_taken("notify_ops");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["actions_taken"][0], "notify_ops");
        assert!(json.get("skipped_reason").is_none());
        assert!(json.get("failed_actions").is_none());
    }
}

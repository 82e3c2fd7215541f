//! Operator authorization for decision endpoints.

/// Header carrying the authenticated operator's email, set by the identity proxy.
pub const OPERATOR_HEADER: &str = "x-operator-email";

/// Which operators may deliver approval decisions.
///
/// An empty policy admits everyone, which is how development runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    emails: Vec<String>,
    domains: Vec<String>,
}

impl AccessPolicy {
    pub fn new(emails: Vec<String>, domains: Vec<String>) -> Self {
        let normalize = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .map(|v| v.trim().trim_start_matches('@').to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        };
        Self {
            emails: normalize(emails),
            domains: normalize(domains),
        }
    }

    pub fn is_open(&self) -> bool {
        self.emails.is_empty() && self.domains.is_empty()
    }

    /// Returns true when `email` is listed or belongs to a listed domain.
    pub fn allows(&self, email: Option<&str>) -> bool {
        if self.is_open() {
            return true;
        }

        let Some(email) = email.map(|e| e.trim().to_ascii_lowercase()) else {
            return false;
        };
        if self.emails.contains(&email) {
            return true;
        }

        match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() => {
                self.domains.iter().any(|d| d == domain)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(
            vec!["Lead@Partner.io".to_string()],
            vec!["@example.com".to_string()],
        )
    }

    #[test]
    fn empty_policy_is_open() {
        assert!(AccessPolicy::default().allows(None));
    }

    #[test]
    fn listed_email_is_allowed_case_insensitively() {
        assert!(policy().allows(Some("lead@partner.io")));
        assert!(!policy().allows(Some("other@partner.io")));
    }

    #[test]
    fn domain_members_are_allowed() {
        assert!(policy().allows(Some("ops@Example.com")));
        assert!(!policy().allows(Some("ops@example.com.evil")));
        assert!(!policy().allows(Some("@example.com")));
    }

    #[test]
    fn missing_identity_is_rejected_when_restricted() {
        assert!(!policy().allows(None));
    }
}

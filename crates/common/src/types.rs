use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix the payment processor assigns to payment intent identifiers.
pub const PAYMENT_INTENT_PREFIX: &str = "pi_";

/// Prefix the payment processor assigns to setup intent identifiers.
pub const SETUP_INTENT_PREFIX: &str = "seti_";

/// Prefix the payment processor assigns to subscription identifiers.
pub const SUBSCRIPTION_PREFIX: &str = "sub_";

/// Namespace prepended to split payment ids to form resumption tokens.
pub const SPLIT_PAYMENT_NAMESPACE: &str = "split-payment:";

/// Errors raised while parsing identifiers supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("{kind} id is required")]
    Empty { kind: &'static str },

    /// The identifier does not carry the expected type prefix.
    #[error("{kind} id must start with '{prefix}', got '{value}'")]
    WrongPrefix {
        kind: &'static str,
        prefix: &'static str,
        value: String,
    },

    /// The identifier contains characters the processor never issues.
    #[error("{kind} id contains invalid characters: '{value}'")]
    InvalidCharacters { kind: &'static str, value: String },
}

fn validate_prefixed(
    kind: &'static str,
    prefix: &'static str,
    value: &str,
) -> Result<(), IdError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IdError::Empty { kind });
    }
    let Some(rest) = value.strip_prefix(prefix) else {
        return Err(IdError::WrongPrefix {
            kind,
            prefix,
            value: value.to_string(),
        });
    };
    if rest.is_empty() {
        return Err(IdError::Empty { kind });
    }
    if !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IdError::InvalidCharacters {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parses an identifier, rejecting values without the expected prefix.
            pub fn parse(value: impl AsRef<str>) -> Result<Self, IdError> {
                let value = value.as_ref().trim();
                validate_prefixed($kind, $prefix, value)?;
                Ok(Self(value.to_string()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(
    /// Processor-assigned payment intent identifier (`pi_...`).
    PaymentIntentId,
    "payment intent",
    PAYMENT_INTENT_PREFIX
);

prefixed_id!(
    /// Processor-assigned setup intent identifier (`seti_...`).
    SetupIntentId,
    "setup intent",
    SETUP_INTENT_PREFIX
);

prefixed_id!(
    /// Processor-assigned subscription identifier (`sub_...`).
    SubscriptionId,
    "subscription",
    SUBSCRIPTION_PREFIX
);

/// An identifier whose client secret may be handed back to the browser.
///
/// Knowing the opaque identifier is the credential, so only the two intent
/// kinds that carry a client secret are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientSecretTarget {
    PaymentIntent(PaymentIntentId),
    SetupIntent(SetupIntentId),
}

impl ClientSecretTarget {
    /// Classifies a raw identifier by its prefix.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, IdError> {
        let value = value.as_ref().trim();
        if value.starts_with(SETUP_INTENT_PREFIX) {
            return SetupIntentId::parse(value).map(Self::SetupIntent);
        }
        if value.starts_with(PAYMENT_INTENT_PREFIX) {
            return PaymentIntentId::parse(value).map(Self::PaymentIntent);
        }
        if value.is_empty() {
            return Err(IdError::Empty { kind: "intent" });
        }
        Err(IdError::WrongPrefix {
            kind: "intent",
            prefix: PAYMENT_INTENT_PREFIX,
            value: value.to_string(),
        })
    }

    /// Returns the underlying identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentIntent(id) => id.as_str(),
            Self::SetupIntent(id) => id.as_str(),
        }
    }
}

/// Durable key identifying one suspended workflow awaiting a decision.
///
/// Derived deterministically from the business identifier, so the party that
/// later delivers the decision can recompute it without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumptionToken(String);

impl ResumptionToken {
    /// Derives the token for a split payment approval.
    pub fn for_split_payment(split_payment_id: impl AsRef<str>) -> Result<Self, IdError> {
        let id = split_payment_id.as_ref().trim();
        if id.is_empty() {
            return Err(IdError::Empty {
                kind: "split payment",
            });
        }
        Ok(Self(format!("{SPLIT_PAYMENT_NAMESPACE}{id}")))
    }

    /// Rebuilds a token from its stored string form.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the split payment id this token was derived from, if any.
    pub fn split_payment_id(&self) -> Option<&str> {
        self.0.strip_prefix(SPLIT_PAYMENT_NAMESPACE)
    }
}

impl std::fmt::Display for ResumptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

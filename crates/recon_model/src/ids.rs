use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(Reference, "Globally unique bank transaction reference.");
string_id!(ProfileId, "Bank profile identifier.");
string_id!(BalanceId, "Bank balance (account) identifier.");
string_id!(SuggestionId, "Opaque id assigned by the approval service.");
string_id!(GlTransactionId, "Identifier of a GL journal/transaction.");
string_id!(GlLineId, "Identifier of a single GL line within a transaction.");
string_id!(EntityKey, "Canonical key of an entity in the EntityMap.");
string_id!(SubsidiaryId, "Accounting-subsidiary identifier used by the GL.");

/// Identifier of a [`crate::Pattern`]. Generated locally; never interpreted by the bank or
/// approval service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`CommitSha`] with an [`OrgRepo`] even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one submitted job instance.
///
/// Generated fresh for every dispatched event, including events that fail to
/// resolve, so that every reported record carries a unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRunId(Uuid);

impl JobRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration / Git names)
// ---------------------------------------------------------------------------

string_id! {
    /// A Git commit SHA.
    CommitSha
}

string_id! {
    /// Identifies a source repository in `"org/repo"` format.
    ///
    /// Presubmit and postsubmit catalogs are keyed by this value.
    OrgRepo
}

impl OrgRepo {
    /// Joins an organisation and a repository name into `"org/repo"`.
    ///
    /// Returns `None` if either part is empty.
    pub fn from_parts(org: &str, repo: &str) -> Option<Self> {
        if org.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self(format!("{org}/{repo}")))
    }
}

string_id! {
    /// Names a transport subscription that delivers trigger events.
    ///
    /// Used as the tag on message counters and to select the cluster
    /// allow-list that applies to events arriving through it.
    SubscriptionName
}

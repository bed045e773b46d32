//! The trigger event and its wire codec.
//!
//! A [`TriggerEvent`] is the decoded payload of one transport message. The
//! job class it requests is not part of the payload: it travels as the
//! [`EVENT_TYPE_ATTRIBUTE`] transport attribute.
//!
//! ## Wire format
//!
//! JSON object with a required `name` and optional `refs`, `envs`, `labels`
//! and `annotations`:
//!
//! ```json
//! {
//!   "name": "unit-tests",
//!   "refs": {
//!     "org": "k8s", "repo": "api", "base_ref": "main", "base_sha": "abc",
//!     "pulls": [{ "number": 1, "sha": "def" }]
//!   },
//!   "envs": { "VERBOSE": "1" },
//!   "labels": { "team": "api" },
//!   "annotations": { "requested-by": "bot" }
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{CodecError, CommitSha, JobClass, Labels, OrgRepo};

// ---------------------------------------------------------------------------
// Event-class attribute
// ---------------------------------------------------------------------------

/// Transport attribute key carrying the event class.
pub const EVENT_TYPE_ATTRIBUTE: &str = "jobrelay.io/pubsub.EventType";

/// [`EVENT_TYPE_ATTRIBUTE`] value requesting a periodic job.
pub const PERIODIC_JOB_EVENT: &str = "jobrelay.io/pubsub.PeriodicJobEvent";

/// [`EVENT_TYPE_ATTRIBUTE`] value requesting a presubmit job.
pub const PRESUBMIT_JOB_EVENT: &str = "jobrelay.io/pubsub.PresubmitJobEvent";

/// [`EVENT_TYPE_ATTRIBUTE`] value requesting a postsubmit job.
pub const POSTSUBMIT_JOB_EVENT: &str = "jobrelay.io/pubsub.PostsubmitJobEvent";

impl JobClass {
    /// Maps an [`EVENT_TYPE_ATTRIBUTE`] value to its job class.
    ///
    /// Returns `None` for any value outside the three fixed tags.
    pub fn from_event_type(value: &str) -> Option<Self> {
        match value {
            PERIODIC_JOB_EVENT => Some(JobClass::Periodic),
            PRESUBMIT_JOB_EVENT => Some(JobClass::Presubmit),
            POSTSUBMIT_JOB_EVENT => Some(JobClass::Postsubmit),
            _ => None,
        }
    }

    /// Returns the [`EVENT_TYPE_ATTRIBUTE`] value for this class.
    pub fn event_type(self) -> &'static str {
        match self {
            JobClass::Periodic => PERIODIC_JOB_EVENT,
            JobClass::Presubmit => PRESUBMIT_JOB_EVENT,
            JobClass::Postsubmit => POSTSUBMIT_JOB_EVENT,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// One pull request a presubmit runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pull {
    /// Pull request number.
    pub number: u64,
    /// Head commit of the pull request.
    #[serde(default)]
    pub sha: String,
    /// Login of the pull request author.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    /// Pull request title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Link to the pull request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}

/// Source-repository context for presubmit and postsubmit events.
///
/// Every field defaults to empty on decode so that resolvers can name the
/// missing one in their validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRefs {
    /// Organisation (or owner) of the repository.
    #[serde(default)]
    pub org: String,
    /// Repository name.
    #[serde(default)]
    pub repo: String,
    /// Link to the repository.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_link: String,
    /// Base branch name.
    #[serde(default)]
    pub base_ref: String,
    /// Base commit.
    #[serde(default)]
    pub base_sha: String,
    /// Link to the base commit.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_link: String,
    /// Pull requests merged onto the base, in order. Empty for postsubmits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pulls: Vec<Pull>,
}

impl RepoRefs {
    /// Returns `"org/repo"`, or `None` if either part is empty.
    pub fn org_repo(&self) -> Option<OrgRepo> {
        OrgRepo::from_parts(&self.org, &self.repo)
    }

    /// Returns the head commit of every pull that carries one.
    pub fn head_shas(&self) -> Vec<CommitSha> {
        self.pulls
            .iter()
            .filter_map(|pull| CommitSha::new(pull.sha.clone()))
            .collect()
    }
}

/// The minimum information required to start a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Name of the job definition to run.
    pub name: String,
    /// Repository context; required for presubmit and postsubmit events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<RepoRefs>,
    /// Environment variables appended to every container of the job.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub envs: Labels,
    /// Labels added to the job, overriding catalog labels of the same key.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Annotations added to the job.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub annotations: Labels,
}

/// A payload plus attributes, ready for publishing on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Encoded [`TriggerEvent`].
    pub data: Vec<u8>,
    /// Transport attributes.
    pub attributes: HashMap<String, String>,
}

impl TriggerEvent {
    /// Creates an event for the named job with no refs or metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Decodes an event from a message payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the payload is not a JSON object of the
    /// expected shape. A malformed payload never becomes valid on redelivery.
    pub fn from_payload(data: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }

    /// Encodes the event into the payload bytes.
    pub fn to_payload(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Encodes the event as a message tagged as a periodic trigger.
    pub fn to_message(&self) -> Result<OutboundMessage, CodecError> {
        self.to_message_as(JobClass::Periodic)
    }

    /// Encodes the event as a message tagged with the given class.
    pub fn to_message_as(&self, class: JobClass) -> Result<OutboundMessage, CodecError> {
        Ok(OutboundMessage {
            data: self.to_payload()?,
            attributes: HashMap::from([(
                EVENT_TYPE_ATTRIBUTE.to_string(),
                class.event_type().to_string(),
            )]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_payload() {
        let payload = br#"{
            "name": "unit-tests",
            "refs": {
                "org": "k8s", "repo": "api", "base_ref": "main", "base_sha": "abc",
                "pulls": [{"number": 1, "sha": "def", "author": "alice"}]
            },
            "envs": {"VERBOSE": "1"},
            "labels": {"team": "api"},
            "annotations": {"requested-by": "bot"}
        }"#;

        let event = TriggerEvent::from_payload(payload).expect("valid payload");

        let refs = event.refs.as_ref().expect("refs present");
        assert_eq!(event.name, "unit-tests");
        assert_eq!(refs.org_repo().map(|o| o.to_string()), Some("k8s/api".into()));
        assert_eq!(refs.pulls[0].number, 1);
        assert_eq!(refs.pulls[0].author, "alice");
        assert_eq!(event.envs["VERBOSE"], "1");
        assert_eq!(event.labels["team"], "api");
        assert_eq!(event.annotations["requested-by"], "bot");
    }

    #[test]
    fn only_name_is_required() {
        let event = TriggerEvent::from_payload(br#"{"name":"nightly-build"}"#)
            .expect("valid payload");
        assert_eq!(event, TriggerEvent::new("nightly-build"));

        assert!(TriggerEvent::from_payload(br#"{"labels":{}}"#).is_err());
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        assert!(matches!(
            TriggerEvent::from_payload(b"not json"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            TriggerEvent::from_payload(br#"{"name": 7}"#),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn encoded_event_decodes_to_the_same_event() {
        let mut event = TriggerEvent::new("unit-tests");
        event.refs = Some(RepoRefs {
            org: "k8s".into(),
            repo: "api".into(),
            base_ref: "main".into(),
            base_sha: "abc".into(),
            pulls: vec![Pull {
                number: 1,
                sha: "def".into(),
                ..Pull::default()
            }],
            ..RepoRefs::default()
        });
        event.labels.insert("team".into(), "api".into());

        let message = event.to_message().expect("encodes");

        assert_eq!(
            message.attributes.get(EVENT_TYPE_ATTRIBUTE).map(String::as_str),
            Some(PERIODIC_JOB_EVENT)
        );
        assert_eq!(TriggerEvent::from_payload(&message.data).expect("decodes"), event);
    }

    #[test]
    fn event_types_map_to_classes() {
        for class in [JobClass::Periodic, JobClass::Presubmit, JobClass::Postsubmit] {
            assert_eq!(JobClass::from_event_type(class.event_type()), Some(class));
        }
        assert_eq!(JobClass::from_event_type("foo"), None);
    }

    #[test]
    fn head_shas_skip_pulls_without_a_commit() {
        let refs = RepoRefs {
            pulls: vec![
                Pull { number: 1, sha: "aaa".into(), ..Pull::default() },
                Pull { number: 2, ..Pull::default() },
            ],
            ..RepoRefs::default()
        };
        assert_eq!(refs.head_shas(), vec![CommitSha::new("aaa").expect("non-empty")]);
    }
}

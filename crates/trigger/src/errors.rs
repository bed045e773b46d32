//! Error types for the JobRelay domain.
//!
//! [`DispatchError`] is what one dispatch of one message can fail with. Every
//! variant is terminal: the message is acknowledged and never redelivered,
//! because redelivery would reproduce the identical failure.
//!
//! Adapter-facing errors ([`SubmissionError`], [`ReportingError`],
//! [`CatalogError`]) are defined here so that port traits can name them.

use thiserror::Error;

use crate::JobClass;

// ---------------------------------------------------------------------------
// Dispatch-level errors
// ---------------------------------------------------------------------------

/// Errors that end the handling of one message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The envelope carries no event-class attribute.
    #[error("unable to find {key:?} from the attributes")]
    MissingAttribute {
        /// Attribute key that was looked up.
        key: &'static str,
    },

    /// The event-class attribute holds a value outside the known set.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// The payload could not be decoded into a trigger event.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// The event could not be turned into an allowed job.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The submission sink refused or failed to create the job.
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl DispatchError {
    /// Whether redelivering the message could change the result.
    ///
    /// Always `false`: attribute, payload and validation failures are caused by
    /// the sender, and submission failures have already been reported.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// A trigger event could not be converted to or from its payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message payload is not a valid trigger event.
    #[error("invalid trigger event payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// The event could not be serialised.
    #[error("failed to encode trigger event: {0}")]
    Encode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A user-caused reason an event cannot become a job.
///
/// Resolvers report the first unmet precondition only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A presubmit or postsubmit event has no `refs`.
    #[error("refs must be supplied")]
    MissingRefs,

    /// A required `refs` field is empty.
    #[error("{field} must be supplied")]
    MissingField {
        /// Wire name of the missing field.
        field: &'static str,
    },

    /// A presubmit event names no pull request.
    #[error("at least 1 pull is required")]
    NoPulls,

    /// No catalog entry matches the event.
    #[error("failed to find associated {class} job {name:?}")]
    NoSuchJob {
        /// Class that was searched.
        class: JobClass,
        /// Requested job name.
        name: String,
    },

    /// More than one catalog entry matches the event's name and branch.
    #[error("{name} matches multiple jobs")]
    AmbiguousJob {
        /// Requested job name.
        name: String,
    },

    /// The resolved job targets a cluster outside the subscription's allow-list.
    #[error("cluster {cluster} is not allowed. Can be fixed by adding this cluster to the subscription's allowed_clusters")]
    ClusterNotAllowed {
        /// Cluster the job would have run on.
        cluster: String,
    },
}

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// The job submission sink did not create the job.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The sink answered and refused the job.
    #[error("job rejected by sink (status {status}): {message}")]
    Rejected {
        /// Status code returned by the sink.
        status: u16,
        /// Body or reason returned by the sink.
        message: String,
    },

    /// The sink could not be reached or its answer could not be read.
    #[error("job submission failed: {0}")]
    Transport(String),
}

/// A status report could not be delivered. Logged, never escalated.
#[derive(Debug, Error)]
pub enum ReportingError {
    /// The reporter endpoint refused the report.
    #[error("report rejected (status {status}): {message}")]
    Rejected {
        /// Status code returned by the endpoint.
        status: u16,
        /// Body or reason returned by the endpoint.
        message: String,
    },

    /// The reporter endpoint could not be reached.
    #[error("report delivery failed: {0}")]
    Transport(String),

    /// The report topic cannot be used as a single path segment.
    #[error("invalid report topic {0:?}")]
    InvalidTopic(String),
}

/// A catalog source could not produce job definitions.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Per-repository job configuration could not be fetched.
    #[error("failed to fetch job configuration for {org_repo}: {message}")]
    Fetch {
        /// Repository whose configuration was requested.
        org_repo: String,
        /// Underlying failure.
        message: String,
    },

    /// Catalog content was read but is not valid.
    #[error("invalid job configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_name_the_problem() {
        assert_eq!(
            ValidationError::MissingField { field: "base_sha" }.to_string(),
            "base_sha must be supplied"
        );
        assert_eq!(
            ValidationError::NoSuchJob {
                class: JobClass::Presubmit,
                name: "unit-tests".into()
            }
            .to_string(),
            "failed to find associated presubmit job \"unit-tests\""
        );
        assert_eq!(
            ValidationError::AmbiguousJob { name: "lint".into() }.to_string(),
            "lint matches multiple jobs"
        );
    }

    #[test]
    fn codec_errors_name_their_direction() {
        let json_error = || serde_json::from_str::<u8>("x").expect_err("not a number");

        assert!(CodecError::Decode(json_error())
            .to_string()
            .starts_with("invalid trigger event payload: "));
        assert!(CodecError::Encode(json_error())
            .to_string()
            .starts_with("failed to encode trigger event: "));
    }

    #[test]
    fn dispatch_errors_are_never_retryable() {
        let err = DispatchError::UnsupportedEventType("foo".into());
        assert_eq!(err.to_string(), "unsupported event type: foo");
        assert!(!err.is_retryable());
    }
}

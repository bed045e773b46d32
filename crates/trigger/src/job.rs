//! Resolved and submitted job shapes.
//!
//! A resolver produces a [`ResolvedJobSpec`]; the dispatcher wraps it into a
//! [`SubmittedJob`] together with merged labels and event annotations, hands
//! it to the submission sink, and records an [`Outcome`] on it before
//! reporting.

use serde::{Deserialize, Serialize};

use crate::{JobClass, JobRunId, Labels, PodTemplate, RepoRefs, Timestamp};

// ---------------------------------------------------------------------------
// Standard job metadata
// ---------------------------------------------------------------------------

/// Label marking jobs created by this service.
pub const CREATED_BY_LABEL: &str = "jobrelay.io/created-by";

/// Value of [`CREATED_BY_LABEL`].
pub const CREATED_BY_VALUE: &str = "jobrelay";

/// Label and annotation carrying the catalog job name.
pub const JOB_NAME_KEY: &str = "jobrelay.io/job";

/// Label carrying the job class.
pub const JOB_TYPE_LABEL: &str = "jobrelay.io/type";

/// Label carrying the repository organisation.
pub const ORG_LABEL: &str = "jobrelay.io/refs.org";

/// Label carrying the repository name.
pub const REPO_LABEL: &str = "jobrelay.io/refs.repo";

/// Label carrying the base branch.
pub const BASE_REF_LABEL: &str = "jobrelay.io/refs.base_ref";

/// Label carrying the first pull request number.
pub const PULL_LABEL: &str = "jobrelay.io/refs.pull";

const MAX_LABEL_VALUE_LEN: usize = 63;

/// Coerces `value` into a valid label value.
///
/// Label values are at most 63 characters of `[A-Za-z0-9._-]` and start and
/// end with an alphanumeric character. Other characters become `-`.
pub fn label_value(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_LABEL_VALUE_LEN)
        .collect();
    replaced
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

fn standard_labels(spec: &ResolvedJobSpec) -> Labels {
    let mut labels = Labels::from([(CREATED_BY_LABEL.to_string(), CREATED_BY_VALUE.to_string())]);
    if !spec.job.is_empty() {
        labels.insert(JOB_NAME_KEY.to_string(), label_value(&spec.job));
    }
    if let Some(class) = spec.job_class {
        labels.insert(JOB_TYPE_LABEL.to_string(), class.as_str().to_string());
    }
    if let Some(refs) = &spec.refs {
        labels.insert(ORG_LABEL.to_string(), label_value(&refs.org));
        labels.insert(REPO_LABEL.to_string(), label_value(&refs.repo));
        labels.insert(BASE_REF_LABEL.to_string(), label_value(&refs.base_ref));
        if let Some(pull) = refs.pulls.first() {
            labels.insert(PULL_LABEL.to_string(), pull.number.to_string());
        }
    }
    labels
}

// ---------------------------------------------------------------------------
// Specs and jobs
// ---------------------------------------------------------------------------

/// What a resolver produces: everything needed to run one catalog job for
/// one event.
///
/// The default value is the empty spec attached to events that could not be
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedJobSpec {
    /// Class of the resolved job; `None` only for the empty spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_class: Option<JobClass>,
    /// Catalog job name.
    #[serde(default)]
    pub job: String,
    /// Cluster alias the job runs on.
    #[serde(default)]
    pub cluster: String,
    /// Repository context (presubmit and postsubmit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<RepoRefs>,
    /// Execution template, copied from the catalog entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplate>,
}

/// Lifecycle state of a submitted job as far as this service knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// The job was handed to the sink.
    Triggered,
    /// The job could not be created.
    Error,
}

/// Status block carried by every [`SubmittedJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Current state.
    pub state: JobState,
    /// Human-readable description of the state.
    #[serde(default)]
    pub description: String,
    /// When the job record was created.
    pub start_time: Timestamp,
}

/// Result of one dispatch, attached to the job right before reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The sink accepted the job.
    Triggered,
    /// The job could not be resolved, was not allowed, or was refused.
    Error(String),
}

impl Outcome {
    fn state(&self) -> JobState {
        match self {
            Outcome::Triggered => JobState::Triggered,
            Outcome::Error(_) => JobState::Error,
        }
    }

    fn description(&self) -> String {
        match self {
            Outcome::Triggered => "Successfully triggered job.".to_string(),
            Outcome::Error(message) => format!("Failed creating job: {message}"),
        }
    }
}

/// A job creation request, as handed to the submission sink and reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    /// Unique name of this job instance.
    pub name: JobRunId,
    /// Resolved specification.
    pub spec: ResolvedJobSpec,
    /// Catalog labels overlaid with event labels, then standard labels.
    pub labels: Labels,
    /// Event annotations plus the job-name annotation.
    pub annotations: Labels,
    /// Lifecycle status.
    pub status: JobStatus,
}

impl SubmittedJob {
    /// Builds a job record from a spec, its merged labels and annotations.
    ///
    /// Standard labels are applied on top of `labels`. The pod template is
    /// taken from `spec` unchanged.
    pub fn new(spec: ResolvedJobSpec, labels: Labels, annotations: &Labels) -> Self {
        let mut all_labels = labels;
        all_labels.extend(standard_labels(&spec));

        let mut all_annotations = annotations.clone();
        if !spec.job.is_empty() {
            all_annotations.insert(JOB_NAME_KEY.to_string(), spec.job.clone());
        }

        Self {
            name: JobRunId::new_random(),
            spec,
            labels: all_labels,
            annotations: all_annotations,
            status: JobStatus {
                state: JobState::Triggered,
                description: String::new(),
                start_time: Timestamp::now(),
            },
        }
    }

    /// Builds the record reported for an event that could not be resolved.
    pub fn unresolved(annotations: &Labels) -> Self {
        Self::new(ResolvedJobSpec::default(), Labels::new(), annotations)
    }

    /// Sets the status from `outcome`.
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        self.status.state = outcome.state();
        self.status.description = outcome.description();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pull;

    fn presubmit_spec() -> ResolvedJobSpec {
        ResolvedJobSpec {
            job_class: Some(JobClass::Presubmit),
            job: "unit-tests".into(),
            cluster: "ci".into(),
            refs: Some(RepoRefs {
                org: "k8s".into(),
                repo: "api".into(),
                base_ref: "release/1.0".into(),
                base_sha: "abc".into(),
                pulls: vec![Pull { number: 7, sha: "def".into(), ..Pull::default() }],
                ..RepoRefs::default()
            }),
            pod_template: None,
        }
    }

    #[test]
    fn standard_labels_describe_the_job() {
        let job = SubmittedJob::new(
            presubmit_spec(),
            Labels::from([("team".to_string(), "api".to_string())]),
            &Labels::from([("requested-by".to_string(), "bot".to_string())]),
        );

        assert_eq!(job.labels["team"], "api");
        assert_eq!(job.labels[CREATED_BY_LABEL], CREATED_BY_VALUE);
        assert_eq!(job.labels[JOB_NAME_KEY], "unit-tests");
        assert_eq!(job.labels[JOB_TYPE_LABEL], "presubmit");
        assert_eq!(job.labels[BASE_REF_LABEL], "release-1.0");
        assert_eq!(job.labels[PULL_LABEL], "7");
        assert_eq!(job.annotations["requested-by"], "bot");
        assert_eq!(job.annotations[JOB_NAME_KEY], "unit-tests");
        assert_eq!(job.status.state, JobState::Triggered);
    }

    #[test]
    fn unresolved_job_keeps_event_annotations_only() {
        let job = SubmittedJob::unresolved(&Labels::from([(
            "requested-by".to_string(),
            "bot".to_string(),
        )]));

        assert_eq!(job.spec, ResolvedJobSpec::default());
        assert_eq!(job.annotations.len(), 1);
        assert_eq!(job.labels.len(), 1);
        assert!(job.labels.contains_key(CREATED_BY_LABEL));
    }

    #[test]
    fn outcome_sets_state_and_description() {
        let mut job = SubmittedJob::new(presubmit_spec(), Labels::new(), &Labels::new());

        job.record_outcome(&Outcome::Error("boom".into()));
        assert_eq!(job.status.state, JobState::Error);
        assert_eq!(job.status.description, "Failed creating job: boom");

        job.record_outcome(&Outcome::Triggered);
        assert_eq!(job.status.state, JobState::Triggered);
        assert_eq!(job.status.description, "Successfully triggered job.");
    }

    #[test]
    fn label_values_are_sanitised() {
        assert_eq!(label_value("feature/x"), "feature-x");
        assert_eq!(label_value("-lead"), "lead");
        assert_eq!(label_value(&"a".repeat(80)).len(), 63);
    }
}

//! Job status reporting over HTTP.
//!
//! A job opts into reporting by carrying the [`REPORT_TOPIC_ANNOTATION`]
//! annotation, normally copied from the trigger event that created it. Its
//! value names the topic the status message is published to.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use trigger::{JobClass, JobRunId, JobState, RepoRefs, ReportingError, StatusReporter, SubmittedJob};

use crate::error_body;

/// Annotation naming the topic a job's status is reported to.
pub const REPORT_TOPIC_ANNOTATION: &str = "jobrelay.io/report.topic";

/// Status message published for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMessage {
    /// Topic the message is published to.
    pub topic: String,
    /// Unique name of the job instance.
    pub run_id: JobRunId,
    /// Catalog job name; empty when the event never resolved to a job.
    pub job_name: String,
    /// Job class; absent when the event never resolved to a job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobClass>,
    /// State the job ended up in.
    pub state: JobState,
    /// Human-readable description of the state.
    pub description: String,
    /// Repository context of presubmit and postsubmit jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<RepoRefs>,
}

impl ReportMessage {
    /// Builds the message for `job`, or `None` if the job names no topic.
    pub fn for_job(job: &SubmittedJob) -> Option<Self> {
        let topic = report_topic(job)?;
        Some(Self {
            topic: topic.to_string(),
            run_id: job.name,
            job_name: job.spec.job.clone(),
            job_type: job.spec.job_class,
            state: job.status.state,
            description: job.status.description.clone(),
            refs: job.spec.refs.clone(),
        })
    }
}

fn report_topic(job: &SubmittedJob) -> Option<&str> {
    job.annotations
        .get(REPORT_TOPIC_ANNOTATION)
        .map(String::as_str)
        .filter(|topic| !topic.is_empty())
}

/// Builds `{endpoint}/topics/{topic}/messages` with `topic` as one
/// percent-encoded path segment.
fn topic_url(endpoint: &str, topic: &str) -> Result<Url, ReportingError> {
    if matches!(topic, "." | "..") {
        return Err(ReportingError::InvalidTopic(topic.to_string()));
    }
    let mut url = Url::parse(endpoint).map_err(|err| {
        ReportingError::Transport(format!("invalid report endpoint {endpoint:?}: {err}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| {
            ReportingError::Transport(format!("report endpoint {endpoint:?} cannot hold a path"))
        })?
        .pop_if_empty()
        .extend(["topics", topic, "messages"]);
    Ok(url)
}

/// Publishes job status messages to an HTTP topic endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatusReporter {
    client: Client,
    endpoint: String,
}

impl HttpStatusReporter {
    /// Creates a reporter publishing to `{endpoint}/topics/{topic}/messages`.
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a reporter that shares `client`.
    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl StatusReporter for HttpStatusReporter {
    async fn should_report(&self, job: &SubmittedJob) -> bool {
        report_topic(job).is_some()
    }

    #[instrument(skip_all, fields(job = %job.spec.job, run_id = %job.name))]
    async fn report(&self, job: &SubmittedJob) -> Result<Vec<SubmittedJob>, ReportingError> {
        let Some(message) = ReportMessage::for_job(job) else {
            return Ok(Vec::new());
        };
        let url = topic_url(&self.endpoint, &message.topic)?;

        let response = self
            .client
            .post(url)
            .json(&message)
            .send()
            .await
            .map_err(|err| ReportingError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportingError::Rejected {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }
        debug!(topic = %message.topic, state = ?message.state, "Job status reported");
        Ok(vec![job.clone()])
    }
}

//! Job submission over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use trigger::{JobSubmitter, SubmissionError, SubmittedJob};

use crate::{error_body, join_url};

/// Submits jobs to an HTTP job sink.
#[derive(Debug, Clone)]
pub struct HttpJobSubmitter {
    client: Client,
    jobs_url: String,
}

impl HttpJobSubmitter {
    /// Creates a submitter posting to `{endpoint}/jobs`.
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a submitter that shares `client`.
    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            jobs_url: join_url(endpoint, "jobs"),
        }
    }
}

#[async_trait]
impl JobSubmitter for HttpJobSubmitter {
    #[instrument(skip_all, fields(job = %job.spec.job, run_id = %job.name))]
    async fn submit(&self, job: &SubmittedJob) -> Result<SubmittedJob, SubmissionError> {
        let response = self
            .client
            .post(&self.jobs_url)
            .json(job)
            .send()
            .await
            .map_err(|err| SubmissionError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let created = response
            .json::<SubmittedJob>()
            .await
            .map_err(|err| SubmissionError::Transport(format!("invalid sink response: {err}")))?;
        debug!(status = status.as_u16(), "Job accepted by sink");
        Ok(created)
    }
}

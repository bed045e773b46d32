//! JobRelay HTTP sink adapters.
//!
//! Implements the outbound ports of the [`trigger`] crate over plain
//! JSON-over-HTTP:
//!
//! - [`HttpJobSubmitter`] ([`trigger::JobSubmitter`]): `POST {endpoint}/jobs`
//!   with the [`trigger::SubmittedJob`] as body. The sink answers with the
//!   created job.
//! - [`HttpStatusReporter`] ([`trigger::StatusReporter`]): publishes a
//!   [`ReportMessage`] to `POST {endpoint}/topics/{topic}/messages` for every
//!   job whose annotations name a report topic.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP clients, URL layout and wire bodies live here. The
//! dispatcher sees only the port traits.

pub mod reporter;
pub mod submitter;

pub use reporter::{HttpStatusReporter, ReportMessage, REPORT_TOPIC_ANNOTATION};
pub use submitter::HttpJobSubmitter;

/// Joins `endpoint` and `path` with exactly one slash between them.
fn join_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Reads an error body for inclusion in an error message.
async fn error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => "empty response body".to_string(),
        Err(err) => format!("unreadable response body: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://sink", "jobs"), "http://sink/jobs");
        assert_eq!(join_url("http://sink/", "/jobs"), "http://sink/jobs");
        assert_eq!(join_url("http://sink/api", "jobs"), "http://sink/api/jobs");
    }
}

//! Port traits implemented by infrastructure crates.
//!
//! The dispatcher in the `dispatch` crate depends on these traits only. The
//! `listener` crate supplies [`Envelope`]s, the `catalog` crate supplies
//! [`CatalogProvider`], and the `sink` crate supplies [`JobSubmitter`] and
//! [`StatusReporter`]. [`DynamicJobCatalog`] has no built-in implementation:
//! fetching job configuration stored inside a repository is left to the
//! embedding deployment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    CatalogError, CommitSha, JobDefinition, OrgRepo, ReportingError, SubmissionError,
    SubmittedJob, SubscriptionName,
};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One delivered message, independent of the transport that delivered it.
///
/// `acknowledge` and `reject` consume the envelope, so exactly one of them is
/// called at most once. Dropping an envelope without either leaves the
/// decision to the transport (usually redelivery after a deadline).
pub trait Envelope: Send + Sync {
    /// Transport attributes attached to the message.
    fn attributes(&self) -> &HashMap<String, String>;

    /// Raw message payload.
    fn payload(&self) -> &[u8];

    /// Transport-assigned message identifier.
    fn id(&self) -> &str;

    /// Confirms the message was processed; it will not be redelivered.
    fn acknowledge(self)
    where
        Self: Sized;

    /// Returns the message to the transport for redelivery.
    fn reject(self)
    where
        Self: Sized;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Read-only view of the static job catalog.
///
/// Implementations must be safe for concurrent reads. Resolvers never mutate
/// a catalog; refreshed content arrives as a new snapshot.
pub trait JobCatalog: Send + Sync {
    /// Every periodic job definition.
    fn all_periodics(&self) -> &[JobDefinition];

    /// Presubmit definitions configured statically for `org_repo`.
    fn static_presubmits(&self, org_repo: &OrgRepo) -> &[JobDefinition];

    /// Postsubmit definitions configured statically for `org_repo`.
    fn static_postsubmits(&self, org_repo: &OrgRepo) -> &[JobDefinition];
}

/// Hands out the current catalog snapshot.
///
/// A dispatch takes one snapshot and uses it for the whole message, even if
/// the owner swaps in a newer one meanwhile.
pub trait CatalogProvider: Send + Sync {
    /// Returns the catalog as it is right now.
    fn snapshot(&self) -> Arc<dyn JobCatalog>;
}

/// A fixed catalog is its own provider.
impl<C> CatalogProvider for Arc<C>
where
    C: JobCatalog + 'static,
{
    fn snapshot(&self) -> Arc<dyn JobCatalog> {
        self.clone()
    }
}

/// Job definitions stored in a repository, resolved at specific commits.
///
/// Results already include the static definitions for the repository, so a
/// successful lookup replaces the static list instead of extending it.
#[async_trait]
pub trait DynamicJobCatalog: Send + Sync {
    /// Presubmits for `org_repo` with the base at `base_sha` and the given pull
    /// heads merged on top.
    async fn presubmits_at(
        &self,
        org_repo: &OrgRepo,
        base_sha: &CommitSha,
        head_shas: &[CommitSha],
    ) -> Result<Vec<JobDefinition>, CatalogError>;

    /// Postsubmits for `org_repo` at `base_sha`.
    async fn postsubmits_at(
        &self,
        org_repo: &OrgRepo,
        base_sha: &CommitSha,
    ) -> Result<Vec<JobDefinition>, CatalogError>;
}

// ---------------------------------------------------------------------------
// Job creation and reporting
// ---------------------------------------------------------------------------

/// Accepts fully-specified jobs for execution.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Creates the job and returns it as stored by the sink.
    async fn submit(&self, job: &SubmittedJob) -> Result<SubmittedJob, SubmissionError>;
}

/// Publishes job state transitions to interested parties.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Whether `job` should be reported at all. Checked before every report.
    async fn should_report(&self, job: &SubmittedJob) -> bool;

    /// Reports `job`'s current state, returning the jobs as updated by the
    /// reporter.
    async fn report(&self, job: &SubmittedJob) -> Result<Vec<SubmittedJob>, ReportingError>;
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Message counters, tagged by subscription. Must tolerate concurrent calls.
pub trait DispatchMetrics: Send + Sync {
    /// One message arrived on `subscription`.
    fn record_received(&self, subscription: &SubscriptionName);

    /// One message on `subscription` ended in an error.
    fn record_error(&self, subscription: &SubscriptionName);
}

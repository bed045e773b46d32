//! Doubles shared by the listener tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog::{StaticCatalog, SubscriptionConfig};
use dispatch::{Dispatcher, OtelDispatchMetrics};
use tokio::sync::oneshot;
use trigger::{
    JobDefinition, JobSubmitter, ReportingError, StatusReporter, SubmissionError, SubmittedJob,
    SubscriptionName, TriggerEvent,
};

use crate::{ChannelEnvelope, Disposition, SubscriptionWorker};

pub(crate) const SUBSCRIPTION: &str = "ci-triggers";

/// Accepts every job after a short delay and tracks peak concurrency.
#[derive(Default)]
pub(crate) struct SlowSubmitter {
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    submitted: Mutex<Vec<SubmittedJob>>,
}

impl SlowSubmitter {
    pub(crate) fn submitted(&self) -> Vec<SubmittedJob> {
        self.submitted.lock().expect("lock").clone()
    }
}

#[async_trait]
impl JobSubmitter for SlowSubmitter {
    async fn submit(&self, job: &SubmittedJob) -> Result<SubmittedJob, SubmissionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.submitted.lock().expect("lock").push(job.clone());
        Ok(job.clone())
    }
}

pub(crate) struct SilentReporter;

#[async_trait]
impl StatusReporter for SilentReporter {
    async fn should_report(&self, _job: &SubmittedJob) -> bool {
        false
    }

    async fn report(&self, _job: &SubmittedJob) -> Result<Vec<SubmittedJob>, ReportingError> {
        Ok(Vec::new())
    }
}

/// A worker for [`SUBSCRIPTION`] whose catalog holds one periodic,
/// `nightly-build`, on cluster `build`.
pub(crate) fn worker(submitter: Arc<SlowSubmitter>, max_in_flight: usize) -> Arc<SubscriptionWorker> {
    let catalog = Arc::new(StaticCatalog {
        periodics: vec![JobDefinition::new("nightly-build").with_cluster("build")],
        ..StaticCatalog::default()
    });
    let dispatcher = Dispatcher::new(
        Arc::new(catalog),
        submitter,
        Arc::new(SilentReporter),
        Arc::new(OtelDispatchMetrics::global()),
    );
    let config = SubscriptionConfig {
        name: SubscriptionName::new(SUBSCRIPTION).expect("non-empty"),
        allowed_clusters: vec!["*".to_string()],
        max_in_flight,
    };
    Arc::new(SubscriptionWorker::new(dispatcher, config))
}

/// A periodic trigger for `job` in a channel envelope.
pub(crate) fn periodic(id: &str, job: &str) -> (ChannelEnvelope, oneshot::Receiver<Disposition>) {
    let message = TriggerEvent::new(job).to_message().expect("event encodes");
    ChannelEnvelope::from_message(id, message)
}

//! Event-to-job dispatch.
//!
//! [`Dispatcher::handle`] processes one envelope:
//!
//! 1. count the message and read the event-class attribute;
//! 2. pick the [`JobClass`] and decode the [`TriggerEvent`];
//! 3. resolve the job against the current catalog snapshot;
//! 4. enforce the subscription's cluster allow-list;
//! 5. merge event labels, annotations and environment into the job;
//! 6. submit it and report the outcome.
//!
//! Every failure is counted once and returned. Failures after decoding are
//! also reported against a job record, so unresolvable events still leave a
//! trace for whoever sent them. The envelope itself is never acknowledged
//! here; that is the caller's decision.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use trigger::{
    CatalogProvider, DispatchError, DispatchMetrics, DynamicJobCatalog, Envelope, JobClass,
    JobSubmitter, Labels, Outcome, StatusReporter, SubmittedJob, SubscriptionName,
    TriggerEvent, ValidationError, EVENT_TYPE_ATTRIBUTE,
};

/// Allow-list entry matching every cluster.
pub const ANY_CLUSTER: &str = "*";

/// Drives envelopes through resolution, submission and reporting.
///
/// Holds no per-message state; one instance is shared by every concurrent
/// handling task.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<dyn CatalogProvider>,
    dynamic_catalog: Option<Arc<dyn DynamicJobCatalog>>,
    submitter: Arc<dyn JobSubmitter>,
    reporter: Arc<dyn StatusReporter>,
    metrics: Arc<dyn DispatchMetrics>,
}

impl Dispatcher {
    /// Creates a dispatcher with no dynamic catalog.
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        submitter: Arc<dyn JobSubmitter>,
        reporter: Arc<dyn StatusReporter>,
        metrics: Arc<dyn DispatchMetrics>,
    ) -> Self {
        Self {
            catalog,
            dynamic_catalog: None,
            submitter,
            reporter,
            metrics,
        }
    }

    /// Consults `dynamic_catalog` for presubmit and postsubmit lookups.
    pub fn with_dynamic_catalog(mut self, dynamic_catalog: Arc<dyn DynamicJobCatalog>) -> Self {
        self.dynamic_catalog = Some(dynamic_catalog);
        self
    }

    /// Handles one envelope delivered on `subscription`.
    ///
    /// `allowed_clusters` is the subscription's cluster allow-list; `"*"`
    /// allows every cluster.
    ///
    /// # Errors
    ///
    /// Returns the first failure. All failures are terminal: the caller should
    /// acknowledge the envelope regardless.
    #[instrument(skip_all, fields(subscription = %subscription, message_id = %envelope.id()))]
    pub async fn handle<E: Envelope>(
        &self,
        envelope: &E,
        subscription: &SubscriptionName,
        allowed_clusters: &[String],
    ) -> Result<(), DispatchError> {
        self.metrics.record_received(subscription);
        info!("Received message");

        let result = self.dispatch(envelope, allowed_clusters).await;
        if let Err(err) = &result {
            self.metrics.record_error(subscription);
            debug!(error = %err, "Failed to create job");
        }
        result
    }

    async fn dispatch<E: Envelope>(
        &self,
        envelope: &E,
        allowed_clusters: &[String],
    ) -> Result<(), DispatchError> {
        let event_type = envelope
            .attributes()
            .get(EVENT_TYPE_ATTRIBUTE)
            .ok_or(DispatchError::MissingAttribute {
                key: EVENT_TYPE_ATTRIBUTE,
            })
            .inspect_err(|err| error!(error = %err, "Failed to read message"))?;

        let Some(class) = JobClass::from_event_type(event_type) else {
            debug!(event_type = %event_type, "Unsupported event type");
            return Err(DispatchError::UnsupportedEventType(event_type.clone()));
        };

        let mut event = TriggerEvent::from_payload(envelope.payload())?;
        event.name = event.name.trim().to_string();

        self.dispatch_event(class, event, allowed_clusters).await
    }

    async fn dispatch_event(
        &self,
        class: JobClass,
        event: TriggerEvent,
        allowed_clusters: &[String],
    ) -> Result<(), DispatchError> {
        let catalog = self.catalog.snapshot();
        let resolution = match class
            .resolve(catalog.as_ref(), self.dynamic_catalog.as_deref(), &event)
            .await
        {
            Ok(resolution) => resolution,
            Err(err) => {
                // User errors: missing fields, unknown or ambiguous job.
                debug!(error = %err, job = %event.name, "Failed getting job spec");
                let mut job = SubmittedJob::unresolved(&event.annotations);
                self.report(&mut job, Outcome::Error(err.to_string())).await;
                return Err(err.into());
            }
        };

        if !cluster_is_allowed(&resolution.spec.cluster, allowed_clusters) {
            let err = ValidationError::ClusterNotAllowed {
                cluster: resolution.spec.cluster.clone(),
            };
            warn!(cluster = %resolution.spec.cluster, "Cluster not allowed");
            let mut job = SubmittedJob::new(resolution.spec, Labels::new(), &event.annotations);
            self.report(&mut job, Outcome::Error(err.to_string())).await;
            return Err(err.into());
        }

        let mut labels = resolution.labels;
        labels.extend(event.labels.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut job = SubmittedJob::new(resolution.spec, labels, &event.annotations);
        if let Some(template) = job.spec.pod_template.as_mut() {
            template.append_envs(&event.envs);
        }

        match self.submitter.submit(&job).await {
            Ok(_) => {
                info!(job = %event.name, name = %job.name, "Job created.");
                self.report(&mut job, Outcome::Triggered).await;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, job = %event.name, name = %job.name, "Failed to create job");
                self.report(&mut job, Outcome::Error(err.to_string())).await;
                Err(err.into())
            }
        }
    }

    /// Records `outcome` on `job` and reports it if the reporter wants it.
    ///
    /// Reporting failures are logged and dropped.
    async fn report(&self, job: &mut SubmittedJob, outcome: Outcome) {
        job.record_outcome(&outcome);
        if !self.reporter.should_report(job).await {
            return;
        }
        if let Err(err) = self.reporter.report(job).await {
            warn!(error = %err, name = %job.name, "Failed to report status.");
        }
    }
}

/// Fail-closed cluster check: only an explicit match or [`ANY_CLUSTER`] allows.
fn cluster_is_allowed(cluster: &str, allowed_clusters: &[String]) -> bool {
    allowed_clusters
        .iter()
        .any(|allowed| allowed == ANY_CLUSTER || allowed == cluster)
}

//! Per-subscription envelope processing.

use std::sync::Arc;

use catalog::SubscriptionConfig;
use dispatch::Dispatcher;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use trigger::{Envelope, SubscriptionName};

/// Processes the envelopes of one subscription.
///
/// Every envelope that reaches [`SubscriptionWorker::process`] is
/// acknowledged once the dispatcher returns, whether or not a job was
/// created. Dispatch failures are caused by the event itself, so
/// redelivering it would only fail again.
///
/// At most `max_in_flight` envelopes are dispatched at once, counted across
/// [`SubscriptionWorker::process`] and [`SubscriptionWorker::run`].
pub struct SubscriptionWorker {
    dispatcher: Dispatcher,
    config: SubscriptionConfig,
    permits: Arc<Semaphore>,
}

impl SubscriptionWorker {
    /// Binds `config` to `dispatcher`.
    pub fn new(dispatcher: Dispatcher, config: SubscriptionConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        Self {
            dispatcher,
            config,
            permits,
        }
    }

    /// The subscription this worker serves.
    pub fn name(&self) -> &SubscriptionName {
        &self.config.name
    }

    /// Waits for a free slot, dispatches one envelope and then acknowledges it.
    pub async fn process<E: Envelope>(&self, envelope: E) {
        // The semaphore is never closed.
        let _permit = self.permits.acquire().await.ok();
        self.settle(envelope).await;
    }

    async fn settle<E: Envelope>(&self, envelope: E) {
        if let Err(err) = self
            .dispatcher
            .handle(&envelope, &self.config.name, &self.config.allowed_clusters)
            .await
        {
            debug!(
                subscription = %self.config.name,
                message_id = %envelope.id(),
                retryable = err.is_retryable(),
                error = %err,
                "Message dropped after failed dispatch"
            );
        }
        envelope.acknowledge();
    }

    /// Processes envelopes from `envelopes` until the channel closes.
    ///
    /// Each envelope runs in its own task once a slot is free, so the
    /// channel is not drained faster than envelopes are dispatched. Returns
    /// after every started task has finished.
    pub async fn run<E>(self: Arc<Self>, mut envelopes: mpsc::Receiver<E>)
    where
        E: Envelope + 'static,
    {
        let mut tasks = JoinSet::new();
        info!(
            subscription = %self.config.name,
            max_in_flight = self.config.max_in_flight,
            "Subscription worker started"
        );

        while let Some(envelope) = envelopes.recv().await {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let worker = self.clone();
            tasks.spawn(async move {
                worker.settle(envelope).await;
                drop(permit);
            });
            while let Some(finished) = tasks.try_join_next() {
                log_join_error(&self.config.name, finished);
            }
        }

        while let Some(finished) = tasks.join_next().await {
            log_join_error(&self.config.name, finished);
        }
        info!(subscription = %self.config.name, "Subscription worker stopped");
    }
}

fn log_join_error(subscription: &SubscriptionName, result: Result<(), tokio::task::JoinError>) {
    // A panicking task dropped its envelope unsettled; the transport redelivers it.
    if let Err(err) = result {
        error!(subscription = %subscription, error = %err, "Message handling task failed");
    }
}

//! OpenTelemetry message counters.

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;
use trigger::{DispatchMetrics, SubscriptionName};

/// Attribute key tagging every counter increment.
pub const SUBSCRIPTION_ATTRIBUTE: &str = "subscription";

/// [`DispatchMetrics`] backed by two OpenTelemetry counters.
///
/// Counter handles are cheap to clone and safe to increment from any task.
/// With no meter provider installed, increments are no-ops.
#[derive(Clone)]
pub struct OtelDispatchMetrics {
    received: Counter<u64>,
    errors: Counter<u64>,
}

impl OtelDispatchMetrics {
    /// Creates the counters on `meter`.
    pub fn new(meter: &Meter) -> Self {
        let received = meter
            .u64_counter("jobrelay.messages.received")
            .with_description("Number of trigger messages received, by subscription")
            .build();
        let errors = meter
            .u64_counter("jobrelay.messages.errors")
            .with_description("Number of trigger messages that failed to produce a job, by subscription")
            .build();
        Self { received, errors }
    }

    /// Creates the counters on the global meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter("jobrelay"))
    }
}

impl DispatchMetrics for OtelDispatchMetrics {
    fn record_received(&self, subscription: &SubscriptionName) {
        self.received.add(
            1,
            &[KeyValue::new(SUBSCRIPTION_ATTRIBUTE, subscription.to_string())],
        );
    }

    fn record_error(&self, subscription: &SubscriptionName) {
        self.errors.add(
            1,
            &[KeyValue::new(SUBSCRIPTION_ATTRIBUTE, subscription.to_string())],
        );
    }
}

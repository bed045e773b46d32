//! Logging, tracing and metrics wiring.
//!
//! Logs are always written to stdout as JSON. When an OTLP endpoint is
//! given, spans are exported through `tracing-opentelemetry` and the global
//! meter provider exports the dispatch counters over the same endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// `service.name` reported to the collector.
pub const SERVICE_NAME: &str = "jobrelay";

const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Exporter handles that must be flushed before the process exits.
#[derive(Default)]
pub struct Telemetry {
    tracer_provider: Option<TracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Flushes and stops the exporters.
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider {
            if let Err(err) = provider.shutdown() {
                tracing::warn!(error = %err, "Failed to shut down trace exporter");
            }
        }
        if let Some(provider) = self.meter_provider {
            if let Err(err) = provider.shutdown() {
                tracing::warn!(error = %err, "Failed to shut down metrics exporter");
            }
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init(log_level: &str, otlp_endpoint: Option<&str>) -> Result<Telemetry> {
    let filter = log_filter(log_level)?;
    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false);

    let Some(endpoint) = otlp_endpoint else {
        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(Telemetry::default());
    };

    let resource = Resource::new([KeyValue::new("service.name", SERVICE_NAME)]);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to build OTLP span exporter")?;
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_resource(resource.clone())
        .build();
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to build OTLP metric exporter")?;
    let reader = PeriodicReader::builder(metric_exporter, runtime::Tokio)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();
    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    opentelemetry::global::set_meter_provider(meter_provider.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Telemetry {
        tracer_provider: Some(tracer_provider),
        meter_provider: Some(meter_provider),
    })
}

fn log_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("Failed to create log filter")
}

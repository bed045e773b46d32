//! JobRelay entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: command-line flags (each with an environment
//!    fallback) and the YAML configuration file they point to.
//! 2. **Wire observability**: JSON logs through `tracing-subscriber`, plus
//!    OTLP span and metric export when `--otlp-endpoint` is set.
//! 3. **Construct infrastructure**: the shared catalog and its reload task,
//!    the HTTP submitter and reporter, and the OpenTelemetry dispatch metrics,
//!    all injected into one [`Dispatcher`].
//! 4. **Serve**: one [`SubscriptionWorker`] per configured subscription behind
//!    the push router, until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use catalog::{RelayConfig, SharedCatalog};
use clap::Parser;
use dispatch::{Dispatcher, OtelDispatchMetrics};
use listener::SubscriptionWorker;
use sink::{HttpJobSubmitter, HttpStatusReporter};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use trigger::{ReportingError, StatusReporter, SubmittedJob};

mod observability;

/// JobRelay: turns trigger events into job submissions.
#[derive(Debug, Parser)]
#[command(name = "jobrelay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file (subscriptions and job catalog)
    #[arg(long, env = "JOBRELAY_CONFIG", value_name = "FILE")]
    config: PathBuf,

    /// Address the push endpoint listens on
    #[arg(long, env = "JOBRELAY_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Base URL of the job sink; jobs are posted to `{url}/jobs`
    #[arg(long, env = "JOBRELAY_SUBMIT_ENDPOINT", value_name = "URL")]
    submit_endpoint: String,

    /// Base URL of the status topic endpoint; reporting is off when unset
    #[arg(long, env = "JOBRELAY_REPORT_ENDPOINT", value_name = "URL")]
    report_endpoint: Option<String>,

    /// OTLP gRPC collector endpoint; export is off when unset
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", value_name = "URL")]
    otlp_endpoint: Option<String>,

    /// Seconds between catalog reloads
    #[arg(
        long,
        env = "JOBRELAY_RELOAD_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    reload_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error) or filter directives
    #[arg(long, env = "JOBRELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Reporter used when no report endpoint is configured.
struct NoReporting;

#[async_trait]
impl StatusReporter for NoReporting {
    async fn should_report(&self, _job: &SubmittedJob) -> bool {
        false
    }

    async fn report(&self, _job: &SubmittedJob) -> Result<Vec<SubmittedJob>, ReportingError> {
        Ok(Vec::new())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = observability::init(&cli.log_level, cli.otlp_endpoint.as_deref())?;

    let result = run(cli).await;
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "JobRelay failed");
    }

    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = RelayConfig::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if config.subscriptions.is_empty() {
        bail!("{} configures no subscriptions", cli.config.display());
    }
    info!(
        config = %cli.config.display(),
        subscriptions = config.subscriptions.len(),
        jobs = config.catalog.len(),
        "Configuration loaded"
    );

    let catalog = Arc::new(SharedCatalog::new(config.catalog));
    let reload = catalog.clone().spawn_reload(
        cli.config.clone(),
        Duration::from_secs(cli.reload_interval_secs),
    );

    let reporter: Arc<dyn StatusReporter> = match &cli.report_endpoint {
        Some(endpoint) => Arc::new(HttpStatusReporter::new(endpoint)),
        None => Arc::new(NoReporting),
    };
    let dispatcher = Dispatcher::new(
        catalog,
        Arc::new(HttpJobSubmitter::new(&cli.submit_endpoint)),
        reporter,
        Arc::new(OtelDispatchMetrics::global()),
    );
    let workers = config
        .subscriptions
        .into_iter()
        .map(|subscription| Arc::new(SubscriptionWorker::new(dispatcher.clone(), subscription)));
    let app = listener::router(workers);

    let tcp = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.listen))?;
    info!(address = %cli.listen, "JobRelay listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    reload.abort();
    info!("JobRelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "jobrelay",
            "--config",
            "/etc/jobrelay/config.yaml",
            "--submit-endpoint",
            "http://sink:8080",
        ])
        .expect("valid flags");

        assert_eq!(cli.config, PathBuf::from("/etc/jobrelay/config.yaml"));
        assert_eq!(cli.submit_endpoint, "http://sink:8080");
        assert_eq!(cli.listen, "0.0.0.0:8080".parse::<SocketAddr>().expect("address"));
        assert_eq!(cli.reload_interval_secs, 60);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn zero_reload_interval_is_rejected() {
        let result = Cli::try_parse_from([
            "jobrelay",
            "--config",
            "c.yaml",
            "--submit-endpoint",
            "http://sink",
            "--reload-interval-secs",
            "0",
        ]);

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn without_endpoint_nothing_is_reported() {
        let job = SubmittedJob::unresolved(&trigger::Labels::new());

        assert!(!NoReporting.should_report(&job).await);
        assert!(NoReporting.report(&job).await.expect("no-op").is_empty());
    }
}

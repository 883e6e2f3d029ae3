// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// - Log level from `RUST_LOG` when set, otherwise from configuration
/// - JSON output with span context, or human-readable output
///
/// Fails instead of panicking when a global subscriber is already installed.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, json = json, "Structured logging initialized");
    Ok(())
}

/// Initialize the Prometheus metrics exporter and describe control-plane metrics
///
/// - inventory_scans_total: completed inventory scans
/// - inventory_repaired_total: jobs purged during scans, by reason
/// - trigger_mapping_failures_total: triggers dropped during normalization, by reason
/// - inventory_jobs: jobs in the latest snapshot
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("inventory_scans_total", "Total number of inventory scans");
    describe_counter!(
        "inventory_repaired_total",
        "Jobs deleted from the engine because their state was inconsistent"
    );
    describe_counter!(
        "trigger_mapping_failures_total",
        "Triggers left out of trigger lists because they could not be normalized"
    );
    describe_gauge!("inventory_jobs", "Number of jobs in the latest inventory snapshot");

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_inventory_scan(job_count: usize) {
    counter!("inventory_scans_total").increment(1);
    gauge!("inventory_jobs").set(job_count as f64);
}

#[inline]
pub fn record_inventory_repair(reason: &'static str) {
    counter!("inventory_repaired_total", "reason" => reason).increment(1);
}

#[inline]
pub fn record_trigger_mapping_failure(reason: &'static str) {
    counter!("trigger_mapping_failures_total", "reason" => reason).increment(1);
}

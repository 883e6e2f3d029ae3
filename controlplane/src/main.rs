// Control plane daemon entry point
//
// Loads configuration, registers configured jobs against the in-memory
// engine and audits the inventory until interrupted.

mod audit;
mod seed;

use audit::{AuditConfig, InventoryAuditor};
use common::config::Settings;
use common::registry::JobClassRegistry;
use common::{telemetry, InMemoryScheduler, JobMonitors, SchedulerBackend};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.json_logs,
    )?;
    info!("Starting job control plane");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    if settings.observability.metrics_port != 0 {
        telemetry::init_metrics(settings.observability.metrics_port)?;
    }

    let time_zone = settings.scheduler.time_zone()?;
    let registry: JobClassRegistry = settings.job_classes.iter().cloned().collect();
    info!(
        job_classes = registry.len(),
        time_zone = %time_zone,
        "Configuration loaded"
    );

    let engine = Arc::new(InMemoryScheduler::new()) as Arc<dyn SchedulerBackend>;
    let monitors = JobMonitors::new(engine, Arc::new(registry)).with_time_zone(time_zone);

    seed::seed_jobs(&monitors, &settings.jobs).await.map_err(|e| {
        error!(error = %e, "Failed to register configured jobs");
        e
    })?;

    let auditor = Arc::new(InventoryAuditor::new(
        AuditConfig::from(&settings.scheduler),
        monitors,
    ));
    let auditor_for_shutdown = auditor.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        auditor_for_shutdown.stop();
    });

    auditor.start().await?;

    info!("Job control plane stopped");
    Ok(())
}

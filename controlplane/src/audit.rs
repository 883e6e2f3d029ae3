// Periodic inventory audit
//
// Runs an inventory scan on a fixed interval so inconsistent entries are
// purged even when nobody asks for the inventory.

use common::config::SchedulerConfig;
use common::errors::SchedulerError;
use common::monitor::InventoryReport;
use common::JobMonitors;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub interval_seconds: u64,
    pub include_triggers: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            include_triggers: true,
        }
    }
}

impl From<&SchedulerConfig> for AuditConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval_seconds: config.audit_interval_seconds,
            include_triggers: config.include_triggers,
        }
    }
}

pub struct InventoryAuditor {
    config: AuditConfig,
    monitors: JobMonitors,
    shutdown_tx: watch::Sender<bool>,
}

impl InventoryAuditor {
    pub fn new(config: AuditConfig, monitors: JobMonitors) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            config,
            monitors,
            shutdown_tx,
        }
    }

    /// Run one scan and log what it found
    #[instrument(skip(self))]
    pub async fn audit_once(&self) -> Result<InventoryReport, SchedulerError> {
        let report = self
            .monitors
            .distribute_task_report(self.config.include_triggers)
            .await?;

        for repaired in &report.repaired {
            warn!(
                job_key = %repaired.job_key,
                reason = repaired.reason.label(),
                "Audit purged job"
            );
        }
        for skipped in &report.skipped_triggers {
            warn!(
                trigger_key = %skipped.trigger_key,
                reason = %skipped.reason,
                "Audit could not normalize trigger"
            );
        }
        if report.is_clean() {
            debug!(jobs = report.tasks.len(), "Inventory is consistent");
        }
        Ok(report)
    }

    /// Audit on every tick until `stop` is called
    #[instrument(skip(self))]
    pub async fn start(&self) -> anyhow::Result<()> {
        info!(
            interval_seconds = self.config.interval_seconds,
            include_triggers = self.config.include_triggers,
            time_zone = %self.monitors.time_zone(),
            "Starting inventory auditor"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(Duration::from_secs(self.config.interval_seconds));

        while !*shutdown_rx.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.audit_once().await {
                        // Keep auditing; the engine may come back
                        error!(error = %e, "Inventory audit failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping auditor");
                }
            }
        }

        info!("Inventory auditor stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

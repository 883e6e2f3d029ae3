// Inventory scanning with self-repair
//
// Walks every group and job key the engine reports and builds a fresh
// snapshot. Entries whose backing state is inconsistent are deleted from the
// engine and left out, so one bad job never fails the whole scan.

use super::info::{DistributeTaskInfo, InventoryReport, RepairReason, RepairedJob, SkippedTrigger};
use super::JobMonitors;
use crate::errors::SchedulerError;
use crate::models::JobKey;
use crate::telemetry;
use tracing::{error, info, instrument, warn};

impl JobMonitors {
    /// Snapshot of all jobs, with their normalized triggers
    pub async fn distribute_task_list_with_triggers(
        &self,
    ) -> Result<Vec<DistributeTaskInfo>, SchedulerError> {
        self.distribute_task_list(true).await
    }

    pub async fn distribute_task_list(
        &self,
        include_triggers: bool,
    ) -> Result<Vec<DistributeTaskInfo>, SchedulerError> {
        Ok(self.distribute_task_report(include_triggers).await?.tasks)
    }

    /// Scan the engine inventory and report what was repaired along the way.
    ///
    /// Stale keys (listed but gone) and corrupt jobs (detail unreadable) are
    /// deleted from the engine. An unavailable engine aborts the scan
    /// without deleting anything.
    #[instrument(skip(self))]
    pub async fn distribute_task_report(
        &self,
        include_triggers: bool,
    ) -> Result<InventoryReport, SchedulerError> {
        let mut report = InventoryReport::default();

        for group in self.scheduler.get_job_group_names().await? {
            for job_key in self.scheduler.get_job_keys(&group).await? {
                if !self.scheduler.check_exists(&job_key).await? {
                    self.repair(&mut report, job_key, RepairReason::Stale).await?;
                    continue;
                }

                match self.extract_task(&job_key, include_triggers).await {
                    Ok(Some((task, skipped))) => {
                        report.tasks.push(task);
                        report.skipped_triggers.extend(skipped);
                    }
                    Ok(None) => {
                        self.repair(&mut report, job_key, RepairReason::Stale).await?;
                    }
                    Err(e) if e.is_unavailable() => return Err(e),
                    Err(e) => {
                        error!(job_key = %job_key, error = %e, "Failed to read job, deleting it");
                        self.repair(&mut report, job_key, RepairReason::Corrupt(e.to_string()))
                            .await?;
                    }
                }
            }
        }

        telemetry::record_inventory_scan(report.tasks.len());
        info!(
            jobs = report.tasks.len(),
            repaired = report.repaired.len(),
            skipped_triggers = report.skipped_triggers.len(),
            "Inventory scan completed"
        );
        Ok(report)
    }

    /// Read one job; `None` when the engine no longer has its detail
    async fn extract_task(
        &self,
        job_key: &JobKey,
        include_triggers: bool,
    ) -> Result<Option<(DistributeTaskInfo, Vec<SkippedTrigger>)>, SchedulerError> {
        let Some(detail) = self.scheduler.get_job_detail(job_key).await? else {
            return Ok(None);
        };

        let mut task = DistributeTaskInfo::from(detail);
        let mut skipped = Vec::new();
        if include_triggers {
            let trigger_report = self.job_trigger_report(job_key).await?;
            task.triggers = Some(trigger_report.triggers);
            skipped = trigger_report.skipped;
        }
        Ok(Some((task, skipped)))
    }

    async fn repair(
        &self,
        report: &mut InventoryReport,
        job_key: JobKey,
        reason: RepairReason,
    ) -> Result<(), SchedulerError> {
        let deleted = self.scheduler.delete_job(&job_key).await?;
        warn!(
            job_key = %job_key,
            reason = reason.label(),
            deleted = deleted,
            "Purged inconsistent job from inventory"
        );
        telemetry::record_inventory_repair(reason.label());
        report.repaired.push(RepairedJob { job_key, reason });
        Ok(())
    }
}

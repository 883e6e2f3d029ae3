// Job lifecycle operations
//
// Operations on a missing job return `false` (or `None`) instead of an
// error; only engine faults are errors.

use super::JobMonitors;
use crate::errors::SchedulerError;
use crate::models::{JobDetail, JobKey, Trigger, TriggerBuilder, TriggerKey, TriggerSchedule};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

impl JobMonitors {
    #[instrument(skip(self))]
    pub async fn delete_job(&self, group: &str, name: &str) -> Result<bool, SchedulerError> {
        let job_key = JobKey::new(group, name);
        if !self.scheduler.check_exists(&job_key).await? {
            debug!(job_key = %job_key, "Job does not exist, nothing to delete");
            return Ok(false);
        }
        let deleted = self.scheduler.delete_job(&job_key).await?;
        info!(job_key = %job_key, deleted = deleted, "Job deleted");
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn pause_job(&self, group: &str, name: &str) -> Result<bool, SchedulerError> {
        let job_key = JobKey::new(group, name);
        if !self.scheduler.check_exists(&job_key).await? {
            return Ok(false);
        }
        self.scheduler.pause_job(&job_key).await?;
        info!(job_key = %job_key, "Job paused");
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn resume_job(&self, group: &str, name: &str) -> Result<bool, SchedulerError> {
        let job_key = JobKey::new(group, name);
        if !self.scheduler.check_exists(&job_key).await? {
            return Ok(false);
        }
        self.scheduler.resume_job(&job_key).await?;
        info!(job_key = %job_key, "Job resumed");
        Ok(true)
    }

    pub async fn restart_job(&self, group: &str, name: &str) -> Result<bool, SchedulerError> {
        self.restart_job_key(&JobKey::new(group, name)).await
    }

    /// Pause then immediately resume a job: clears paused state without
    /// firing the job out of cycle
    #[instrument(skip(self), fields(job_key = %job_key))]
    pub async fn restart_job_key(&self, job_key: &JobKey) -> Result<bool, SchedulerError> {
        if !self.scheduler.check_exists(job_key).await? {
            return Ok(false);
        }
        self.scheduler.pause_job(job_key).await?;
        self.scheduler.resume_job(job_key).await?;
        info!("Job restarted");
        Ok(true)
    }

    /// Re-register every trigger of a job against its current detail.
    ///
    /// Each trigger is submitted exactly once, with replace semantics, so
    /// calling this repeatedly is harmless. A missing job or a job without
    /// triggers is an error.
    #[instrument(skip(self))]
    pub async fn schedule_job(&self, group: &str, name: &str) -> Result<(), SchedulerError> {
        let job_key = JobKey::new(group, name);
        let detail = self
            .scheduler
            .get_job_detail(&job_key)
            .await?
            .ok_or_else(|| SchedulerError::JobNotFound(job_key.clone()))?;
        let triggers = self.scheduler.get_triggers_of_job(&job_key).await?;
        if triggers.is_empty() {
            return Err(SchedulerError::NoTriggers(job_key));
        }

        let trigger_count = triggers.len();
        self.scheduler.schedule_job(detail, triggers, true).await?;
        info!(job_key = %job_key, trigger_count = trigger_count, "Job triggers re-registered");
        Ok(())
    }

    /// Register a job of class `class_name` with one cron trigger named
    /// `"trigger" + name` in the same group, starting now.
    ///
    /// Returns `false` without touching the engine when the class is not
    /// registered.
    #[instrument(skip(self, description))]
    pub async fn add_job(
        &self,
        group: &str,
        name: &str,
        class_name: &str,
        description: &str,
        cron_expression: &str,
        replace: bool,
    ) -> Result<bool, SchedulerError> {
        let Some(job_class) = self.registry.resolve(class_name) else {
            warn!(class = class_name, "Job class not registered, job not added");
            return Ok(false);
        };

        let job_key = JobKey::new(group, name);
        let detail = JobDetail::new(job_key.clone(), job_class).with_description(description);
        let trigger = TriggerBuilder::new_trigger()
            .with_identity(job_key.group.clone(), format!("trigger{}", name))
            .for_job(job_key.clone())
            .start_now()
            .with_schedule(TriggerSchedule::cron(cron_expression, self.time_zone))
            .build();

        self.scheduler
            .schedule_job(detail, vec![trigger], replace)
            .await?;
        info!(job_key = %job_key, cron_expression = cron_expression, "Job added");
        Ok(true)
    }

    /// Replace a trigger; `None` without side effects if it does not exist,
    /// otherwise the replacement's first fire time
    #[instrument(skip(self, new_trigger), fields(trigger_key = %trigger_key))]
    pub async fn reschedule_job(
        &self,
        trigger_key: &TriggerKey,
        new_trigger: Trigger,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        if self.scheduler.get_trigger(trigger_key).await?.is_none() {
            debug!("Trigger does not exist, nothing to reschedule");
            return Ok(None);
        }
        self.scheduler.reschedule_job(trigger_key, new_trigger).await
    }
}

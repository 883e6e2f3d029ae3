// Trigger control
//
// Acts on one trigger at a time; the job and its other triggers are left
// untouched.

use super::JobMonitors;
use crate::errors::SchedulerError;
use crate::models::TriggerKey;
use tracing::{info, instrument};

impl JobMonitors {
    /// Detach a trigger from its job; `false` if it was not present
    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    pub async fn remove_trigger(&self, trigger_key: &TriggerKey) -> Result<bool, SchedulerError> {
        let removed = self.scheduler.unschedule_job(trigger_key).await?;
        info!(removed = removed, "Trigger removed");
        Ok(removed)
    }

    /// Resume a paused trigger without touching the job's other triggers
    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    pub async fn resume_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError> {
        self.scheduler.resume_trigger(trigger_key).await
    }

    /// Suspend firing of one trigger
    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    pub async fn pause_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError> {
        self.scheduler.pause_trigger(trigger_key).await
    }

    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    pub async fn reset_trigger_from_error_state(
        &self,
        trigger_key: &TriggerKey,
    ) -> Result<(), SchedulerError> {
        self.scheduler.reset_trigger_from_error_state(trigger_key).await
    }
}

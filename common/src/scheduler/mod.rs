// Backing scheduling engine contract
//
// The control plane talks to the engine exclusively through this trait. The
// engine owns persistence, clustering and firing; every call is expected to
// be safe from concurrent callers.

pub mod memory;

pub use memory::InMemoryScheduler;

use crate::errors::SchedulerError;
use crate::models::{JobDetail, JobKey, Trigger, TriggerKey, TriggerState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Capabilities the control plane requires from a backing engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    async fn check_exists(&self, job_key: &JobKey) -> Result<bool, SchedulerError>;

    /// Delete a job and all of its triggers; `false` if the job was not stored
    async fn delete_job(&self, job_key: &JobKey) -> Result<bool, SchedulerError>;

    async fn pause_job(&self, job_key: &JobKey) -> Result<(), SchedulerError>;

    async fn resume_job(&self, job_key: &JobKey) -> Result<(), SchedulerError>;

    /// Store a job together with its triggers.
    ///
    /// Without `replace`, an existing job or trigger with the same key is an
    /// `ObjectAlreadyExists` error.
    async fn schedule_job(
        &self,
        job_detail: JobDetail,
        triggers: Vec<Trigger>,
        replace: bool,
    ) -> Result<(), SchedulerError>;

    async fn get_job_detail(&self, job_key: &JobKey) -> Result<Option<JobDetail>, SchedulerError>;

    /// Triggers of a job, in the order the engine keeps them
    async fn get_triggers_of_job(&self, job_key: &JobKey) -> Result<Vec<Trigger>, SchedulerError>;

    async fn get_job_group_names(&self) -> Result<Vec<String>, SchedulerError>;

    async fn get_job_keys(&self, group: &str) -> Result<Vec<JobKey>, SchedulerError>;

    async fn get_trigger(&self, trigger_key: &TriggerKey)
        -> Result<Option<Trigger>, SchedulerError>;

    /// Replace a stored trigger; returns the replacement's first fire time,
    /// or `None` when no trigger is stored under `trigger_key`
    async fn reschedule_job(
        &self,
        trigger_key: &TriggerKey,
        new_trigger: Trigger,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError>;

    /// Remove a trigger; `false` if it was not stored
    async fn unschedule_job(&self, trigger_key: &TriggerKey) -> Result<bool, SchedulerError>;

    async fn pause_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError>;

    async fn resume_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError>;

    async fn reset_trigger_from_error_state(
        &self,
        trigger_key: &TriggerKey,
    ) -> Result<(), SchedulerError>;

    /// `TriggerState::None` for triggers that are not stored
    async fn get_trigger_state(&self, trigger_key: &TriggerKey)
        -> Result<TriggerState, SchedulerError>;
}

// In-memory backing engine
//
// Keeps jobs and triggers in process memory behind a single lock. It stores,
// validates and reports state; it never fires jobs.

use super::SchedulerBackend;
use crate::errors::SchedulerError;
use crate::models::{JobDetail, JobKey, Trigger, TriggerKey, TriggerSchedule, TriggerState};
use crate::schedule;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
struct JobRecord {
    detail: JobDetail,
    /// Trigger keys in registration order
    triggers: Vec<TriggerKey>,
    paused: bool,
}

#[derive(Debug)]
struct TriggerRecord {
    trigger: Trigger,
    state: TriggerState,
}

#[derive(Debug, Default)]
struct JobStore {
    jobs: BTreeMap<JobKey, JobRecord>,
    triggers: HashMap<TriggerKey, TriggerRecord>,
}

impl JobStore {
    fn remove_job(&mut self, job_key: &JobKey) -> bool {
        match self.jobs.remove(job_key) {
            Some(record) => {
                for trigger_key in &record.triggers {
                    self.triggers.remove(trigger_key);
                }
                true
            }
            None => false,
        }
    }
}

/// Validate a trigger for storage and fill in engine-computed fields
fn prepare_trigger(trigger: &mut Trigger, job_key: &JobKey) -> Result<(), SchedulerError> {
    if let Some(owner) = &trigger.job_key {
        if owner != job_key {
            return Err(SchedulerError::InvalidTrigger {
                key: trigger.key.clone(),
                reason: format!("trigger references job {} but is stored for {}", owner, job_key),
            });
        }
    }
    trigger.job_key = Some(job_key.clone());

    if let TriggerSchedule::Cron {
        cron_expression,
        expression_summary,
        ..
    } = &mut trigger.schedule
    {
        *expression_summary = schedule::expression_summary(cron_expression);
    }

    let first = schedule::first_fire_time(trigger)?.ok_or_else(|| SchedulerError::InvalidTrigger {
        key: trigger.key.clone(),
        reason: "based on configured schedule, the trigger will never fire".to_string(),
    })?;
    trigger.next_fire_time = trigger.next_fire_time.or(Some(first));
    Ok(())
}

fn initial_state(job_paused: bool) -> TriggerState {
    if job_paused {
        TriggerState::Paused
    } else {
        TriggerState::Normal
    }
}

/// Backing engine that keeps all state in memory
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    store: RwLock<JobStore>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a trigger into the ERROR state, as an engine does when a job
    /// cannot be instantiated. Returns `false` if the trigger is not stored.
    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    pub async fn mark_trigger_error(&self, trigger_key: &TriggerKey) -> bool {
        let mut store = self.store.write().await;
        match store.triggers.get_mut(trigger_key) {
            Some(record) => {
                warn!("Trigger moved to ERROR state");
                record.state = TriggerState::Error;
                true
            }
            None => false,
        }
    }

    /// Number of stored jobs
    pub async fn job_count(&self) -> usize {
        self.store.read().await.jobs.len()
    }
}

#[async_trait]
impl SchedulerBackend for InMemoryScheduler {
    async fn check_exists(&self, job_key: &JobKey) -> Result<bool, SchedulerError> {
        Ok(self.store.read().await.jobs.contains_key(job_key))
    }

    #[instrument(skip(self), fields(job_key = %job_key))]
    async fn delete_job(&self, job_key: &JobKey) -> Result<bool, SchedulerError> {
        let deleted = self.store.write().await.remove_job(job_key);
        if deleted {
            info!("Job deleted");
        }
        Ok(deleted)
    }

    #[instrument(skip(self), fields(job_key = %job_key))]
    async fn pause_job(&self, job_key: &JobKey) -> Result<(), SchedulerError> {
        let mut store = self.store.write().await;
        let JobStore { jobs, triggers } = &mut *store;
        if let Some(record) = jobs.get_mut(job_key) {
            record.paused = true;
            for trigger_key in &record.triggers {
                if let Some(trigger) = triggers.get_mut(trigger_key) {
                    if matches!(trigger.state, TriggerState::Normal | TriggerState::Blocked) {
                        trigger.state = TriggerState::Paused;
                    }
                }
            }
            debug!("Job paused");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_key = %job_key))]
    async fn resume_job(&self, job_key: &JobKey) -> Result<(), SchedulerError> {
        let mut store = self.store.write().await;
        let JobStore { jobs, triggers } = &mut *store;
        if let Some(record) = jobs.get_mut(job_key) {
            record.paused = false;
            for trigger_key in &record.triggers {
                if let Some(trigger) = triggers.get_mut(trigger_key) {
                    if trigger.state == TriggerState::Paused {
                        trigger.state = TriggerState::Normal;
                    }
                }
            }
            debug!("Job resumed");
        }
        Ok(())
    }

    #[instrument(skip(self, job_detail, triggers), fields(job_key = %job_detail.key, trigger_count = triggers.len()))]
    async fn schedule_job(
        &self,
        job_detail: JobDetail,
        triggers: Vec<Trigger>,
        replace: bool,
    ) -> Result<(), SchedulerError> {
        if triggers.is_empty() && !job_detail.durable {
            return Err(SchedulerError::Persistence(format!(
                "job {} has no triggers and is not durable",
                job_detail.key
            )));
        }

        let mut store = self.store.write().await;
        let JobStore { jobs, triggers: stored } = &mut *store;
        let job_key = job_detail.key.clone();

        if !replace && jobs.contains_key(&job_key) {
            return Err(SchedulerError::ObjectAlreadyExists(format!("job {}", job_key)));
        }

        let mut batch_keys = BTreeSet::new();
        let mut prepared = Vec::with_capacity(triggers.len());
        for mut trigger in triggers {
            if !batch_keys.insert(trigger.key.clone()) {
                return Err(SchedulerError::ObjectAlreadyExists(format!(
                    "trigger {} submitted twice",
                    trigger.key
                )));
            }
            if let Some(existing) = stored.get(&trigger.key) {
                let owned_here = existing.trigger.job_key.as_ref() == Some(&job_key);
                if !replace || !owned_here {
                    return Err(SchedulerError::ObjectAlreadyExists(format!(
                        "trigger {}",
                        trigger.key
                    )));
                }
            }
            prepare_trigger(&mut trigger, &job_key)?;
            prepared.push(trigger);
        }

        let record = jobs.entry(job_key.clone()).or_insert_with(|| JobRecord {
            detail: job_detail.clone(),
            triggers: Vec::new(),
            paused: false,
        });
        record.detail = job_detail;

        for trigger in prepared {
            let key = trigger.key.clone();
            let state = stored
                .get(&key)
                .map(|existing| existing.state)
                .unwrap_or_else(|| initial_state(record.paused));
            if !record.triggers.contains(&key) {
                record.triggers.push(key.clone());
            }
            stored.insert(key, TriggerRecord { trigger, state });
        }

        info!("Job scheduled");
        Ok(())
    }

    async fn get_job_detail(&self, job_key: &JobKey) -> Result<Option<JobDetail>, SchedulerError> {
        Ok(self
            .store
            .read()
            .await
            .jobs
            .get(job_key)
            .map(|record| record.detail.clone()))
    }

    async fn get_triggers_of_job(&self, job_key: &JobKey) -> Result<Vec<Trigger>, SchedulerError> {
        let store = self.store.read().await;
        let Some(record) = store.jobs.get(job_key) else {
            return Ok(Vec::new());
        };
        Ok(record
            .triggers
            .iter()
            .filter_map(|key| store.triggers.get(key))
            .map(|stored| stored.trigger.clone())
            .collect())
    }

    async fn get_job_group_names(&self) -> Result<Vec<String>, SchedulerError> {
        let store = self.store.read().await;
        let groups: BTreeSet<&String> = store.jobs.keys().map(|key| &key.group).collect();
        Ok(groups.into_iter().cloned().collect())
    }

    async fn get_job_keys(&self, group: &str) -> Result<Vec<JobKey>, SchedulerError> {
        Ok(self
            .store
            .read()
            .await
            .jobs
            .keys()
            .filter(|key| key.group == group)
            .cloned()
            .collect())
    }

    async fn get_trigger(
        &self,
        trigger_key: &TriggerKey,
    ) -> Result<Option<Trigger>, SchedulerError> {
        Ok(self
            .store
            .read()
            .await
            .triggers
            .get(trigger_key)
            .map(|record| record.trigger.clone()))
    }

    #[instrument(skip(self, new_trigger), fields(trigger_key = %trigger_key, new_trigger_key = %new_trigger.key))]
    async fn reschedule_job(
        &self,
        trigger_key: &TriggerKey,
        mut new_trigger: Trigger,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let mut store = self.store.write().await;
        let JobStore { jobs, triggers } = &mut *store;

        let Some(old) = triggers.get(trigger_key) else {
            return Ok(None);
        };
        let Some(job_key) = old.trigger.job_key.clone() else {
            return Err(SchedulerError::Persistence(format!(
                "trigger {} is not attached to a job",
                trigger_key
            )));
        };
        if new_trigger.key != *trigger_key && triggers.contains_key(&new_trigger.key) {
            return Err(SchedulerError::ObjectAlreadyExists(format!(
                "trigger {}",
                new_trigger.key
            )));
        }

        // A replacement starts from scratch; its own fire times are recomputed
        new_trigger.job_key = None;
        new_trigger.next_fire_time = None;
        new_trigger.previous_fire_time = None;
        prepare_trigger(&mut new_trigger, &job_key)?;
        let first_fire_time = new_trigger.next_fire_time;

        let Some(record) = jobs.get_mut(&job_key) else {
            return Err(SchedulerError::Persistence(format!(
                "trigger {} references missing job {}",
                trigger_key, job_key
            )));
        };
        if let Some(slot) = record.triggers.iter_mut().find(|key| *key == trigger_key) {
            *slot = new_trigger.key.clone();
        }
        triggers.remove(trigger_key);
        triggers.insert(
            new_trigger.key.clone(),
            TriggerRecord {
                trigger: new_trigger,
                state: initial_state(record.paused),
            },
        );

        info!(first_fire_time = ?first_fire_time, "Trigger rescheduled");
        Ok(first_fire_time)
    }

    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    async fn unschedule_job(&self, trigger_key: &TriggerKey) -> Result<bool, SchedulerError> {
        let mut store = self.store.write().await;
        let Some(removed) = store.triggers.remove(trigger_key) else {
            return Ok(false);
        };

        if let Some(job_key) = removed.trigger.job_key {
            let orphaned = match store.jobs.get_mut(&job_key) {
                Some(record) => {
                    record.triggers.retain(|key| key != trigger_key);
                    record.triggers.is_empty() && !record.detail.durable
                }
                None => false,
            };
            if orphaned {
                // Non-durable jobs do not outlive their last trigger
                store.jobs.remove(&job_key);
                info!(job_key = %job_key, "Removed non-durable job with no remaining triggers");
            }
        }

        info!("Trigger unscheduled");
        Ok(true)
    }

    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    async fn pause_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError> {
        if let Some(record) = self.store.write().await.triggers.get_mut(trigger_key) {
            if matches!(record.state, TriggerState::Normal | TriggerState::Blocked) {
                record.state = TriggerState::Paused;
                debug!("Trigger paused");
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    async fn resume_trigger(&self, trigger_key: &TriggerKey) -> Result<(), SchedulerError> {
        if let Some(record) = self.store.write().await.triggers.get_mut(trigger_key) {
            if record.state == TriggerState::Paused {
                record.state = TriggerState::Normal;
                debug!("Trigger resumed");
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(trigger_key = %trigger_key))]
    async fn reset_trigger_from_error_state(
        &self,
        trigger_key: &TriggerKey,
    ) -> Result<(), SchedulerError> {
        let mut store = self.store.write().await;
        let JobStore { jobs, triggers } = &mut *store;
        if let Some(record) = triggers.get_mut(trigger_key) {
            if record.state == TriggerState::Error {
                let job_paused = record
                    .trigger
                    .job_key
                    .as_ref()
                    .and_then(|job_key| jobs.get(job_key))
                    .map(|job| job.paused)
                    .unwrap_or(false);
                record.state = initial_state(job_paused);
                info!(state = %record.state, "Trigger reset from error state");
            }
        }
        Ok(())
    }

    async fn get_trigger_state(
        &self,
        trigger_key: &TriggerKey,
    ) -> Result<TriggerState, SchedulerError> {
        Ok(self
            .store
            .read()
            .await
            .triggers
            .get(trigger_key)
            .map(|record| record.state)
            .unwrap_or(TriggerState::None))
    }
}

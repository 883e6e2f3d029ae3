// Error handling framework for the control plane and backing engines

use crate::models::{JobKey, TriggerKey};
use thiserror::Error;

/// Schedule-related errors raised while validating trigger schedules
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid schedule configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors surfaced by a backing scheduling engine or by control-plane operations
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler engine unavailable: {0}")]
    Unavailable(String),

    #[error("Job store failure: {0}")]
    Persistence(String),

    #[error("Object already exists: {0}")]
    ObjectAlreadyExists(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobKey),

    #[error("Job {0} has no triggers to schedule")]
    NoTriggers(JobKey),

    #[error("Invalid trigger {key}: {reason}")]
    InvalidTrigger { key: TriggerKey, reason: String },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl SchedulerError {
    /// Whether the engine itself could not be reached.
    ///
    /// Entry-level faults (corrupt details, bad triggers) are repaired or
    /// skipped during enumeration; an unavailable engine aborts the call.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SchedulerError::Unavailable(_))
    }
}

/// Per-trigger failures while normalizing triggers into `TriggerInfo`
#[derive(Error, Debug)]
pub enum TriggerMappingError {
    #[error("Trigger {key} has unsupported schedule kind '{kind}'")]
    UnsupportedKind { key: TriggerKey, kind: String },

    #[error("Failed to read state of trigger {key}: {source}")]
    State {
        key: TriggerKey,
        #[source]
        source: SchedulerError,
    },
}

impl TriggerMappingError {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            TriggerMappingError::UnsupportedKind { .. } => "unsupported_kind",
            TriggerMappingError::State { .. } => "state_unavailable",
        }
    }

    pub fn trigger_key(&self) -> &TriggerKey {
        match self {
            TriggerMappingError::UnsupportedKind { key, .. } => key,
            TriggerMappingError::State { key, .. } => key,
        }
    }
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

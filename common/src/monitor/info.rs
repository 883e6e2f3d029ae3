// Inventory and trigger projections returned by the control plane

use crate::models::{
    deserialize_tz, serialize_tz, IntervalUnit, JobDataMap, JobDetail, JobKey, TimeOfDay,
    TriggerKey, TriggerState,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Variant-specific part of a normalized trigger.
///
/// Closed set: engine schedule kinds without a variant here are rejected
/// when triggers are normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerDetail {
    Cron {
        cron_expression: String,
        expression_summary: String,
        #[serde(serialize_with = "serialize_tz", deserialize_with = "deserialize_tz")]
        time_zone: Tz,
    },
    SimpleRepeat {
        repeat_count: i32,
        repeat_interval_millis: i64,
        times_triggered: i32,
    },
    DailyTimeWindow {
        days_of_week: BTreeSet<u8>,
        start_time_of_day: TimeOfDay,
        end_time_of_day: TimeOfDay,
        repeat_count: i32,
        repeat_interval: i32,
        repeat_interval_unit: IntervalUnit,
        times_triggered: i32,
    },
    CalendarInterval {
        repeat_interval: i32,
        repeat_interval_unit: IntervalUnit,
        times_triggered: i32,
        #[serde(serialize_with = "serialize_tz", deserialize_with = "deserialize_tz")]
        time_zone: Tz,
    },
}

/// Normalized view of one trigger: common fields plus its variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub trigger_key: TriggerKey,
    pub description: Option<String>,
    pub calendar_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub final_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub misfire_instruction: i32,
    pub priority: i32,
    pub job_data: JobDataMap,
    pub may_fire_again: bool,
    pub state: TriggerState,
    #[serde(flatten)]
    pub detail: TriggerDetail,
}

/// One inventory entry: a job descriptor and optionally its triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeTaskInfo {
    pub group: String,
    pub name: String,
    pub description: Option<String>,
    pub job_class: String,
    pub durable: bool,
    pub concurrent_execution_disallowed: bool,
    pub persist_job_data_after_execution: bool,
    pub requests_recovery: bool,
    pub job_data: JobDataMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<TriggerInfo>>,
}

impl DistributeTaskInfo {
    pub fn key(&self) -> JobKey {
        JobKey::new(self.group.clone(), self.name.clone())
    }
}

impl From<JobDetail> for DistributeTaskInfo {
    fn from(detail: JobDetail) -> Self {
        let concurrent_execution_disallowed = detail.concurrent_execution_disallowed();
        let persist_job_data_after_execution = detail.persist_job_data_after_execution();
        Self {
            group: detail.key.group,
            name: detail.key.name,
            description: detail.description,
            job_class: detail.job_class.name,
            durable: detail.durable,
            concurrent_execution_disallowed,
            persist_job_data_after_execution,
            requests_recovery: detail.requests_recovery,
            job_data: detail.job_data,
            triggers: None,
        }
    }
}

/// A trigger left out of a trigger list, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrigger {
    pub trigger_key: TriggerKey,
    pub reason: String,
}

/// Normalized triggers of one job plus the ones that could not be normalized
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    pub triggers: Vec<TriggerInfo>,
    pub skipped: Vec<SkippedTrigger>,
}

/// Why an inventory entry was purged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum RepairReason {
    /// Listed by the engine but no longer present
    Stale,
    /// Present but its detail could not be read
    Corrupt(String),
}

impl RepairReason {
    pub fn label(&self) -> &'static str {
        match self {
            RepairReason::Stale => "stale",
            RepairReason::Corrupt(_) => "corrupt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairedJob {
    pub job_key: JobKey,
    pub reason: RepairReason,
}

/// Result of a full inventory scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub tasks: Vec<DistributeTaskInfo>,
    pub repaired: Vec<RepairedJob>,
    pub skipped_triggers: Vec<SkippedTrigger>,
}

impl InventoryReport {
    /// No entry needed repair and every trigger was normalized
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.skipped_triggers.is_empty()
    }
}

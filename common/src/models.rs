use crate::errors::ValidationError;
use crate::registry::JobClass;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Group used when a key is built with an empty group
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Default trigger priority
pub const DEFAULT_PRIORITY: i32 = 5;

/// Let the engine pick the misfire behaviour for the trigger kind
pub const MISFIRE_INSTRUCTION_SMART_POLICY: i32 = 0;

/// Fire missed executions as soon as possible, ignoring the misfire
pub const MISFIRE_INSTRUCTION_IGNORE_MISFIRE_POLICY: i32 = -1;

/// Repeat count for triggers that repeat forever
pub const REPEAT_INDEFINITELY: i32 = -1;

/// Arbitrary data attached to jobs and triggers
pub type JobDataMap = HashMap<String, serde_json::Value>;

// Helper functions for Tz serialization
pub(crate) fn serialize_tz<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(tz.name())
}

pub(crate) fn deserialize_tz<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Tz::from_str(&s).map_err(serde::de::Error::custom)
}

fn group_or_default(group: String) -> String {
    if group.is_empty() {
        DEFAULT_GROUP.to_string()
    } else {
        group
    }
}

// ============================================================================
// Keys
// ============================================================================

/// JobKey identifies at most one job in the backing engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub group: String,
    pub name: String,
}

impl JobKey {
    /// An empty `group` is stored as [`DEFAULT_GROUP`], so `("", "x")` and
    /// `("DEFAULT", "x")` name the same job.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group_or_default(group.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// TriggerKey identifies at most one trigger; a job may own several
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    pub group: String,
    pub name: String,
}

impl TriggerKey {
    /// An empty `group` is stored as [`DEFAULT_GROUP`], as for [`JobKey::new`].
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group_or_default(group.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

// ============================================================================
// Job Models
// ============================================================================

/// JobDetail describes a registered job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub key: JobKey,
    pub description: Option<String>,
    pub job_class: JobClass,
    /// Durable jobs stay stored when no trigger references them
    pub durable: bool,
    pub requests_recovery: bool,
    #[serde(default)]
    pub job_data: JobDataMap,
}

impl JobDetail {
    pub fn new(key: JobKey, job_class: JobClass) -> Self {
        Self {
            key,
            description: None,
            job_class,
            durable: false,
            requests_recovery: false,
            job_data: JobDataMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn store_durably(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn request_recovery(mut self, requests_recovery: bool) -> Self {
        self.requests_recovery = requests_recovery;
        self
    }

    pub fn using_job_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.job_data.insert(key.into(), value);
        self
    }

    pub fn concurrent_execution_disallowed(&self) -> bool {
        self.job_class.concurrent_execution_disallowed
    }

    pub fn persist_job_data_after_execution(&self) -> bool {
        self.job_class.persist_job_data_after_execution
    }
}

// ============================================================================
// Trigger Models
// ============================================================================

/// TriggerState is the engine's view of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    None,
    Normal,
    Paused,
    Complete,
    Error,
    Blocked,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerState::None => "NONE",
            TriggerState::Normal => "NORMAL",
            TriggerState::Paused => "PAUSED",
            TriggerState::Complete => "COMPLETE",
            TriggerState::Error => "ERROR",
            TriggerState::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

/// IntervalUnit qualifies repeat intervals of interval-based triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntervalUnit::Millisecond => "MILLISECOND",
            IntervalUnit::Second => "SECOND",
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        };
        write!(f, "{}", s)
    }
}

/// Wall-clock time of day used by daily time window triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(ValidationError::InvalidFieldValue {
                field: "time_of_day".to_string(),
                reason: format!("{:02}:{:02}:{:02} is not a valid time", hour, minute, second),
            });
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn hour_and_minute(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        Self::new(hour, minute, 0)
    }

    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), self.second.into())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// TriggerSchedule is the engine-side schedule description of a trigger.
///
/// `Custom` stands for schedule kinds a backing engine may carry that the
/// control plane has no projection for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSchedule {
    Cron {
        cron_expression: String,
        /// Filled in by the engine when the trigger is stored
        #[serde(default)]
        expression_summary: String,
        #[serde(serialize_with = "serialize_tz", deserialize_with = "deserialize_tz")]
        time_zone: Tz,
    },
    Simple {
        repeat_count: i32,
        repeat_interval_millis: i64,
        #[serde(default)]
        times_triggered: i32,
    },
    DailyTimeInterval {
        /// 1 = Sunday .. 7 = Saturday
        days_of_week: BTreeSet<u8>,
        start_time_of_day: TimeOfDay,
        end_time_of_day: TimeOfDay,
        repeat_count: i32,
        repeat_interval: i32,
        repeat_interval_unit: IntervalUnit,
        #[serde(default)]
        times_triggered: i32,
    },
    CalendarInterval {
        repeat_interval: i32,
        repeat_interval_unit: IntervalUnit,
        #[serde(default)]
        times_triggered: i32,
        #[serde(serialize_with = "serialize_tz", deserialize_with = "deserialize_tz")]
        time_zone: Tz,
    },
    Custom {
        /// Engine-specific kind name; kept apart from the `kind` tag
        #[serde(rename = "custom_kind")]
        kind: String,
    },
}

impl TriggerSchedule {
    pub fn cron(expression: impl Into<String>, time_zone: Tz) -> Self {
        TriggerSchedule::Cron {
            cron_expression: expression.into(),
            expression_summary: String::new(),
            time_zone,
        }
    }

    pub fn simple(repeat_count: i32, repeat_interval_millis: i64) -> Self {
        TriggerSchedule::Simple {
            repeat_count,
            repeat_interval_millis,
            times_triggered: 0,
        }
    }

    pub fn calendar_interval(repeat_interval: i32, unit: IntervalUnit, time_zone: Tz) -> Self {
        TriggerSchedule::CalendarInterval {
            repeat_interval,
            repeat_interval_unit: unit,
            times_triggered: 0,
            time_zone,
        }
    }

    /// Every `repeat_interval` units between `start` and `end` on the given days
    pub fn daily_time_interval(
        days_of_week: impl IntoIterator<Item = u8>,
        start: TimeOfDay,
        end: TimeOfDay,
        repeat_interval: i32,
        unit: IntervalUnit,
    ) -> Self {
        TriggerSchedule::DailyTimeInterval {
            days_of_week: days_of_week.into_iter().collect(),
            start_time_of_day: start,
            end_time_of_day: end,
            repeat_count: REPEAT_INDEFINITELY,
            repeat_interval,
            repeat_interval_unit: unit,
            times_triggered: 0,
        }
    }

    /// Name of the schedule kind, as used in logs
    pub fn kind(&self) -> &str {
        match self {
            TriggerSchedule::Cron { .. } => "cron",
            TriggerSchedule::Simple { .. } => "simple",
            TriggerSchedule::DailyTimeInterval { .. } => "daily_time_interval",
            TriggerSchedule::CalendarInterval { .. } => "calendar_interval",
            TriggerSchedule::Custom { kind } => kind,
        }
    }
}

/// Trigger is a schedule attached to a job, as exchanged with the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub key: TriggerKey,
    /// Set by the engine when the trigger is stored against a job
    pub job_key: Option<JobKey>,
    pub description: Option<String>,
    pub calendar_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub final_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub misfire_instruction: i32,
    pub priority: i32,
    #[serde(default)]
    pub job_data: JobDataMap,
    pub schedule: TriggerSchedule,
}

impl Trigger {
    pub fn may_fire_again(&self) -> bool {
        self.next_fire_time.is_some()
    }
}

/// Fluent builder for triggers
#[derive(Debug, Default)]
pub struct TriggerBuilder {
    key: Option<TriggerKey>,
    job_key: Option<JobKey>,
    description: Option<String>,
    calendar_name: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    misfire_instruction: Option<i32>,
    priority: Option<i32>,
    job_data: JobDataMap,
    schedule: Option<TriggerSchedule>,
}

impl TriggerBuilder {
    pub fn new_trigger() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, group: impl Into<String>, name: impl Into<String>) -> Self {
        self.key = Some(TriggerKey::new(group, name));
        self
    }

    pub fn for_job(mut self, job_key: JobKey) -> Self {
        self.job_key = Some(job_key);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn modified_by_calendar(mut self, calendar_name: impl Into<String>) -> Self {
        self.calendar_name = Some(calendar_name.into());
        self
    }

    pub fn start_now(mut self) -> Self {
        self.start_time = Some(Utc::now());
        self
    }

    pub fn start_at(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn end_at(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_misfire_instruction(mut self, instruction: i32) -> Self {
        self.misfire_instruction = Some(instruction);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn using_job_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.job_data.insert(key.into(), value);
        self
    }

    pub fn with_schedule(mut self, schedule: TriggerSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Build the trigger; unnamed triggers get a generated name in the default group
    pub fn build(self) -> Trigger {
        Trigger {
            key: self
                .key
                .unwrap_or_else(|| TriggerKey::new(DEFAULT_GROUP, Uuid::new_v4().to_string())),
            job_key: self.job_key,
            description: self.description,
            calendar_name: self.calendar_name,
            start_time: self.start_time.unwrap_or_else(Utc::now),
            end_time: self.end_time,
            final_fire_time: None,
            next_fire_time: None,
            previous_fire_time: None,
            misfire_instruction: self
                .misfire_instruction
                .unwrap_or(MISFIRE_INSTRUCTION_SMART_POLICY),
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            job_data: self.job_data,
            schedule: self
                .schedule
                .unwrap_or_else(|| TriggerSchedule::simple(0, 0)),
        }
    }
}

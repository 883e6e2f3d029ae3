// Job control plane
//
// Lifecycle management, trigger control and inventory of the jobs held by a
// backing scheduling engine. All state lives in the engine; `JobMonitors`
// only forwards calls and projects results.

pub mod info;
mod inventory;
mod lifecycle;
mod normalizer;
mod trigger_control;

pub use info::{
    DistributeTaskInfo, InventoryReport, RepairReason, RepairedJob, SkippedTrigger, TriggerDetail,
    TriggerInfo, TriggerReport,
};

use crate::registry::JobClassRegistry;
use crate::schedule::default_timezone;
use crate::scheduler::SchedulerBackend;
use chrono_tz::Tz;
use std::sync::Arc;

/// Control plane over a backing scheduling engine
#[derive(Clone)]
pub struct JobMonitors {
    scheduler: Arc<dyn SchedulerBackend>,
    registry: Arc<JobClassRegistry>,
    time_zone: Tz,
}

impl JobMonitors {
    pub fn new(scheduler: Arc<dyn SchedulerBackend>, registry: Arc<JobClassRegistry>) -> Self {
        Self {
            scheduler,
            registry,
            time_zone: default_timezone(),
        }
    }

    /// Time zone used for cron triggers created by `add_job`
    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }
}

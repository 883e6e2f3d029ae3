// Trigger normalization
//
// Projects engine triggers into `TriggerInfo`: one variant per known schedule
// kind plus the fields every trigger shares.

use super::info::{SkippedTrigger, TriggerDetail, TriggerInfo, TriggerReport};
use super::JobMonitors;
use crate::errors::{SchedulerError, TriggerMappingError};
use crate::models::{JobKey, Trigger, TriggerSchedule};
use crate::telemetry;
use tracing::{debug, instrument, warn};

impl TryFrom<&Trigger> for TriggerDetail {
    type Error = TriggerMappingError;

    fn try_from(trigger: &Trigger) -> Result<Self, Self::Error> {
        match &trigger.schedule {
            TriggerSchedule::Cron {
                cron_expression,
                expression_summary,
                time_zone,
            } => Ok(TriggerDetail::Cron {
                cron_expression: cron_expression.clone(),
                expression_summary: expression_summary.clone(),
                time_zone: *time_zone,
            }),

            TriggerSchedule::Simple {
                repeat_count,
                repeat_interval_millis,
                times_triggered,
            } => Ok(TriggerDetail::SimpleRepeat {
                repeat_count: *repeat_count,
                repeat_interval_millis: *repeat_interval_millis,
                times_triggered: *times_triggered,
            }),

            TriggerSchedule::DailyTimeInterval {
                days_of_week,
                start_time_of_day,
                end_time_of_day,
                repeat_count,
                repeat_interval,
                repeat_interval_unit,
                times_triggered,
            } => Ok(TriggerDetail::DailyTimeWindow {
                days_of_week: days_of_week.clone(),
                start_time_of_day: *start_time_of_day,
                end_time_of_day: *end_time_of_day,
                repeat_count: *repeat_count,
                repeat_interval: *repeat_interval,
                repeat_interval_unit: *repeat_interval_unit,
                times_triggered: *times_triggered,
            }),

            TriggerSchedule::CalendarInterval {
                repeat_interval,
                repeat_interval_unit,
                times_triggered,
                time_zone,
            } => Ok(TriggerDetail::CalendarInterval {
                repeat_interval: *repeat_interval,
                repeat_interval_unit: *repeat_interval_unit,
                times_triggered: *times_triggered,
                time_zone: *time_zone,
            }),

            TriggerSchedule::Custom { kind } => Err(TriggerMappingError::UnsupportedKind {
                key: trigger.key.clone(),
                kind: kind.clone(),
            }),
        }
    }
}

impl JobMonitors {
    /// Normalized triggers of a job, in engine order.
    ///
    /// Triggers that cannot be normalized are dropped; see
    /// [`JobMonitors::job_trigger_report`] to find out which.
    pub async fn job_trigger_info_list(
        &self,
        job_key: &JobKey,
    ) -> Result<Vec<TriggerInfo>, SchedulerError> {
        Ok(self.job_trigger_report(job_key).await?.triggers)
    }

    pub async fn job_trigger_info_list_for(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<TriggerInfo>, SchedulerError> {
        self.job_trigger_info_list(&JobKey::new(group, name)).await
    }

    /// Normalize every trigger of a job, keeping a record of the dropped ones.
    ///
    /// Only a failure to list the triggers or an unavailable engine fails
    /// the whole call.
    #[instrument(skip(self), fields(job_key = %job_key))]
    pub async fn job_trigger_report(&self, job_key: &JobKey) -> Result<TriggerReport, SchedulerError> {
        let triggers = self.scheduler.get_triggers_of_job(job_key).await?;
        let mut report = TriggerReport::default();

        for trigger in &triggers {
            match self.trigger_info(trigger).await {
                Ok(info) => report.triggers.push(info),
                Err(TriggerMappingError::State { source, .. }) if source.is_unavailable() => {
                    return Err(source);
                }
                Err(e) => {
                    warn!(
                        trigger_key = %trigger.key,
                        kind = trigger.schedule.kind(),
                        error = %e,
                        "Dropping trigger that cannot be normalized"
                    );
                    telemetry::record_trigger_mapping_failure(e.reason());
                    report.skipped.push(SkippedTrigger {
                        trigger_key: e.trigger_key().clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            normalized = report.triggers.len(),
            skipped = report.skipped.len(),
            "Triggers normalized"
        );
        Ok(report)
    }

    async fn trigger_info(&self, trigger: &Trigger) -> Result<TriggerInfo, TriggerMappingError> {
        let detail = TriggerDetail::try_from(trigger)?;
        let state = self
            .scheduler
            .get_trigger_state(&trigger.key)
            .await
            .map_err(|source| TriggerMappingError::State {
                key: trigger.key.clone(),
                source,
            })?;

        Ok(TriggerInfo {
            trigger_key: trigger.key.clone(),
            description: trigger.description.clone(),
            calendar_name: trigger.calendar_name.clone(),
            start_time: trigger.start_time,
            end_time: trigger.end_time,
            final_fire_time: trigger.final_fire_time,
            next_fire_time: trigger.next_fire_time,
            previous_fire_time: trigger.previous_fire_time,
            misfire_instruction: trigger.misfire_instruction,
            priority: trigger.priority,
            job_data: trigger.job_data.clone(),
            may_fire_again: trigger.may_fire_again(),
            state,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntervalUnit, TimeOfDay, TriggerBuilder, TriggerKey, TriggerState};
    use crate::registry::JobClassRegistry;
    use crate::scheduler::MockSchedulerBackend;
    use chrono_tz::Tz;
    use std::sync::Arc;

    fn trigger(name: &str, schedule: TriggerSchedule) -> Trigger {
        TriggerBuilder::new_trigger()
            .with_identity("G1", name)
            .for_job(JobKey::new("G1", "J1"))
            .with_description(format!("{} description", name))
            .with_schedule(schedule)
            .build()
    }

    fn monitors(mock: MockSchedulerBackend) -> JobMonitors {
        JobMonitors::new(Arc::new(mock), Arc::new(JobClassRegistry::new()))
    }

    #[test]
    fn test_cron_trigger_maps_to_cron_variant() {
        let t = trigger("T1", TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC));
        match TriggerDetail::try_from(&t).unwrap() {
            TriggerDetail::Cron {
                cron_expression,
                time_zone,
                ..
            } => {
                assert_eq!(cron_expression, "0 0 12 * * ?");
                assert_eq!(time_zone, Tz::UTC);
            }
            other => panic!("expected cron variant, got {:?}", other),
        }
    }

    #[test]
    fn test_each_known_kind_maps_to_its_variant() {
        let simple = trigger("S", TriggerSchedule::simple(10, 5_000));
        assert!(matches!(
            TriggerDetail::try_from(&simple).unwrap(),
            TriggerDetail::SimpleRepeat {
                repeat_count: 10,
                repeat_interval_millis: 5_000,
                ..
            }
        ));

        let daily = trigger(
            "D",
            TriggerSchedule::daily_time_interval(
                [2, 3, 4, 5, 6],
                TimeOfDay::hour_and_minute(8, 0).unwrap(),
                TimeOfDay::hour_and_minute(18, 0).unwrap(),
                30,
                IntervalUnit::Minute,
            ),
        );
        match TriggerDetail::try_from(&daily).unwrap() {
            TriggerDetail::DailyTimeWindow {
                days_of_week,
                repeat_interval_unit,
                ..
            } => {
                assert_eq!(days_of_week.len(), 5);
                assert_eq!(repeat_interval_unit, IntervalUnit::Minute);
            }
            other => panic!("expected daily variant, got {:?}", other),
        }

        let calendar = trigger(
            "C",
            TriggerSchedule::calendar_interval(1, IntervalUnit::Month, chrono_tz::Europe::Paris),
        );
        assert!(matches!(
            TriggerDetail::try_from(&calendar).unwrap(),
            TriggerDetail::CalendarInterval {
                repeat_interval: 1,
                repeat_interval_unit: IntervalUnit::Month,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_kind_is_unsupported() {
        let t = trigger(
            "X",
            TriggerSchedule::Custom {
                kind: "nth_included_day".to_string(),
            },
        );
        let err = TriggerDetail::try_from(&t).unwrap_err();
        assert!(matches!(err, TriggerMappingError::UnsupportedKind { .. }));
        assert!(err.to_string().contains("nth_included_day"));
    }

    #[tokio::test]
    async fn test_report_populates_common_fields_and_state() {
        let mut mock = MockSchedulerBackend::new();
        mock.expect_get_triggers_of_job().returning(|_| {
            Ok(vec![trigger(
                "T1",
                TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC),
            )])
        });
        mock.expect_get_trigger_state()
            .returning(|_| Ok(TriggerState::Blocked));

        let infos = monitors(mock)
            .job_trigger_info_list_for("G1", "J1")
            .await
            .unwrap();

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].trigger_key, TriggerKey::new("G1", "T1"));
        assert_eq!(infos[0].description.as_deref(), Some("T1 description"));
        assert_eq!(infos[0].state, TriggerState::Blocked);
        assert!(!infos[0].may_fire_again);
    }

    #[tokio::test]
    async fn test_unsupported_trigger_is_skipped_and_order_kept() {
        let mut mock = MockSchedulerBackend::new();
        mock.expect_get_triggers_of_job().returning(|_| {
            Ok(vec![
                trigger("A", TriggerSchedule::simple(0, 0)),
                trigger(
                    "B",
                    TriggerSchedule::Custom {
                        kind: "lunar".to_string(),
                    },
                ),
                trigger("C", TriggerSchedule::cron("0 0 * * * ?", Tz::UTC)),
            ])
        });
        mock.expect_get_trigger_state()
            .returning(|_| Ok(TriggerState::Normal));

        let report = monitors(mock)
            .job_trigger_report(&JobKey::new("G1", "J1"))
            .await
            .unwrap();

        let names: Vec<&str> = report
            .triggers
            .iter()
            .map(|info| info.trigger_key.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].trigger_key, TriggerKey::new("G1", "B"));
    }

    #[tokio::test]
    async fn test_state_failure_drops_only_that_trigger() {
        let mut mock = MockSchedulerBackend::new();
        mock.expect_get_triggers_of_job().returning(|_| {
            Ok(vec![
                trigger("A", TriggerSchedule::simple(0, 0)),
                trigger("B", TriggerSchedule::simple(0, 0)),
            ])
        });
        mock.expect_get_trigger_state().returning(|key| {
            if key.name == "A" {
                Err(SchedulerError::Persistence("state row missing".to_string()))
            } else {
                Ok(TriggerState::Paused)
            }
        });

        let report = monitors(mock)
            .job_trigger_report(&JobKey::new("G1", "J1"))
            .await
            .unwrap();
        assert_eq!(report.triggers.len(), 1);
        assert_eq!(report.triggers[0].state, TriggerState::Paused);
        assert_eq!(report.skipped[0].trigger_key, TriggerKey::new("G1", "A"));
    }

    #[tokio::test]
    async fn test_unavailable_engine_propagates() {
        let mut mock = MockSchedulerBackend::new();
        mock.expect_get_triggers_of_job()
            .returning(|_| Ok(vec![trigger("A", TriggerSchedule::simple(0, 0))]));
        mock.expect_get_trigger_state()
            .returning(|_| Err(SchedulerError::Unavailable("connection reset".to_string())));

        let err = monitors(mock)
            .job_trigger_info_list(&JobKey::new("G1", "J1"))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}

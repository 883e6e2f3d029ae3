// Schedule validation and first fire time calculation
//
// Used by backing engines when triggers are stored. The control plane never
// calls into this module: it only passes trigger descriptions through.

use crate::errors::ScheduleError;
use crate::models::{IntervalUnit, TimeOfDay, Trigger, TriggerSchedule, REPEAT_INDEFINITELY};
use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::collections::BTreeSet;
use std::str::FromStr;

const CRON_FIELD_NAMES: [&str; 7] = [
    "seconds",
    "minutes",
    "hours",
    "daysOfMonth",
    "months",
    "daysOfWeek",
    "years",
];

/// Parse and validate a cron expression with second precision.
///
/// `?` ("no specific value") is accepted in any field and read as `*`.
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    let normalized = expression
        .split_whitespace()
        .map(|field| if field == "?" { "*" } else { field })
        .collect::<Vec<_>>()
        .join(" ");

    CronSchedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Field-by-field summary of a cron expression, one `name: value` per line
pub fn expression_summary(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    CRON_FIELD_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}: {}\n", name, fields.get(i).copied().unwrap_or("*")))
        .collect()
}

pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

pub fn default_timezone() -> Tz {
    chrono_tz::UTC
}

/// First time the trigger fires at or after its start time.
///
/// `Ok(None)` means the trigger will never fire (for example its end time
/// lies before the first candidate).
pub fn first_fire_time(trigger: &Trigger) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let first = match &trigger.schedule {
        TriggerSchedule::Cron {
            cron_expression,
            time_zone,
            ..
        } => {
            let schedule = parse_cron_expression(cron_expression)?;
            // `after` is exclusive; step back so a fire time equal to the start counts
            let reference = trigger
                .start_time
                .checked_sub_signed(Duration::seconds(1))
                .ok_or_else(|| out_of_range(trigger.start_time))?
                .with_timezone(time_zone);
            schedule
                .after(&reference)
                .next()
                .map(|next| next.with_timezone(&Utc))
        }

        TriggerSchedule::Simple {
            repeat_count,
            repeat_interval_millis,
            ..
        } => {
            if *repeat_count < REPEAT_INDEFINITELY {
                return Err(ScheduleError::InvalidConfiguration(format!(
                    "Repeat count cannot be {}",
                    repeat_count
                )));
            }
            if *repeat_count != 0 && *repeat_interval_millis < 1 {
                return Err(ScheduleError::InvalidConfiguration(
                    "Repeat interval must be at least 1ms for repeating triggers".to_string(),
                ));
            }
            Some(trigger.start_time)
        }

        TriggerSchedule::CalendarInterval {
            repeat_interval,
            repeat_interval_unit,
            ..
        } => {
            if *repeat_interval < 1 {
                return Err(ScheduleError::InvalidConfiguration(
                    "Repeat interval must be >= 1".to_string(),
                ));
            }
            if *repeat_interval_unit == IntervalUnit::Millisecond {
                return Err(ScheduleError::InvalidConfiguration(
                    "Calendar interval triggers cannot repeat in milliseconds".to_string(),
                ));
            }
            Some(trigger.start_time)
        }

        TriggerSchedule::DailyTimeInterval {
            days_of_week,
            start_time_of_day,
            end_time_of_day,
            repeat_interval,
            repeat_interval_unit,
            ..
        } => daily_first_fire_time(
            trigger.start_time,
            days_of_week,
            start_time_of_day,
            end_time_of_day,
            *repeat_interval,
            *repeat_interval_unit,
        )?,

        // Engines that accept custom kinds fire them from their start time
        TriggerSchedule::Custom { .. } => Some(trigger.start_time),
    };

    Ok(first.filter(|fire_time| trigger.end_time.map_or(true, |end| *fire_time <= end)))
}

fn out_of_range(start_time: DateTime<Utc>) -> ScheduleError {
    ScheduleError::InvalidConfiguration(format!(
        "Start time {} is outside the schedulable range",
        start_time
    ))
}

/// First slot of a daily window on an allowed weekday at or after `start_time`
fn daily_first_fire_time(
    start_time: DateTime<Utc>,
    days_of_week: &BTreeSet<u8>,
    start_time_of_day: &TimeOfDay,
    end_time_of_day: &TimeOfDay,
    repeat_interval: i32,
    unit: IntervalUnit,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    if repeat_interval < 1 {
        return Err(ScheduleError::InvalidConfiguration(
            "Repeat interval must be >= 1".to_string(),
        ));
    }
    let interval = i64::from(repeat_interval);
    let step = match unit {
        IntervalUnit::Second => Duration::seconds(interval),
        IntervalUnit::Minute => Duration::minutes(interval),
        IntervalUnit::Hour => Duration::hours(interval),
        other => {
            return Err(ScheduleError::InvalidConfiguration(format!(
                "Daily time interval triggers cannot repeat every {}",
                other
            )))
        }
    };
    if days_of_week.is_empty() || days_of_week.iter().any(|day| !(1..=7).contains(day)) {
        return Err(ScheduleError::InvalidConfiguration(
            "Days of week must be a non-empty subset of 1..=7".to_string(),
        ));
    }
    if end_time_of_day < start_time_of_day {
        return Err(ScheduleError::InvalidConfiguration(format!(
            "End time of day {} is before start time of day {}",
            end_time_of_day, start_time_of_day
        )));
    }
    let (Some(window_open), Some(window_close)) = (
        start_time_of_day.to_naive_time(),
        end_time_of_day.to_naive_time(),
    ) else {
        return Err(ScheduleError::InvalidConfiguration(
            "Invalid time of day".to_string(),
        ));
    };

    let step_millis = step.num_milliseconds();
    for offset in 0..=7 {
        let date = start_time
            .date_naive()
            .checked_add_signed(Duration::days(offset))
            .ok_or_else(|| out_of_range(start_time))?;
        let day = date.weekday().number_from_sunday() as u8;
        if !days_of_week.contains(&day) {
            continue;
        }

        let open = date.and_time(window_open).and_utc();
        let close = date.and_time(window_close).and_utc();
        let mut candidate = open;
        if candidate < start_time {
            let behind = (start_time - open).num_milliseconds();
            let steps = (behind + step_millis - 1) / step_millis;
            candidate = open
                .checked_add_signed(Duration::milliseconds(steps * step_millis))
                .ok_or_else(|| out_of_range(start_time))?;
        }
        if candidate <= close {
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerBuilder;
    use chrono::TimeZone;

    fn trigger_starting(start: DateTime<Utc>, schedule: TriggerSchedule) -> Trigger {
        TriggerBuilder::new_trigger()
            .with_identity("G1", "T1")
            .start_at(start)
            .with_schedule(schedule)
            .build()
    }

    #[test]
    fn test_parse_valid_cron_expression() {
        assert!(parse_cron_expression("0 0 12 * * *").is_ok());
    }

    #[test]
    fn test_parse_accepts_question_mark() {
        assert!(parse_cron_expression("0 0 12 * * ?").is_ok());
        assert!(parse_cron_expression("0 0 * * * ?").is_ok());
    }

    #[test]
    fn test_parse_invalid_cron_expression() {
        let err = parse_cron_expression("invalid").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidCronExpression { .. }));
    }

    #[test]
    fn test_expression_summary_lists_fields() {
        let summary = expression_summary("0 0 12 * * ?");
        assert!(summary.starts_with("seconds: 0\n"));
        assert!(summary.contains("hours: 12\n"));
        assert!(summary.contains("daysOfWeek: ?\n"));
        assert!(summary.ends_with("years: *\n"));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Asia/Ho_Chi_Minh").unwrap().name(), "Asia/Ho_Chi_Minh");
        assert!(parse_timezone("Nowhere/Special").is_err());
        assert_eq!(default_timezone().name(), "UTC");
    }

    #[test]
    fn test_cron_first_fire_time_at_noon() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let trigger = trigger_starting(start, TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC));
        let first = first_fire_time(&trigger).unwrap();
        assert_eq!(first, Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_cron_first_fire_time_includes_start() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let trigger = trigger_starting(start, TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC));
        assert_eq!(first_fire_time(&trigger).unwrap(), Some(start));
    }

    #[test]
    fn test_cron_respects_time_zone() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let trigger = trigger_starting(
            start,
            TriggerSchedule::cron("0 0 12 * * ?", chrono_tz::Asia::Ho_Chi_Minh),
        );
        // Noon in UTC+7
        assert_eq!(
            first_fire_time(&trigger).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_end_time_before_first_fire_means_never() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        let mut trigger = trigger_starting(start, TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC));
        trigger.end_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap());
        assert_eq!(first_fire_time(&trigger).unwrap(), None);
    }

    #[test]
    fn test_cron_at_earliest_instant_is_an_error() {
        let trigger = trigger_starting(
            DateTime::<Utc>::MIN_UTC,
            TriggerSchedule::cron("0 0 12 * * ?", Tz::UTC),
        );
        assert!(matches!(
            first_fire_time(&trigger),
            Err(ScheduleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_daily_window_at_latest_instant_is_an_error() {
        let trigger = trigger_starting(
            DateTime::<Utc>::MAX_UTC,
            TriggerSchedule::daily_time_interval(
                1..=7,
                TimeOfDay::hour_and_minute(8, 0).unwrap(),
                TimeOfDay::hour_and_minute(17, 0).unwrap(),
                30,
                IntervalUnit::Minute,
            ),
        );
        assert!(matches!(
            first_fire_time(&trigger),
            Err(ScheduleError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_simple_fires_at_start() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let trigger = trigger_starting(start, TriggerSchedule::simple(3, 60_000));
        assert_eq!(first_fire_time(&trigger).unwrap(), Some(start));
    }

    #[test]
    fn test_simple_rejects_zero_interval_when_repeating() {
        let trigger = trigger_starting(Utc::now(), TriggerSchedule::simple(REPEAT_INDEFINITELY, 0));
        assert!(first_fire_time(&trigger).is_err());
    }

    #[test]
    fn test_calendar_interval_rejects_zero_interval() {
        let trigger = trigger_starting(
            Utc::now(),
            TriggerSchedule::calendar_interval(0, IntervalUnit::Day, Tz::UTC),
        );
        assert!(first_fire_time(&trigger).is_err());
    }

    #[test]
    fn test_daily_window_aligns_to_interval() {
        // 2024-03-01 is a Friday (6)
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 7, 0).unwrap();
        let schedule = TriggerSchedule::daily_time_interval(
            [6],
            TimeOfDay::hour_and_minute(9, 0).unwrap(),
            TimeOfDay::hour_and_minute(17, 0).unwrap(),
            15,
            IntervalUnit::Minute,
        );
        let trigger = trigger_starting(start, schedule);
        assert_eq!(
            first_fire_time(&trigger).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_daily_window_skips_to_next_allowed_day() {
        // Friday evening, window closed; next allowed day is Monday (2)
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let schedule = TriggerSchedule::daily_time_interval(
            [2, 6],
            TimeOfDay::hour_and_minute(9, 0).unwrap(),
            TimeOfDay::hour_and_minute(17, 0).unwrap(),
            1,
            IntervalUnit::Hour,
        );
        let trigger = trigger_starting(start, schedule);
        assert_eq!(
            first_fire_time(&trigger).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_daily_window_rejects_day_units() {
        let schedule = TriggerSchedule::daily_time_interval(
            [1],
            TimeOfDay::hour_and_minute(9, 0).unwrap(),
            TimeOfDay::hour_and_minute(17, 0).unwrap(),
            1,
            IntervalUnit::Day,
        );
        let trigger = trigger_starting(Utc::now(), schedule);
        assert!(first_fire_time(&trigger).is_err());
    }
}

//! Weekly completion statistics, grouped by scheduled weekday.

use crate::models::Todo;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStat {
    pub name: &'static str,
    pub scheduled: u32,
    pub completed: u32,
    pub on_time: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductiveDay {
    pub day: u8,
    pub name: &'static str,
    pub scheduled: u32,
    pub completed: u32,
    pub on_time: u32,
    /// Rounded percentage.
    pub completion_rate: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub day_stats: BTreeMap<u8, DayStat>,
    pub total_scheduled: u32,
    pub total_completed: u32,
    pub completed_on_time: u32,
    /// Rounded percentages; 0 when the denominator is 0.
    pub completion_rate: u32,
    pub on_time_rate: u32,
    pub most_productive_day: Option<ProductiveDay>,
    pub least_productive_day: Option<ProductiveDay>,
}

fn percent(num: u32, den: u32) -> u32 {
    if den == 0 {
        0
    } else {
        (num as f64 / den as f64 * 100.0).round() as u32
    }
}

/// Aggregate a user's full todo list. Tasks without a scheduled weekday are
/// ignored; a completed task counts as on-time when its completion instant
/// falls on the scheduled weekday (UTC).
pub fn weekly_summary(todos: &[Todo]) -> WeeklySummary {
    let mut day_stats: BTreeMap<u8, DayStat> = (0u8..7)
        .map(|d| {
            (
                d,
                DayStat {
                    name: DAY_NAMES[d as usize],
                    scheduled: 0,
                    completed: 0,
                    on_time: 0,
                },
            )
        })
        .collect();

    let mut total_scheduled = 0;
    let mut total_completed = 0;
    let mut completed_on_time = 0;

    for todo in todos {
        let Some(day) = todo.scheduled_day.filter(|d| *d < 7) else {
            continue;
        };
        let stat = day_stats.get_mut(&day).unwrap();
        stat.scheduled += 1;
        total_scheduled += 1;

        if todo.completed {
            stat.completed += 1;
            total_completed += 1;

            if let Some(done) = todo.completed_date {
                if done.weekday().num_days_from_sunday() as u8 == day {
                    stat.on_time += 1;
                    completed_on_time += 1;
                }
            }
        }
    }

    let mut most: Option<ProductiveDay> = None;
    let mut least: Option<ProductiveDay> = None;
    for (day, stat) in &day_stats {
        if stat.scheduled == 0 {
            continue;
        }
        let entry = ProductiveDay {
            day: *day,
            name: stat.name,
            scheduled: stat.scheduled,
            completed: stat.completed,
            on_time: stat.on_time,
            completion_rate: percent(stat.completed, stat.scheduled),
        };
        // Ties keep the earliest day of the week.
        if most.as_ref().map_or(true, |m| entry.completion_rate > m.completion_rate) {
            most = Some(entry.clone());
        }
        if least.as_ref().map_or(true, |l| entry.completion_rate < l.completion_rate) {
            least = Some(entry);
        }
    }

    WeeklySummary {
        completion_rate: percent(total_completed, total_scheduled),
        on_time_rate: percent(completed_on_time, total_completed),
        day_stats,
        total_scheduled,
        total_completed,
        completed_on_time,
        most_productive_day: most,
        least_productive_day: least,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn todo(day: Option<u8>, completed: bool, completed_date: Option<chrono::DateTime<Utc>>) -> Todo {
        Todo {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            text: "t".into(),
            completed,
            scheduled_day: day,
            start_time: None,
            target_datetime: None,
            completed_date,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn counts_per_day_and_rates() {
        // 2024-06-03 is a Monday (day 1)
        let monday = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        let todos = vec![
            todo(Some(1), true, Some(monday)),
            todo(Some(1), false, None),
        ];

        let s = weekly_summary(&todos);
        let mon = &s.day_stats[&1];
        assert_eq!((mon.scheduled, mon.completed, mon.on_time), (2, 1, 1));
        assert_eq!(s.total_scheduled, 2);
        assert_eq!(s.total_completed, 1);
        assert_eq!(s.completed_on_time, 1);
        assert_eq!(s.completion_rate, 50);
        assert_eq!(s.on_time_rate, 100);
    }

    #[test]
    fn off_day_completion_is_not_on_time() {
        // Completed on a Tuesday, scheduled for Monday
        let tuesday = Utc.with_ymd_and_hms(2024, 6, 4, 9, 0, 0).unwrap();
        let s = weekly_summary(&[todo(Some(1), true, Some(tuesday))]);
        assert_eq!(s.day_stats[&1].on_time, 0);
        assert_eq!(s.completion_rate, 100);
        assert_eq!(s.on_time_rate, 0);
    }

    #[test]
    fn unscheduled_tasks_are_ignored() {
        let s = weekly_summary(&[todo(None, true, None), todo(Some(9), false, None)]);
        assert_eq!(s.total_scheduled, 0);
        assert_eq!(s.completion_rate, 0);
        assert!(s.most_productive_day.is_none());
        assert!(s.least_productive_day.is_none());
    }

    #[test]
    fn most_and_least_productive_days() {
        let monday = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let todos = vec![
            todo(Some(1), true, Some(monday)), // Monday: 1/1
            todo(Some(3), true, None),         // Wednesday: 1/2
            todo(Some(3), false, None),
            todo(Some(5), false, None),        // Friday: 0/1
        ];

        let s = weekly_summary(&todos);
        assert_eq!(s.most_productive_day.as_ref().unwrap().day, 1);
        assert_eq!(s.most_productive_day.as_ref().unwrap().completion_rate, 100);
        assert_eq!(s.least_productive_day.as_ref().unwrap().day, 5);
        assert_eq!(s.least_productive_day.as_ref().unwrap().completion_rate, 0);
    }

    #[test]
    fn single_day_is_both_most_and_least() {
        let s = weekly_summary(&[todo(Some(2), false, None)]);
        assert_eq!(s.most_productive_day.as_ref().unwrap().day, 2);
        assert_eq!(s.least_productive_day.as_ref().unwrap().day, 2);
    }
}

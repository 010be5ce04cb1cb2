//! Local reminder scheduling — the device-side mirror of the scanner.
//!
//! Where the scanner polls absolute due instants, this side derives the
//! next occurrence of each task's weekly (weekday, "HH:MM") slot and arms
//! one one-shot timer per task. Everything is recomputed from scratch on
//! every resync: cancel first, then schedule, so a task edit, completion,
//! or deletion simply falls out of the next pass.

use crate::due::LOOKAHEAD_MINUTES;
use crate::models::Todo;
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Parse a "HH:MM" clock string.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Next occurrence of `weekday` (0 = Sunday) at `at`, on or after `now`.
///
/// The candidate lands on the next calendar hit of the weekday; if its
/// reminder instant (due − 10 min) is not strictly in the future, the task
/// recurs weekly, so the candidate rolls 7 days forward.
pub fn next_occurrence(now: NaiveDateTime, weekday: u8, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().weekday().num_days_from_sunday() as i64;
    let days_ahead = (weekday as i64 - today).rem_euclid(7);

    let mut candidate = (now.date() + Duration::days(days_ahead)).and_time(at);
    if candidate - Duration::minutes(LOOKAHEAD_MINUTES) <= now {
        candidate += Duration::days(7);
    }
    candidate
}

/// A fired local reminder, handed to whatever displays it.
#[derive(Debug, Clone)]
pub struct LocalAlert {
    pub todo_id: Uuid,
    pub text: String,
    pub due: NaiveDateTime,
}

/// Per-task one-shot timers. At most one live timer per task id; the map is
/// shared with the firing tasks so a fired timer removes its own handle.
pub struct LocalScheduler {
    timers: Arc<Mutex<HashMap<Uuid, tokio::task::JoinHandle<()>>>>,
    alert_tx: mpsc::UnboundedSender<LocalAlert>,
}

impl LocalScheduler {
    pub fn new(alert_tx: mpsc::UnboundedSender<LocalAlert>) -> Self {
        LocalScheduler {
            timers: Arc::new(Mutex::new(HashMap::new())),
            alert_tx,
        }
    }

    /// Rebuild every timer from the given task list. Existing timers are
    /// cancelled wholesale first — tasks that were completed, deleted, or
    /// lost their start time end up with no timer, and nothing is ever
    /// scheduled twice.
    pub fn resync(&self, todos: &[Todo], now: NaiveDateTime) {
        let mut timers = self.timers.lock().unwrap();
        for (_, handle) in timers.drain() {
            handle.abort();
        }

        for todo in todos {
            if todo.completed {
                continue;
            }
            let Some(day) = todo.scheduled_day.filter(|d| *d < 7) else {
                continue;
            };
            let Some(at) = todo.start_time.as_deref().and_then(parse_clock) else {
                continue;
            };

            let due = next_occurrence(now, day, at);
            let reminder = due - Duration::minutes(LOOKAHEAD_MINUTES);
            // next_occurrence guarantees a strictly-future reminder
            let delay = (reminder - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            let handle = self.arm(todo.id, todo.text.clone(), delay, due);
            timers.insert(todo.id, handle);
        }
    }

    /// Arm one one-shot timer. On firing it emits the alert and drops its
    /// own handle from the map.
    fn arm(
        &self,
        todo_id: Uuid,
        text: String,
        delay: std::time::Duration,
        due: NaiveDateTime,
    ) -> tokio::task::JoinHandle<()> {
        let timers = Arc::clone(&self.timers);
        let alert_tx = self.alert_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = alert_tx.send(LocalAlert {
                todo_id,
                text,
                due,
            });
            timers.lock().unwrap().remove(&todo_id);
        })
    }

    pub fn timer_count(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    #[cfg(test)]
    fn has_timer(&self, todo_id: Uuid) -> bool {
        self.timers.lock().unwrap().contains_key(&todo_id)
    }
}

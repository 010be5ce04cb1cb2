//! Due-soon evaluation.
//!
//! A reminder fires 10 minutes ahead of a task's due instant. The scanner
//! polls once a minute, so an occurrence is "due soon" exactly when its
//! reminder instant falls inside the half-open window
//! [now, now + scan interval) — inclusive below, exclusive above, so
//! adjacent scan cycles never double-count a boundary instant.

use chrono::{DateTime, Duration, Utc};

/// Minutes ahead of the due instant at which the reminder fires.
pub const LOOKAHEAD_MINUTES: i64 = 10;

/// Scanner polling period.
pub const SCAN_INTERVAL_SECS: u64 = 60;

/// The instant a reminder for `due` should fire.
pub fn reminder_instant(due: DateTime<Utc>) -> DateTime<Utc> {
    due - Duration::minutes(LOOKAHEAD_MINUTES)
}

/// True iff the reminder for `due` falls inside the scan window starting at
/// `now`. A reminder instant already in the past never fires retroactively.
pub fn due_soon(now: DateTime<Utc>, due: Option<DateTime<Utc>>) -> bool {
    let Some(due) = due else {
        return false;
    };
    let reminder = reminder_instant(due);
    reminder >= now && reminder < now + Duration::seconds(SCAN_INTERVAL_SECS as i64)
}

/// Whole minutes (rounded) from `now` until the reminder for `due`.
/// Negative once the reminder instant has passed.
pub fn minutes_until_reminder(now: DateTime<Utc>, due: DateTime<Utc>) -> i64 {
    let secs = (reminder_instant(due) - now).num_seconds();
    (secs as f64 / 60.0).round() as i64
}

use crate::due;
use crate::models::{CreateTodoRequest, Todo, UpdateTodoRequest, User};
use crate::schedule;
use crate::summary::{self, WeeklySummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::SharedState;

fn bad_request(msg: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

fn check_day(day: u8) -> Result<(), (StatusCode, String)> {
    if day > 6 {
        return Err(bad_request("scheduled_day must be 0-6 (Sunday = 0)"));
    }
    Ok(())
}

fn check_clock(time: &str) -> Result<(), (StatusCode, String)> {
    if schedule::parse_clock(time).is_none() {
        return Err(bad_request("start_time must be \"HH:MM\""));
    }
    Ok(())
}

// GET /api/todos
pub async fn list_todos(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Todo>>, (StatusCode, String)> {
    let todos = state
        .store
        .list_todos_for_user(user.id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(todos))
}

// POST /api/todos
pub async fn create_todo(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), (StatusCode, String)> {
    if payload.text.trim().is_empty() {
        return Err(bad_request("Text is required"));
    }
    if let Some(day) = payload.scheduled_day {
        check_day(day)?;
    }
    if let Some(time) = &payload.start_time {
        check_clock(time)?;
    }

    let todo = Todo {
        id: Uuid::new_v4(),
        user_id: user.id,
        text: payload.text,
        completed: false,
        scheduled_day: payload.scheduled_day,
        start_time: payload.start_time,
        target_datetime: payload.target_datetime,
        completed_date: None,
        created_at: Utc::now(),
    };

    state
        .store
        .create_todo(&todo)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((StatusCode::CREATED, Json(todo)))
}

/// Fold a partial update into a todo. The completion flag goes through
/// `set_completed` so the completed_date invariant holds; an explicit
/// completed_date override only sticks while the todo ends up completed.
fn apply_update(todo: &mut Todo, payload: UpdateTodoRequest, now: DateTime<Utc>) {
    if let Some(text) = payload.text {
        todo.text = text;
    }
    if let Some(day) = payload.scheduled_day {
        todo.scheduled_day = day;
    }
    if let Some(time) = payload.start_time {
        todo.start_time = time;
    }
    if let Some(target) = payload.target_datetime {
        todo.target_datetime = target;
    }
    if let Some(completed) = payload.completed {
        todo.set_completed(completed, now);
    }
    if let Some(stamp) = payload.completed_date {
        if todo.completed {
            todo.completed_date = Some(stamp);
        }
    }
}

// PUT /api/todos/:id
pub async fn update_todo(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<Todo>, (StatusCode, String)> {
    if let Some(Some(day)) = payload.scheduled_day {
        check_day(day)?;
    }
    if let Some(Some(time)) = &payload.start_time {
        check_clock(time)?;
    }

    let mut todo = state
        .store
        .get_todo(id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .filter(|t| t.user_id == user.id)
        .ok_or((StatusCode::NOT_FOUND, "Todo not found".to_string()))?;

    apply_update(&mut todo, payload, Utc::now());

    state
        .store
        .update_todo(&todo)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(todo))
}

// DELETE /api/todos/:id
pub async fn delete_todo(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let exists = state
        .store
        .get_todo(id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .is_some_and(|t| t.user_id == user.id);
    if !exists {
        return Err((StatusCode::NOT_FOUND, "Todo not found".to_string()));
    }

    state
        .store
        .delete_todo(id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/todos/summary/weekly
pub async fn weekly_summary(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
) -> Result<Json<WeeklySummary>, (StatusCode, String)> {
    let todos = state
        .store
        .list_todos_for_user(user.id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(summary::weekly_summary(&todos)))
}

// ── Pending notifications ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PendingNotification {
    pub todo_id: Uuid,
    pub text: String,
    pub reminder_time: DateTime<Utc>,
    pub minutes_until: i64,
}

/// Tasks whose reminder fires within the current minute. Mirrors what the
/// scanner would dispatch this cycle, shaped for a polling client.
pub fn pending_notifications(todos: &[Todo], now: DateTime<Utc>) -> Vec<PendingNotification> {
    todos
        .iter()
        .filter(|t| !t.completed)
        .filter_map(|t| {
            let due = t.target_datetime?;
            let minutes_until = due::minutes_until_reminder(now, due);
            if (0..=1).contains(&minutes_until) {
                Some(PendingNotification {
                    todo_id: t.id,
                    text: t.text.clone(),
                    reminder_time: due::reminder_instant(due),
                    minutes_until,
                })
            } else {
                None
            }
        })
        .collect()
}

// GET /api/notifications
pub async fn list_notifications(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<PendingNotification>>, (StatusCode, String)> {
    let todos = state
        .store
        .list_todos_for_user(user.id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(pending_notifications(&todos, Utc::now())))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn todo() -> Todo {
        Todo {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            text: "Take out bins".into(),
            completed: false,
            scheduled_day: Some(4),
            start_time: Some("19:00".into()),
            target_datetime: None,
            completed_date: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn update_merges_only_present_fields() {
        let mut t = todo();
        let now = Utc::now();
        apply_update(
            &mut t,
            UpdateTodoRequest {
                text: Some("Take out recycling".into()),
                ..Default::default()
            },
            now,
        );
        assert_eq!(t.text, "Take out recycling");
        assert_eq!(t.scheduled_day, Some(4));
        assert_eq!(t.start_time.as_deref(), Some("19:00"));
    }

    #[test]
    fn update_can_clear_reminder_fields() {
        let mut t = todo();
        apply_update(
            &mut t,
            UpdateTodoRequest {
                scheduled_day: Some(None),
                start_time: Some(None),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(t.scheduled_day, None);
        assert_eq!(t.start_time, None);
    }

    #[test]
    fn completing_through_update_stamps_and_clears() {
        let mut t = todo();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 20, 0, 0).unwrap();

        apply_update(
            &mut t,
            UpdateTodoRequest {
                completed: Some(true),
                ..Default::default()
            },
            now,
        );
        assert_eq!(t.completed_date, Some(now));

        apply_update(
            &mut t,
            UpdateTodoRequest {
                completed: Some(false),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(!t.completed);
        assert_eq!(t.completed_date, None);
    }

    #[test]
    fn completed_date_override_requires_completed() {
        let stamp = Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap();

        // Override together with completion: the override wins
        let mut t = todo();
        apply_update(
            &mut t,
            UpdateTodoRequest {
                completed: Some(true),
                completed_date: Some(stamp),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(t.completed_date, Some(stamp));

        // Override on a pending todo is ignored
        let mut t = todo();
        apply_update(
            &mut t,
            UpdateTodoRequest {
                completed_date: Some(stamp),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(t.completed_date, None);
    }

    #[test]
    fn update_request_distinguishes_absent_from_null() {
        let absent: UpdateTodoRequest = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert!(absent.scheduled_day.is_none());

        let null: UpdateTodoRequest =
            serde_json::from_str(r#"{"scheduled_day":null,"start_time":null}"#).unwrap();
        assert_eq!(null.scheduled_day, Some(None));
        assert_eq!(null.start_time, Some(None));

        let set: UpdateTodoRequest = serde_json::from_str(r#"{"scheduled_day":5}"#).unwrap();
        assert_eq!(set.scheduled_day, Some(Some(5)));
    }

    #[test]
    fn pending_notifications_fire_within_the_current_minute() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();

        let mut soon = todo();
        soon.target_datetime = Some(Utc.with_ymd_and_hms(2024, 6, 3, 10, 10, 30).unwrap());
        let mut later = todo();
        later.target_datetime = Some(Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap());
        let mut past = todo();
        past.target_datetime = Some(Utc.with_ymd_and_hms(2024, 6, 3, 10, 5, 0).unwrap());
        let mut done = todo();
        done.target_datetime = soon.target_datetime;
        done.completed = true;
        let dateless = todo();

        let pending = pending_notifications(&[soon.clone(), later, past, done, dateless], now);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].todo_id, soon.id);
        assert_eq!(pending[0].minutes_until, 1);
        assert_eq!(
            pending[0].reminder_time,
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 30).unwrap()
        );
    }
}

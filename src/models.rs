use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A todo — one day-scheduled task belonging to one user.
///
/// Two reminder paths read different fields: the server scanner goes by
/// `target_datetime` (an absolute instant), the local scheduler goes by
/// `scheduled_day` + `start_time` (a recurring weekday slot). A todo with
/// neither never produces a reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub completed: bool,
    /// Weekday the task applies to: 0 = Sunday .. 6 = Saturday.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_day: Option<u8>,
    /// "HH:MM" local clock time. None means no local reminder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Absolute due instant, authoritative for the server scanner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Flip the completion flag, maintaining the completed_date invariant:
    /// the first false→true transition stamps it, any →false clears it.
    /// A repeat true→true keeps the original stamp.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed {
            if self.completed_date.is_none() {
                self.completed_date = Some(now);
            }
        } else {
            self.completed_date = None;
        }
        self.completed = completed;
    }
}

// API request/response types

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub username: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: String,
    pub scheduled_day: Option<u8>,
    pub start_time: Option<String>,
    pub target_datetime: Option<DateTime<Utc>>,
}

/// Partial update. Absent fields keep their current value. Double-Option
/// fields distinguish "leave alone" (absent) from "clear" (explicit null).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_day: Option<Option<u8>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub target_datetime: Option<Option<DateTime<Utc>>>,
    pub completed_date: Option<DateTime<Utc>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

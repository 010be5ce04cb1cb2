//! Typed redb repository for users and todos.
//!
//! Every operation is an explicit method — list-incomplete, get-by-id,
//! insert, update, delete — so callers never describe queries, they call
//! them. Rows are serde_json blobs keyed by uuid bytes; username and email
//! lookups go through secondary index tables.

use crate::models::{Todo, User};
use redb::{Database, ReadableTable, TableDefinition};
use std::sync::Arc;
use uuid::Uuid;

const USERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("users");
const TODOS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("todos");
const USERNAME_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("username_index");
const EMAIL_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("email_index");

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at the given path, creating tables.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(USERS)?;
            let _ = txn.open_table(TODOS)?;
            let _ = txn.open_table(USERNAME_INDEX)?;
            let _ = txn.open_table(EMAIL_INDEX)?;
        }
        txn.commit()?;

        Ok(Store { db: Arc::new(db) })
    }

    // ── Users ──────────────────────────────────────────────────

    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut users = txn.open_table(USERS)?;
            let mut by_username = txn.open_table(USERNAME_INDEX)?;
            let mut by_email = txn.open_table(EMAIL_INDEX)?;

            let bytes = encode(user)?;
            let id_bytes = user.id.as_bytes();

            users.insert(id_bytes.as_slice(), bytes.as_slice())?;
            by_username.insert(user.username.as_str(), id_bytes.as_slice())?;
            by_email.insert(user.email.as_str(), id_bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;

        match users.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(USERNAME_INDEX)?;

        match index.get(username)? {
            Some(id_data) => {
                let users = txn.open_table(USERS)?;
                match users.get(id_data.value())? {
                    Some(data) => Ok(Some(decode(data.value())?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(EMAIL_INDEX)?;

        match index.get(email)? {
            Some(id_data) => {
                let users = txn.open_table(USERS)?;
                match users.get(id_data.value())? {
                    Some(data) => Ok(Some(decode(data.value())?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Rewrite a user row. Username and email never change, so the index
    /// tables are left alone.
    pub fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut users = txn.open_table(USERS)?;
            let bytes = encode(user)?;
            users.insert(user.id.as_bytes().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove a user and their index entries. Returns false if absent.
    pub fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let deleted;
        {
            let mut users = txn.open_table(USERS)?;
            let removed = users.remove(id.as_bytes().as_slice())?;
            deleted = match removed {
                Some(data) => {
                    let user: User = decode(data.value())?;
                    drop(data);
                    let mut by_username = txn.open_table(USERNAME_INDEX)?;
                    let mut by_email = txn.open_table(EMAIL_INDEX)?;
                    by_username.remove(user.username.as_str())?;
                    by_email.remove(user.email.as_str())?;
                    true
                }
                None => false,
            };
        }
        txn.commit()?;
        Ok(deleted)
    }

    // ── Todos ──────────────────────────────────────────────────

    pub fn create_todo(&self, todo: &Todo) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut todos = txn.open_table(TODOS)?;
            let bytes = encode(todo)?;
            todos.insert(todo.id.as_bytes().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        let txn = self.db.begin_read()?;
        let todos = txn.open_table(TODOS)?;

        match todos.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// A user's todos, newest first.
    pub fn list_todos_for_user(&self, user_id: Uuid) -> Result<Vec<Todo>, StoreError> {
        let txn = self.db.begin_read()?;
        let todos = txn.open_table(TODOS)?;

        let mut result = Vec::new();
        for entry in todos.iter()? {
            let (_, value) = entry?;
            let todo: Todo = decode(value.value())?;
            if todo.user_id == user_id {
                result.push(todo);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    /// The scanner's feed: every pending todo that has a due instant,
    /// across all users.
    pub fn list_incomplete_with_due_time(&self) -> Result<Vec<Todo>, StoreError> {
        let txn = self.db.begin_read()?;
        let todos = txn.open_table(TODOS)?;

        let mut result = Vec::new();
        for entry in todos.iter()? {
            let (_, value) = entry?;
            let todo: Todo = decode(value.value())?;
            if !todo.completed && todo.target_datetime.is_some() {
                result.push(todo);
            }
        }
        Ok(result)
    }

    /// Every pending todo, across all users (the local scheduler's feed).
    pub fn list_incomplete(&self) -> Result<Vec<Todo>, StoreError> {
        let txn = self.db.begin_read()?;
        let todos = txn.open_table(TODOS)?;

        let mut result = Vec::new();
        for entry in todos.iter()? {
            let (_, value) = entry?;
            let todo: Todo = decode(value.value())?;
            if !todo.completed {
                result.push(todo);
            }
        }
        Ok(result)
    }

    pub fn update_todo(&self, todo: &Todo) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut todos = txn.open_table(TODOS)?;
            let bytes = encode(todo)?;
            todos.insert(todo.id.as_bytes().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn delete_todo(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let deleted;
        {
            let mut todos = txn.open_table(TODOS)?;
            deleted = todos.remove(id.as_bytes().as_slice())?.is_some();
        }
        txn.commit()?;
        Ok(deleted)
    }

    /// Remove all of a user's todos (account deletion). Returns the count.
    pub fn delete_todos_for_user(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let ids: Vec<Uuid> = self
            .list_todos_for_user(user_id)?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let txn = self.db.begin_write()?;
        {
            let mut todos = txn.open_table(TODOS)?;
            for id in &ids {
                todos.remove(id.as_bytes().as_slice())?;
            }
        }
        txn.commit()?;
        Ok(ids.len())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StoreError {
    Redb(String),
    Decode(String),
    Encode(String),
}

// redb 2.x has many error types. Blanket them all into StoreError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self { StoreError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Redb(e) => write!(f, "redb: {e}"),
            StoreError::Decode(e) => write!(f, "decode: {e}"),
            StoreError::Encode(e) => write!(f, "encode: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;

    /// Create a temp database that the test cleans up itself.
    fn temp_store(name: &str) -> (Store, String) {
        let path = format!("/tmp/weekplan_test_{name}_{}.redb", std::process::id());
        let _ = fs::remove_file(&path);
        let store = Store::open(&path).unwrap();
        (store, path)
    }

    fn cleanup(path: &str) {
        let _ = fs::remove_file(path);
    }

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$stub".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn todo(user_id: Uuid, text: &str) -> Todo {
        Todo {
            id: Uuid::new_v4(),
            user_id,
            text: text.to_string(),
            completed: false,
            scheduled_day: Some(2),
            start_time: Some("09:30".to_string()),
            target_datetime: None,
            completed_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn user_round_trip_and_indexes() {
        let (store, path) = temp_store("users");

        let u = user("georgie");
        store.create_user(&u).unwrap();

        assert_eq!(store.get_user(u.id).unwrap().unwrap().username, "georgie");
        assert_eq!(
            store.get_user_by_username("georgie").unwrap().unwrap().id,
            u.id
        );
        assert_eq!(
            store
                .get_user_by_email("georgie@example.com")
                .unwrap()
                .unwrap()
                .id,
            u.id
        );
        assert!(store.get_user_by_username("nobody").unwrap().is_none());

        cleanup(&path);
    }

    #[test]
    fn delete_user_clears_indexes() {
        let (store, path) = temp_store("delete_user");

        let u = user("bill");
        store.create_user(&u).unwrap();
        assert!(store.delete_user(u.id).unwrap());

        assert!(store.get_user(u.id).unwrap().is_none());
        assert!(store.get_user_by_username("bill").unwrap().is_none());
        assert!(store.get_user_by_email("bill@example.com").unwrap().is_none());

        // Second delete is a no-op
        assert!(!store.delete_user(u.id).unwrap());

        cleanup(&path);
    }

    #[test]
    fn update_user_rewrites_row() {
        let (store, path) = temp_store("update_user");

        let mut u = user("beverly");
        store.create_user(&u).unwrap();
        u.password_hash = "$argon2id$new".to_string();
        store.update_user(&u).unwrap();

        assert_eq!(
            store.get_user(u.id).unwrap().unwrap().password_hash,
            "$argon2id$new"
        );

        cleanup(&path);
    }

    #[test]
    fn todos_scoped_to_user_newest_first() {
        let (store, path) = temp_store("todo_list");

        let alice = user("alice");
        let bob = user("bob");
        store.create_user(&alice).unwrap();
        store.create_user(&bob).unwrap();

        let mut first = todo(alice.id, "older");
        first.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let mut second = todo(alice.id, "newer");
        second.created_at = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();
        store.create_todo(&first).unwrap();
        store.create_todo(&second).unwrap();
        store.create_todo(&todo(bob.id, "other user")).unwrap();

        let listed = store.list_todos_for_user(alice.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text, "newer");
        assert_eq!(listed[1].text, "older");

        cleanup(&path);
    }

    #[test]
    fn scanner_feed_filters_completed_and_dateless() {
        let (store, path) = temp_store("feed");

        let u = user("mike");
        let due = Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap();

        let mut with_due = todo(u.id, "with due");
        with_due.target_datetime = Some(due);
        let mut done = todo(u.id, "done");
        done.target_datetime = Some(due);
        done.completed = true;
        let dateless = todo(u.id, "no due");

        store.create_todo(&with_due).unwrap();
        store.create_todo(&done).unwrap();
        store.create_todo(&dateless).unwrap();

        let feed = store.list_incomplete_with_due_time().unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].text, "with due");

        let pending = store.list_incomplete().unwrap();
        assert_eq!(pending.len(), 2);

        cleanup(&path);
    }

    #[test]
    fn todo_update_and_delete() {
        let (store, path) = temp_store("todo_crud");

        let u = user("richie");
        let mut t = todo(u.id, "before");
        store.create_todo(&t).unwrap();

        t.text = "after".to_string();
        t.set_completed(true, Utc::now());
        store.update_todo(&t).unwrap();

        let loaded = store.get_todo(t.id).unwrap().unwrap();
        assert_eq!(loaded.text, "after");
        assert!(loaded.completed);
        assert!(loaded.completed_date.is_some());

        assert!(store.delete_todo(t.id).unwrap());
        assert!(!store.delete_todo(t.id).unwrap());
        assert!(store.get_todo(t.id).unwrap().is_none());

        cleanup(&path);
    }

    #[test]
    fn delete_todos_for_user_cascades() {
        let (store, path) = temp_store("cascade");

        let u = user("eddie");
        let other = user("stan");
        store.create_todo(&todo(u.id, "one")).unwrap();
        store.create_todo(&todo(u.id, "two")).unwrap();
        store.create_todo(&todo(other.id, "keep")).unwrap();

        assert_eq!(store.delete_todos_for_user(u.id).unwrap(), 2);
        assert!(store.list_todos_for_user(u.id).unwrap().is_empty());
        assert_eq!(store.list_todos_for_user(other.id).unwrap().len(), 1);

        cleanup(&path);
    }
}

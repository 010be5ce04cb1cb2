//! Server-side reminder scanner.
//!
//! A single periodic task walks every pending todo that carries a due
//! instant, asks the due-soon evaluator about each, and dispatches one
//! notification payload per (todo, reminder instant) occurrence. The
//! firing ledger remembers dispatched occurrences so the same one is never
//! delivered twice across scan cycles; delivery beyond the broadcast
//! channel is someone else's job.

use crate::due;
use crate::models::Todo;
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

const LEDGER_CAP: usize = 1000;

/// One dispatched reminder.
#[derive(Debug, Clone)]
pub struct ReminderNotice {
    pub todo_id: Uuid,
    pub title: String,
    pub body: String,
    pub reminder_time: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

impl ReminderNotice {
    fn for_todo(todo: &Todo, reminder_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        ReminderNotice {
            todo_id: todo.id,
            title: "Task reminder".to_string(),
            body: format!(
                "\"{}\" starts in {} minutes",
                todo.text,
                due::LOOKAHEAD_MINUTES
            ),
            reminder_time,
            sent_at: now,
        }
    }
}

/// Remembered (todo, reminder instant) pairs, bounded by insertion-order
/// eviction: once the ledger exceeds its cap, the oldest half goes.
///
/// Eviction is approximate on purpose — an evicted key could in theory
/// re-fire, but the evaluator only matches instants inside a rolling
/// near-future window, so keys old enough to be evicted can never match
/// again.
pub struct FiringLedger {
    seen: HashSet<(Uuid, i64)>,
    order: VecDeque<(Uuid, i64)>,
    cap: usize,
}

impl FiringLedger {
    pub fn new() -> Self {
        Self::with_capacity(LEDGER_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        FiringLedger {
            seen: HashSet::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    pub fn has_fired(&self, key: &(Uuid, i64)) -> bool {
        self.seen.contains(key)
    }

    pub fn mark_fired(&mut self, key: (Uuid, i64)) {
        if self.seen.insert(key) {
            self.order.push_back(key);
        }
        if self.order.len() > self.cap {
            let evict = self.cap / 2;
            for _ in 0..evict {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
            debug!(evicted = evict, remaining = self.order.len(), "firing ledger evicted oldest half");
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

pub struct Scanner {
    store: Store,
    ledger: FiringLedger,
    notice_tx: broadcast::Sender<ReminderNotice>,
}

impl Scanner {
    pub fn new(store: Store, notice_tx: broadcast::Sender<ReminderNotice>) -> Self {
        Scanner {
            store,
            ledger: FiringLedger::new(),
            notice_tx,
        }
    }

    /// One scan cycle. Returns how many notices were dispatched.
    ///
    /// A store failure logs and aborts this cycle only; the next tick reads
    /// fresh. Todos without a due instant are skipped, not errors.
    pub fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let todos = match self.store.list_incomplete_with_due_time() {
            Ok(todos) => todos,
            Err(e) => {
                error!("scan tick aborted, store read failed: {e}");
                return 0;
            }
        };

        let mut sent = 0;
        for todo in &todos {
            let Some(due) = todo.target_datetime else {
                continue;
            };
            if !due::due_soon(now, Some(due)) {
                continue;
            }

            let reminder = due::reminder_instant(due);
            let key = (todo.id, reminder.timestamp());
            if self.ledger.has_fired(&key) {
                continue;
            }

            // Receiver-less send just means nobody is listening yet.
            let _ = self.notice_tx.send(ReminderNotice::for_todo(todo, reminder, now));
            self.ledger.mark_fired(key);
            sent += 1;
        }
        if sent > 0 {
            debug!(sent, ledger = self.ledger.len(), "scan tick dispatched");
        }
        sent
    }
}

/// Handle to the running scan loop. Stop is idempotent.
pub struct ScannerHandle {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ScannerHandle {
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("reminder scanner stopped");
        }
    }
}

/// Spawn the scan loop: fixed-period ticks, first one immediate.
pub fn start(store: Store, notice_tx: broadcast::Sender<ReminderNotice>) -> ScannerHandle {
    let mut scanner = Scanner::new(store, notice_tx);
    let task = tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(due::SCAN_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            let sent = scanner.tick(Utc::now());
            if sent > 0 {
                info!(count = sent, "dispatched reminders");
            }
        }
    });
    info!("reminder scanner started");
    ScannerHandle { task: Some(task) }
}

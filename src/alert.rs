//! Local alert delivery.
//!
//! The scheduler only emits `LocalAlert` values; how they reach the user
//! sits behind the `Alerter` trait. Linux gets a desktop notification,
//! everything else falls back to the log. Delivery failure (no notification
//! daemon, denied permission) is reported once and never retried.

use crate::schedule::LocalAlert;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub trait Alerter: Send {
    fn alert(&self, alert: &LocalAlert) -> Result<(), String>;
}

/// Writes alerts to the log. The fallback everywhere a desktop backend is
/// unavailable, and a useful trace in its own right.
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, alert: &LocalAlert) -> Result<(), String> {
        info!(todo_id = %alert.todo_id, due = %alert.due, "reminder: \"{}\"", alert.text);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
pub struct DesktopAlerter;

#[cfg(target_os = "linux")]
impl Alerter for DesktopAlerter {
    fn alert(&self, alert: &LocalAlert) -> Result<(), String> {
        notify_rust::Notification::new()
            .summary("Task reminder")
            .body(&format!("\"{}\" starts in 10 minutes", alert.text))
            .show()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(target_os = "linux")]
pub fn platform_alerter() -> Box<dyn Alerter> {
    Box::new(DesktopAlerter)
}

#[cfg(not(target_os = "linux"))]
pub fn platform_alerter() -> Box<dyn Alerter> {
    Box::new(LogAlerter)
}

/// Drain the alert channel. A failing backend is mentioned once, then the
/// alert still lands in the log so nothing disappears silently.
pub async fn run(mut rx: mpsc::UnboundedReceiver<LocalAlert>, alerter: Box<dyn Alerter>) {
    let mut delivery_warned = false;
    while let Some(alert) = rx.recv().await {
        if let Err(e) = alerter.alert(&alert) {
            if !delivery_warned {
                warn!("local alert delivery unavailable ({e}); falling back to log output");
                delivery_warned = true;
            }
            let _ = LogAlerter.alert(&alert);
        }
    }
}

mod alert;
mod api;
mod auth;
mod config;
mod due;
mod models;
mod scanner;
mod schedule;
mod store;
mod summary;

use auth::{AppState, SharedState};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use store::Store;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Boot ───────────────────────────────────────────────────
    let settings = Settings::load().expect("Failed to parse settings.json");
    let store = Store::open(&settings.database_path).expect("Failed to open database");
    info!(path = %settings.database_path, "database open");

    // ── Reminder scanner ───────────────────────────────────────
    let (notice_tx, _) = broadcast::channel::<scanner::ReminderNotice>(256);
    let mut scanner_handle = scanner::start(store.clone(), notice_tx.clone());

    // The dispatch boundary: delivery transports subscribe here. Until one
    // does, dispatched reminders land in the log.
    let mut notice_rx = notice_tx.subscribe();
    tokio::spawn(async move {
        loop {
            match notice_rx.recv().await {
                Ok(notice) => {
                    info!(todo_id = %notice.todo_id, reminder_time = %notice.reminder_time,
                        "{}: {}", notice.title, notice.body);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // ── Local alert mirror ─────────────────────────────────────
    if settings.local_alerts {
        let (alert_tx, alert_rx) = mpsc::unbounded_channel();
        tokio::spawn(alert::run(alert_rx, alert::platform_alerter()));

        let scheduler = schedule::LocalScheduler::new(alert_tx);
        let resync_store = store.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(due::SCAN_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                match resync_store.list_incomplete() {
                    Ok(todos) => {
                        scheduler.resync(&todos, chrono::Local::now().naive_local());
                        tracing::debug!(timers = scheduler.timer_count(), "local timers resynced");
                    }
                    Err(e) => warn!("local resync skipped, store read failed: {e}"),
                }
            }
        });
        info!("local alert scheduler started");
    }

    // ── Shared state ───────────────────────────────────────────
    let state: SharedState = Arc::new(AppState {
        store,
        settings: settings.clone(),
    });

    // ── Router ─────────────────────────────────────────────────
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/reset-password", post(auth::reset_password));

    let protected = Router::new()
        .route("/api/auth/delete-account", delete(auth::delete_account))
        .route("/api/todos", get(api::list_todos).post(api::create_todo))
        .route("/api/todos/summary/weekly", get(api::weekly_summary))
        .route(
            "/api/todos/:id",
            put(api::update_todo).delete(api::delete_todo),
        )
        .route("/api/notifications", get(api::list_notifications))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::auth_middleware,
        ));

    let app = public
        .merge(protected)
        .fallback_service(ServeDir::new("public").append_index_html_on_directories(true))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // ── Start ──────────────────────────────────────────────────
    let addr = SocketAddr::new(
        settings
            .bind_address
            .parse()
            .expect("Invalid bind_address in settings"),
        settings.port,
    );
    info!("server running on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server error");

    scanner_handle.stop();
}

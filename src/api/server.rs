//! HTTP server: shared state, router and startup.

use super::{tasks, users};
use crate::db::Database;
use crate::notify::{NotificationSink, dispatch};
use crate::types::Notification;
use axum::{
    Json, Router,
    routing::{get, patch, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    /// State that stores notifications in the same database.
    pub fn new(db: Arc<Database>) -> Self {
        let notifier: Arc<dyn NotificationSink> = db.clone();
        Self { db, notifier }
    }

    /// Replace the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub(crate) fn notify(&self, notifications: &[Notification]) {
        dispatch(self.notifier.as_ref(), notifications);
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/users", post(users::create_user).get(users::list_users))
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/group",
            post(tasks::create_super_task).patch(tasks::mutate_group),
        )
        .route(
            "/api/tasks/by-identifier/{task_id}",
            get(tasks::get_task_by_identifier),
        )
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/status", patch(tasks::update_status))
        .route("/api/tasks/{id}/approve", post(tasks::approve_task))
        .route("/api/identifiers/{task_id}", get(tasks::parse_task_identifier))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given address.
///
/// Returns a shutdown sender, the bound address and the serve task. After
/// sending on the shutdown channel, await the task to let in-flight requests
/// finish.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr, JoinHandle<()>)> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Planner API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Planner API shutting down");
            })
            .await
        {
            tracing::error!("Planner API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr, server))
}

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::routes;
use super::state::DashboardState;
use super::websocket;

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        // HTML pages and form actions
        .route("/", get(routes::index))
        .route("/start", post(routes::start))
        .route("/stop", post(routes::stop))
        // JSON API endpoints
        .route("/api/status", get(routes::get_status))
        .route("/api/logs", get(routes::get_logs))
        // HTMX HTML partials
        .route("/api/status/html", get(routes::get_status_html))
        .route("/api/logs/html", get(routes::get_logs_html))
        // WebSocket for live log push
        .route("/api/logs/ws", get(websocket::ws_handler))
        .with_state(state)
}

/// Serve the dashboard until Ctrl-C, then stop any active worker.
pub async fn start_dashboard(state: Arc<DashboardState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("dashboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if state.runner.status().is_active() {
        tracing::info!("shutting down, stopping active bot");
        let stopping = Arc::clone(&state);
        // NotRunning here just means the worker finished on its own meanwhile.
        let _ = tokio::task::spawn_blocking(move || stopping.runner.stop()).await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

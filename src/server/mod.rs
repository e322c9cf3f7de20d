//! Withdrawal record service over HTTP.

pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::list_page))
        .route("/list", get(handlers::list_page))
        .route("/create", get(handlers::create))
        .route("/action", get(handlers::action))
        .route("/status", get(handlers::status))
        .route("/registerCallback", post(handlers::register_callback))
        .route("/start", get(handlers::start))
        .route("/health", get(handlers::health_check))
        .with_state(Arc::new(state))
}

/// Bind and serve until the process exits
pub async fn run_server(host: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Withdrawal record service listening");
    serve(listener, state).await
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

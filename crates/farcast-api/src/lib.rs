//! farcast-api — HTTP ingress and read-only inspection for the daemon.

pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Largest accepted request body. Payloads arrive base64-encoded.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/send-bundle",
            post(handlers::handle_send_bundle).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/health", get(handlers::handle_health))
        .route("/status", get(handlers::handle_status))
        .route("/bundles/{node}", get(handlers::handle_queue))
        .route("/delivered", get(handlers::handle_delivered))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    serve_on(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

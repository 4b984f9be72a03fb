//! /health, /status, /delivered, /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

use farcast_core::{NodeId, Timestamp};
use farcast_services::{DeliveredBundle, NetworkStatus};

use super::ApiState;

// ── /health ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ── /status ───────────────────────────────────────────────────────────────────

pub async fn handle_status(State(state): State<ApiState>) -> Json<NetworkStatus> {
    Json(state.engine.network_status().await)
}

// ── /delivered ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DeliveredResponse {
    pub count: usize,
    pub bundles: Vec<DeliveredInfo>,
}

#[derive(Serialize)]
pub struct DeliveredInfo {
    pub id: String,
    pub source: NodeId,
    pub destination: NodeId,
    /// Plaintext, base64.
    pub payload: String,
    pub path: Vec<NodeId>,
    pub priority: u8,
    pub was_encrypted: bool,
    pub created_at: Timestamp,
    pub delivered_at: Timestamp,
    pub transit_ms: u64,
}

impl From<DeliveredBundle> for DeliveredInfo {
    fn from(d: DeliveredBundle) -> Self {
        Self {
            transit_ms: d.transit_ms(),
            id: d.id.to_string(),
            payload: BASE64.encode(&d.payload),
            source: d.source,
            destination: d.destination,
            path: d.path,
            priority: d.priority,
            was_encrypted: d.was_encrypted,
            created_at: d.created_at,
            delivered_at: d.delivered_at,
        }
    }
}

pub async fn handle_delivered(State(state): State<ApiState>) -> Json<DeliveredResponse> {
    let bundles: Vec<DeliveredInfo> = state
        .deliveries
        .list()
        .into_iter()
        .map(DeliveredInfo::from)
        .collect();

    Json(DeliveredResponse {
        count: bundles.len(),
        bundles,
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    // No receivers means the daemon is already on its way down.
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::state;
    use bytes::Bytes;
    use farcast_services::now_ms;

    #[tokio::test]
    async fn health_is_healthy() {
        let Json(h) = handle_health().await;
        assert_eq!(serde_json::to_value(h).unwrap()["status"], "healthy");
    }

    #[tokio::test]
    async fn status_lists_every_node() {
        let (state, _rx) = state();
        state.engine.routing_tick(now_ms()).await.unwrap();

        let Json(status) = handle_status(State(state)).await;
        assert_eq!(status.buffer_usage.len(), 2);
        assert_eq!(status.links.len(), 2);
        assert_eq!(status.routing_table.len(), 2);
        assert!(status.snapshot_time.is_some());
    }

    #[tokio::test]
    async fn delivered_reports_plaintext() {
        let (state, _rx) = state();
        state
            .engine
            .submit_bundle("earth".into(), "moon".into(), Bytes::from_static(b"ping"), 8)
            .await
            .unwrap();
        let now = now_ms();
        state.engine.routing_tick(now).await.unwrap();
        state.engine.transmission_tick(now).await;

        let Json(resp) = handle_delivered(State(state)).await;
        assert_eq!(resp.count, 1);
        let d = &resp.bundles[0];
        assert_eq!(d.payload, BASE64.encode(b"ping"));
        assert!(d.was_encrypted);
        assert_eq!(d.path, vec![NodeId::from("earth"), "moon".into()]);
    }

    #[tokio::test]
    async fn shutdown_broadcasts() {
        let (state, mut rx) = state();
        handle_shutdown(State(state)).await;
        assert!(rx.try_recv().is_ok());
    }
}

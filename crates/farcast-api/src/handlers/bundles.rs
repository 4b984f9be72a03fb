//! /send-bundle and /bundles/{node} handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use farcast_core::{BundleSummary, NodeId};
use farcast_services::EngineError;

use super::{ApiError, ApiState};

// ── /send-bundle (POST) ───────────────────────────────────────────────────────

/// Fields are optional here so that a missing one is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct SendBundleRequest {
    pub source: Option<String>,
    pub destination: Option<String>,
    /// Base64 (standard alphabet, padded).
    pub payload: Option<String>,
    pub priority: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBundleResponse {
    pub message: String,
    pub bundle_id: String,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

pub async fn handle_send_bundle(
    State(state): State<ApiState>,
    body: Result<Json<SendBundleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendBundleResponse>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (Some(source), Some(destination), Some(payload)) = (
        required(req.source),
        required(req.destination),
        required(req.payload),
    ) else {
        return Err(ApiError::bad_request(
            "source, destination and payload are required",
        ));
    };

    let payload = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("payload is not valid base64: {e}")))?;

    let id = state
        .engine
        .submit_bundle(
            NodeId::new(source),
            NodeId::new(destination),
            Bytes::from(payload),
            req.priority.unwrap_or(0),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendBundleResponse {
            message: "Bundle accepted for delivery".to_string(),
            bundle_id: id.to_string(),
        }),
    ))
}

// ── /bundles/{node} (GET) ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub node: NodeId,
    pub bundles: Vec<BundleSummary>,
    pub buffer_usage: u64,
}

pub async fn handle_queue(
    State(state): State<ApiState>,
    Path(node): Path<String>,
) -> Result<Json<QueueResponse>, ApiError> {
    let node = NodeId::new(node);
    let bundles = match state.engine.queued(&node).await {
        Ok(b) => b,
        Err(EngineError::UnknownNode(n)) => {
            return Err(ApiError::not_found(format!("unknown node: {n}")))
        }
        Err(e) => return Err(e.into()),
    };
    let buffer_usage = bundles.iter().map(|b| b.size).sum();

    Ok(Json(QueueResponse {
        node,
        bundles,
        buffer_usage,
    }))
}

//! farcastd — store-and-forward routing daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use farcast_core::config::FarcastConfig;
use farcast_core::{NodeId, NodeKeyring};
use farcast_services::{
    BodyOcclusion, ConfiguredGeometry, DeliveryLog, Engine, EngineError, EngineHandle,
    LossySimulator, Scheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = FarcastConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = FarcastConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FarcastConfig::default()
    });

    let nodes: Vec<NodeId> = config.node_ids().into_iter().map(NodeId::new).collect();
    tracing::info!(
        nodes = nodes.len(),
        bodies = config.topology.bodies.len(),
        "farcastd starting"
    );

    // Topology
    let geometry = ConfiguredGeometry::from_config(&config.topology)
        .context("invalid node placement in [topology]")?;
    let occlusion = BodyOcclusion::from_config(&config.topology);
    let simulator = LossySimulator::from_config(&config.simulator);

    // One static X25519 key per node
    let keyring = NodeKeyring::generate(&nodes);
    for node in &nodes {
        if let Some(pk) = keyring.public_key(node) {
            tracing::debug!(node = %node, public_key = hex::encode(&pk[..8]), "node key ready");
        }
    }

    let deliveries = DeliveryLog::new();
    let engine = Engine::new(
        nodes,
        Arc::new(geometry),
        Arc::new(occlusion),
        Arc::new(simulator),
        Arc::new(keyring),
        Arc::new(deliveries.clone()),
    )
    .context("failed to initialize engine")?;
    let engine = EngineHandle::new(engine);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let mut scheduler_task = tokio::spawn(
        Scheduler::new(
            engine.clone(),
            Duration::from_millis(config.scheduler.routing_interval_ms),
            Duration::from_millis(config.scheduler.transmission_interval_ms),
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let api_port = config.network.api_port;
    let api_task = {
        let state = farcast_api::ApiState {
            engine: engine.clone(),
            deliveries: deliveries.clone(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(farcast_api::serve(state, api_port))
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    let scheduler_result = tokio::select! {
        _ = shutdown_rx.recv()   => { tracing::info!("shutting down"); None }
        r = &mut scheduler_task  => Some(r),
        r = api_task             => { tracing::error!("API server exited: {:?}", r); None }
    };

    // Let the in-flight tick finish so every bundle ends up in exactly one queue.
    let _ = shutdown_tx.send(());
    let scheduler_result = match scheduler_result {
        Some(r) => r,
        None => scheduler_task.await,
    };
    let outcome = scheduler_outcome(scheduler_result);
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "scheduler stopped");
    }

    let status = engine.network_status().await;
    for (node, count) in status.queued_bundles.iter().filter(|(_, c)| **c > 0) {
        tracing::info!(
            node = %node,
            bundles = count,
            bytes = status.buffer_usage.get(node).copied().unwrap_or(0),
            "undelivered bundles at shutdown"
        );
    }
    tracing::info!(
        delivered = deliveries.count(),
        queued = engine.total_queued().await,
        "farcastd stopped"
    );

    outcome
}

/// A scheduler that stops on its own is a fatal configuration error and
/// must fail the process.
fn scheduler_outcome(
    result: Result<Result<(), EngineError>, tokio::task::JoinError>,
) -> Result<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e).context("routing failed"),
        Err(e) => Err(e).context("scheduler task panicked"),
    }
}

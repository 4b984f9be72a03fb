//! Farcast integration test harness.
//!
//! Tests here drive the engine with real geometry (fixed and orbiting
//! nodes, spherical bodies) and the HTTP API over a loopback socket.
//! Nothing needs root or external services:
//!
//!   cargo test --test integration
//!
//! Engine scenarios pass explicit timestamps to each tick so that orbital
//! positions are reproducible.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use farcast_core::{BundleId, NodeId, NodeKeyring, Position, Timestamp};
use farcast_services::{
    Body, BodyOcclusion, ConfiguredGeometry, DeliveryLog, Engine, EngineHandle, LossySimulator,
    TickReport,
};

mod api;
mod scenarios;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const MOON_CENTER: Position = Position {
    x: 384_400.0,
    y: 0.0,
    z: 0.0,
};
pub const MOON_RADIUS_KM: f64 = 1_737.4;

pub fn moon() -> Body {
    Body {
        name: "moon".to_string(),
        center: MOON_CENTER,
        radius_km: MOON_RADIUS_KM,
    }
}

/// An engine plus the delivery log it writes to.
pub struct Network {
    pub engine: EngineHandle,
    pub deliveries: DeliveryLog,
}

impl Network {
    /// `nodes` fixes the node order, which in turn fixes route tie-breaks.
    pub fn build(
        nodes: &[&str],
        geometry: ConfiguredGeometry,
        bodies: Vec<Body>,
        simulator: LossySimulator,
    ) -> Result<Self> {
        let ids: Vec<NodeId> = nodes.iter().map(|n| NodeId::from(*n)).collect();
        let deliveries = DeliveryLog::new();
        let engine = Engine::new(
            ids.clone(),
            Arc::new(geometry),
            Arc::new(BodyOcclusion::new(bodies, None)),
            Arc::new(simulator),
            Arc::new(NodeKeyring::generate(&ids)),
            Arc::new(deliveries.clone()),
        )
        .context("engine rejected topology")?;
        Ok(Self {
            engine: EngineHandle::new(engine),
            deliveries,
        })
    }

    pub async fn send(&self, from: &str, to: &str, payload: &'static [u8], priority: u8) -> Result<BundleId> {
        let id = self
            .engine
            .submit_bundle(from.into(), to.into(), Bytes::from_static(payload), priority)
            .await?;
        Ok(id)
    }

    /// One routing tick followed by one transmission tick at `now`.
    pub async fn step(&self, now: Timestamp) -> Result<TickReport> {
        self.engine.routing_tick(now).await?;
        Ok(self.engine.transmission_tick(now).await)
    }

    /// Where is this bundle: `Some(node)` while queued, `None` once delivered.
    /// Fails if it is in neither place, or in both.
    pub async fn whereabouts(&self, id: &BundleId) -> Result<Option<NodeId>> {
        let queued = self.engine.locate(id).await;
        let delivered = self.deliveries.get(id).is_some();
        match (queued, delivered) {
            (Some(node), false) => Ok(Some(node)),
            (None, true) => Ok(None),
            (Some(node), true) => anyhow::bail!("{id} is queued at {node} and also delivered"),
            (None, false) => anyhow::bail!("{id} vanished"),
        }
    }
}

pub fn lossless() -> LossySimulator {
    LossySimulator::new(0.0, 0.0, 0.0)
}

//! Store-and-forward engine: custody transfer over a time-varying topology.
//!
//! The engine owns every piece of mutable routing state: the bundle store,
//! the latest link snapshot and the routing table. Two kinds of tick drive it:
//!
//!   routing tick       recompute links and routes from geometry
//!   transmission tick  each node with queued traffic tries to hand its
//!                      head-of-line bundle to its next hop
//!
//! Outcomes of a transmission attempt:
//!   success, next hop is destination  → decrypt if sealed, deliver, retire
//!   success, otherwise                → custody moves to the next hop's tail
//!   failure                           → bundle goes back to the head of the
//!                                       sender's queue, no retry limit
//!
//! Callers reach the engine through `EngineHandle`, which serializes access
//! so that no two ticks (or a tick and a submission) ever interleave.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use farcast_core::{
    Bundle, BundleId, BundleSummary, CommunicationLink, NodeId, PayloadCipher, Timestamp,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::bundle_store::BundleStore;
use crate::delivery::{DeliveredBundle, DeliverySink};
use crate::error::EngineError;
use crate::geometry::{GeometryProvider, Occlusion};
use crate::link_table::{LinkSnapshot, LinkTableBuilder, RoutingTable};
use crate::transmission::TransmissionSimulator;

/// Current wall clock, Unix ms.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Cumulative counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub submitted: u64,
    pub forwarded: u64,
    pub delivered: u64,
    pub failed_attempts: u64,
    /// Bundles retired without delivery after an internal error.
    pub dropped: u64,
}

/// What one transmission tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub attempted: usize,
    pub forwarded: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Nodes with traffic but no route or no line of sight.
    pub held: usize,
    pub dropped: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.attempted == 0 && self.held == 0
    }
}

/// Read-only view of the engine between ticks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStatus {
    pub snapshot_time: Option<Timestamp>,
    pub links: Vec<CommunicationLink>,
    pub routing_table: RoutingTable,
    /// Sum of bundle `size` per node.
    pub buffer_usage: BTreeMap<NodeId, u64>,
    pub queued_bundles: BTreeMap<NodeId, usize>,
    pub stats: EngineStats,
}

pub struct Engine {
    nodes: Vec<NodeId>,
    builder: LinkTableBuilder,
    simulator: Arc<dyn TransmissionSimulator>,
    cipher: Arc<dyn PayloadCipher>,
    sink: Arc<dyn DeliverySink>,
    store: BundleStore,
    links: LinkSnapshot,
    routing: RoutingTable,
    next_seq: u64,
    stats: EngineStats,
}

impl Engine {
    /// Initialize with an empty store per node. Fails if the node set is
    /// empty or repeats an id, or if geometry cannot place every node.
    pub fn new(
        nodes: Vec<NodeId>,
        geometry: Arc<dyn GeometryProvider>,
        occlusion: Arc<dyn Occlusion>,
        simulator: Arc<dyn TransmissionSimulator>,
        cipher: Arc<dyn PayloadCipher>,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self, EngineError> {
        if nodes.is_empty() {
            return Err(EngineError::InvalidTopology("no nodes configured".into()));
        }
        for (i, node) in nodes.iter().enumerate() {
            if nodes[..i].contains(node) {
                return Err(EngineError::InvalidTopology(format!("duplicate node {node}")));
            }
        }

        let builder = LinkTableBuilder::new(geometry, occlusion);
        builder.positions(&nodes, 0)?;

        tracing::info!(nodes = nodes.len(), "engine initialized");

        Ok(Self {
            store: BundleStore::new(&nodes),
            nodes,
            builder,
            simulator,
            cipher,
            sink,
            links: LinkSnapshot::default(),
            routing: RoutingTable::new(),
            next_seq: 0,
            stats: EngineStats::default(),
        })
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    // ── Public operations ─────────────────────────────────────────────────────

    /// Accept a new bundle at `source`. Payloads of bundles above the
    /// priority threshold are sealed for `destination` before queueing.
    /// Every call creates a new bundle; there is no dedup.
    pub fn submit_bundle(
        &mut self,
        source: NodeId,
        destination: NodeId,
        payload: Bytes,
        priority: u8,
        now: Timestamp,
    ) -> Result<BundleId, EngineError> {
        if !self.store.knows(&source) {
            return Err(EngineError::UnknownNode(source));
        }
        if !self.store.knows(&destination) {
            return Err(EngineError::UnknownNode(destination));
        }
        if source == destination {
            return Err(EngineError::InvalidBundle(format!(
                "source and destination are both {source}"
            )));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let id = BundleId::derive(&source, &destination, now, seq, &payload);
        let mut bundle = Bundle::new(id.clone(), source, destination, payload, priority, now);

        if bundle.requires_encryption() {
            let sealed = self
                .cipher
                .encrypt(&bundle.source, &bundle.destination, &bundle.payload)?;
            bundle.payload = Bytes::from(sealed);
            bundle.encrypted = true;
        }

        tracing::info!(
            bundle = %id,
            source = %bundle.source,
            destination = %bundle.destination,
            size = bundle.size,
            priority,
            encrypted = bundle.encrypted,
            "bundle accepted"
        );

        let source = bundle.source.clone();
        self.store.push_back(&source, bundle)?;
        self.stats.submitted += 1;
        Ok(id)
    }

    /// Snapshot of links, routes and buffer usage. Does not mutate state.
    pub fn network_status(&self) -> NetworkStatus {
        NetworkStatus {
            snapshot_time: self.links.taken_at,
            links: self.links.links.clone(),
            routing_table: self.routing.clone(),
            buffer_usage: self.store.usage_by_node(),
            queued_bundles: self.store.counts_by_node(),
            stats: self.stats,
        }
    }

    /// Bundles queued at `node`, head first.
    pub fn queued(&self, node: &NodeId) -> Result<Vec<BundleSummary>, EngineError> {
        self.store.summaries(node)
    }

    /// Node currently holding custody of a bundle, if it is still in transit.
    pub fn locate(&self, id: &BundleId) -> Option<NodeId> {
        self.store.locate(id).cloned()
    }

    pub fn total_queued(&self) -> usize {
        self.store.total_bundles()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    // ── Ticks ─────────────────────────────────────────────────────────────────

    /// Replace the link snapshot and routing table with fresh ones for `now`.
    /// Geometry failures leave the previous state untouched.
    pub fn routing_tick(&mut self, now: Timestamp) -> Result<(), EngineError> {
        let (links, routing) = self.builder.build(&self.nodes, now)?;

        let hops = |t: &RoutingTable| -> Vec<(NodeId, NodeId)> {
            t.iter().map(|(k, v)| (k.clone(), v.next_hop.clone())).collect()
        };
        if hops(&routing) != hops(&self.routing) {
            tracing::info!(
                routes = routing.len(),
                visible_links = links.line_of_sight_count(),
                "routing table changed"
            );
            for (node, entry) in &routing {
                tracing::debug!(
                    node = %node,
                    next_hop = %entry.next_hop,
                    latency_secs = entry.estimated_latency_secs,
                    "  route"
                );
            }
        }

        self.links = links;
        self.routing = routing;
        Ok(())
    }

    /// Give every node that had traffic at the start of the tick one chance
    /// to move its head-of-line bundle. Nodes are visited in configuration
    /// order; a bundle moves at most one hop per tick.
    pub async fn transmission_tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        let ready: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| !self.store.is_empty(n))
            .cloned()
            .collect();

        for node in ready {
            let Some(route) = self.routing.get(&node).cloned() else {
                tracing::debug!(node = %node, queued = self.store.len(&node), "no route, holding");
                report.held += 1;
                continue;
            };

            let link = match self.links.link(&node, &route.next_hop) {
                Some(l) if l.line_of_sight => l.clone(),
                _ => {
                    tracing::debug!(node = %node, next_hop = %route.next_hop, "no line of sight, holding");
                    report.held += 1;
                    continue;
                }
            };

            let Some(mut bundle) = self.store.pop_front(&node) else {
                continue;
            };
            bundle.path.push(route.next_hop.clone());
            report.attempted += 1;

            let simulator = Arc::clone(&self.simulator);
            if !simulator.transmit(&link, &bundle).await {
                bundle.path.pop();
                self.stats.failed_attempts += 1;
                report.failed += 1;
                tracing::warn!(
                    bundle = %bundle.id,
                    from = %node,
                    to = %route.next_hop,
                    "transmission failed, requeued at head"
                );
                if let Err(e) = self.store.push_front(&node, bundle) {
                    self.drop_bundle(&mut report, e);
                }
                continue;
            }

            if route.next_hop == bundle.destination {
                match self.deliver(bundle, now) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => self.drop_bundle(&mut report, e),
                }
            } else {
                tracing::debug!(bundle = %bundle.id, from = %node, to = %route.next_hop, "custody transferred");
                match self.store.push_back(&route.next_hop, bundle) {
                    Ok(()) => {
                        self.stats.forwarded += 1;
                        report.forwarded += 1;
                    }
                    Err(e) => self.drop_bundle(&mut report, e),
                }
            }
        }

        report
    }

    fn deliver(&mut self, bundle: Bundle, now: Timestamp) -> Result<(), EngineError> {
        let plaintext = if bundle.encrypted {
            Bytes::from(
                self.cipher
                    .decrypt(&bundle.destination, &bundle.source, &bundle.payload)
                    .map_err(|e| {
                        tracing::error!(bundle = %bundle.id, error = %e, "payload decryption failed");
                        e
                    })?,
            )
        } else {
            bundle.payload.clone()
        };

        self.sink.deliver(DeliveredBundle::new(bundle, plaintext, now));
        self.stats.delivered += 1;
        Ok(())
    }

    fn drop_bundle(&mut self, report: &mut TickReport, error: EngineError) {
        tracing::error!(error = %error, "bundle dropped");
        self.stats.dropped += 1;
        report.dropped += 1;
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Shared, serialized access to the engine.
///
/// Every operation takes the engine lock for its whole duration, including
/// the awaits inside a transmission tick.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<Engine>>,
}

impl EngineHandle {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub async fn submit_bundle(
        &self,
        source: NodeId,
        destination: NodeId,
        payload: Bytes,
        priority: u8,
    ) -> Result<BundleId, EngineError> {
        self.inner
            .lock()
            .await
            .submit_bundle(source, destination, payload, priority, now_ms())
    }

    pub async fn network_status(&self) -> NetworkStatus {
        self.inner.lock().await.network_status()
    }

    pub async fn queued(&self, node: &NodeId) -> Result<Vec<BundleSummary>, EngineError> {
        self.inner.lock().await.queued(node)
    }

    pub async fn locate(&self, id: &BundleId) -> Option<NodeId> {
        self.inner.lock().await.locate(id)
    }

    pub async fn nodes(&self) -> Vec<NodeId> {
        self.inner.lock().await.nodes().to_vec()
    }

    pub async fn total_queued(&self) -> usize {
        self.inner.lock().await.total_queued()
    }

    pub async fn routing_tick(&self, now: Timestamp) -> Result<(), EngineError> {
        self.inner.lock().await.routing_tick(now)
    }

    pub async fn transmission_tick(&self, now: Timestamp) -> TickReport {
        self.inner.lock().await.transmission_tick(now).await
    }
}

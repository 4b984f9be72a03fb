//! Final delivery: hands plaintext payloads to the outside world.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use farcast_core::{Bundle, BundleId, NodeId, Timestamp};

/// A bundle that reached its destination, payload already decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBundle {
    pub id: BundleId,
    pub source: NodeId,
    pub destination: NodeId,
    pub payload: Bytes,
    pub path: Vec<NodeId>,
    pub priority: u8,
    pub was_encrypted: bool,
    pub created_at: Timestamp,
    pub delivered_at: Timestamp,
}

impl DeliveredBundle {
    pub fn new(bundle: Bundle, plaintext: Bytes, delivered_at: Timestamp) -> Self {
        Self {
            id: bundle.id,
            source: bundle.source,
            destination: bundle.destination,
            payload: plaintext,
            path: bundle.path,
            priority: bundle.priority,
            was_encrypted: bundle.encrypted,
            created_at: bundle.creation_time,
            delivered_at,
        }
    }

    /// Store-and-forward transit time, ms.
    pub fn transit_ms(&self) -> u64 {
        self.delivered_at.saturating_sub(self.created_at)
    }
}

/// External consumer of delivered payloads.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, delivered: DeliveredBundle);
}

/// Deliveries kept by `DeliveryLog::new`.
pub const DEFAULT_DELIVERY_CAPACITY: usize = 10_000;

/// In-memory record of recent deliveries, in arrival order. Once full, the
/// oldest delivery is evicted for each new one.
#[derive(Clone)]
pub struct DeliveryLog {
    // bundle id -> (arrival sequence, delivery)
    entries: Arc<DashMap<BundleId, (u64, DeliveredBundle)>>,
    next_seq: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for DeliveryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DELIVERY_CAPACITY)
    }
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log holding at most `capacity` deliveries (minimum one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, id: &BundleId) -> Option<DeliveredBundle> {
        self.entries.get(id).map(|e| e.value().1.clone())
    }

    /// All deliveries, oldest first.
    pub fn list(&self) -> Vec<DeliveredBundle> {
        let mut all: Vec<(u64, DeliveredBundle)> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, d)| d).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().0)
            .map(|e| e.key().clone());
        if let Some(id) = oldest {
            self.entries.remove(&id);
            tracing::debug!(bundle = %id, "delivery record evicted");
        }
    }
}

impl DeliverySink for DeliveryLog {
    fn deliver(&self, delivered: DeliveredBundle) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            bundle = %delivered.id,
            source = %delivered.source,
            destination = %delivered.destination,
            hops = delivered.path.len().saturating_sub(1),
            transit_ms = delivered.transit_ms(),
            "bundle delivered"
        );
        self.entries.insert(delivered.id.clone(), (seq, delivered));
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }
}

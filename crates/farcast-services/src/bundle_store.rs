//! Per-node bundle queues.
//!
//! One FIFO per known node, created empty at startup. Bundles only move
//! between queues through the engine; a bundle id is held by at most one
//! queue at a time.

use std::collections::{BTreeMap, HashMap, VecDeque};

use farcast_core::{Bundle, BundleId, BundleSummary, NodeId};

use crate::error::EngineError;

#[derive(Debug, Clone, Default)]
pub struct BundleStore {
    /// Node order, fixed at construction.
    nodes: Vec<NodeId>,
    queues: HashMap<NodeId, VecDeque<Bundle>>,
}

impl BundleStore {
    pub fn new(nodes: &[NodeId]) -> Self {
        Self {
            nodes: nodes.to_vec(),
            queues: nodes.iter().map(|n| (n.clone(), VecDeque::new())).collect(),
        }
    }

    pub fn knows(&self, node: &NodeId) -> bool {
        self.queues.contains_key(node)
    }

    fn queue_mut(&mut self, node: &NodeId) -> Result<&mut VecDeque<Bundle>, EngineError> {
        self.queues
            .get_mut(node)
            .ok_or_else(|| EngineError::UnknownNode(node.clone()))
    }

    /// Append at the tail (new traffic, custody transfer).
    pub fn push_back(&mut self, node: &NodeId, bundle: Bundle) -> Result<(), EngineError> {
        self.queue_mut(node)?.push_back(bundle);
        Ok(())
    }

    /// Insert at the head (failed attempt, retried before newer traffic).
    pub fn push_front(&mut self, node: &NodeId, bundle: Bundle) -> Result<(), EngineError> {
        self.queue_mut(node)?.push_front(bundle);
        Ok(())
    }

    pub fn pop_front(&mut self, node: &NodeId) -> Option<Bundle> {
        self.queues.get_mut(node).and_then(|q| q.pop_front())
    }

    pub fn len(&self, node: &NodeId) -> usize {
        self.queues.get(node).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, node: &NodeId) -> bool {
        self.len(node) == 0
    }

    pub fn total_bundles(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    /// Sum of `size` over the bundles queued at a node.
    pub fn buffer_usage(&self, node: &NodeId) -> u64 {
        self.queues
            .get(node)
            .map(|q| q.iter().map(|b| b.size).sum())
            .unwrap_or(0)
    }

    /// Buffer usage for every node, including empty ones.
    pub fn usage_by_node(&self) -> BTreeMap<NodeId, u64> {
        self.nodes
            .iter()
            .map(|n| (n.clone(), self.buffer_usage(n)))
            .collect()
    }

    pub fn counts_by_node(&self) -> BTreeMap<NodeId, usize> {
        self.nodes.iter().map(|n| (n.clone(), self.len(n))).collect()
    }

    /// Which node currently holds this bundle?
    pub fn locate(&self, id: &BundleId) -> Option<&NodeId> {
        self.nodes.iter().find(|n| {
            self.queues
                .get(*n)
                .map(|q| q.iter().any(|b| &b.id == id))
                .unwrap_or(false)
        })
    }

    pub fn contains(&self, id: &BundleId) -> bool {
        self.locate(id).is_some()
    }

    /// Queue contents for a node, head first.
    pub fn summaries(&self, node: &NodeId) -> Result<Vec<BundleSummary>, EngineError> {
        self.queues
            .get(node)
            .map(|q| q.iter().map(Bundle::summary).collect())
            .ok_or_else(|| EngineError::UnknownNode(node.clone()))
    }
}

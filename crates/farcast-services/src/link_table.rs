//! Link table builder. Turns geometry into a link snapshot and a
//! single-hop routing table.
//!
//! Pairs are visited in node order, `(i, j)` with `i < j`, each emitting
//! `i → j` then `j → i`. A node's route is the first line-of-sight link
//! originating at it in that order. This is a greedy single-hop choice,
//! not a shortest path, and the tie-break is part of observable behaviour.

use std::collections::BTreeMap;
use std::sync::Arc;

use farcast_core::{CommunicationLink, NodeId, Position, RoutingEntry, Timestamp};
use serde::Serialize;

use crate::geometry::{GeometryError, GeometryProvider, Occlusion};

/// Routing table keyed by source node.
pub type RoutingTable = BTreeMap<NodeId, RoutingEntry>;

/// All directed links observed at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkSnapshot {
    /// `None` until the first routing tick.
    pub taken_at: Option<Timestamp>,
    pub links: Vec<CommunicationLink>,
}

impl LinkSnapshot {
    /// The directed link `from → to`, if present.
    pub fn link(&self, from: &NodeId, to: &NodeId) -> Option<&CommunicationLink> {
        self.links
            .iter()
            .find(|l| &l.source == from && &l.destination == to)
    }

    pub fn line_of_sight_count(&self) -> usize {
        self.links.iter().filter(|l| l.line_of_sight).count()
    }
}

pub struct LinkTableBuilder {
    geometry: Arc<dyn GeometryProvider>,
    occlusion: Arc<dyn Occlusion>,
}

impl LinkTableBuilder {
    pub fn new(geometry: Arc<dyn GeometryProvider>, occlusion: Arc<dyn Occlusion>) -> Self {
        Self {
            geometry,
            occlusion,
        }
    }

    /// Resolve every node's position at `at`. Any unknown node fails the
    /// whole snapshot.
    pub fn positions(&self, nodes: &[NodeId], at: Timestamp) -> Result<Vec<Position>, GeometryError> {
        nodes.iter().map(|n| self.geometry.position(n, at)).collect()
    }

    /// Compute the full pairwise link snapshot.
    pub fn snapshot(&self, nodes: &[NodeId], at: Timestamp) -> Result<LinkSnapshot, GeometryError> {
        let positions = self.positions(nodes, at)?;
        let mut links = Vec::with_capacity(nodes.len() * nodes.len().saturating_sub(1));

        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let (a, b) = (&nodes[i], &nodes[j]);
                let (pa, pb) = (&positions[i], &positions[j]);
                let distance = pa.distance_to(pb);

                let a_to_b = self.occlusion.line_of_sight(a, pa, b, pb);
                let b_to_a = self.occlusion.line_of_sight(b, pb, a, pa);

                links.push(CommunicationLink::new(a.clone(), b.clone(), distance, a_to_b));
                links.push(CommunicationLink::new(b.clone(), a.clone(), distance, b_to_a));
            }
        }

        Ok(LinkSnapshot {
            taken_at: Some(at),
            links,
        })
    }

    /// First line-of-sight neighbour per node, in snapshot order.
    pub fn derive_routes(nodes: &[NodeId], snapshot: &LinkSnapshot) -> RoutingTable {
        nodes
            .iter()
            .filter_map(|node| {
                snapshot
                    .links
                    .iter()
                    .find(|l| &l.source == node && l.line_of_sight)
                    .map(|l| (node.clone(), RoutingEntry::via(l)))
            })
            .collect()
    }

    /// Snapshot and routing table for one instant.
    pub fn build(
        &self,
        nodes: &[NodeId],
        at: Timestamp,
    ) -> Result<(LinkSnapshot, RoutingTable), GeometryError> {
        let snapshot = self.snapshot(nodes, at)?;
        let routes = Self::derive_routes(nodes, &snapshot);
        Ok((snapshot, routes))
    }
}

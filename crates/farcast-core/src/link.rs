//! Positions, directed link records and routing rows.

use serde::{Deserialize, Serialize};

use crate::bundle::NodeId;

/// Speed of light in vacuum, km/s.
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// A point in space, kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Directed reachability between two nodes at one instant.
///
/// Links are produced in bulk by the link table builder and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationLink {
    pub source: NodeId,
    pub destination: NodeId,
    pub distance_km: f64,
    /// One-way light time.
    pub latency_secs: f64,
    pub line_of_sight: bool,
}

impl CommunicationLink {
    pub fn new(source: NodeId, destination: NodeId, distance_km: f64, line_of_sight: bool) -> Self {
        Self {
            source,
            destination,
            distance_km,
            latency_secs: distance_km / SPEED_OF_LIGHT_KM_S,
            line_of_sight,
        }
    }
}

/// Best known next hop for one source node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    /// Always equal to `next_hop`: routing is single-hop greedy.
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub estimated_latency_secs: f64,
}

impl RoutingEntry {
    pub fn via(link: &CommunicationLink) -> Self {
        Self {
            destination: link.destination.clone(),
            next_hop: link.destination.clone(),
            estimated_latency_secs: link.latency_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 12.0);
        assert_eq!(a.distance_to(&b), 13.0);
        assert_eq!(b.distance_to(&a), 13.0);
    }

    #[test]
    fn latency_is_light_time() {
        let link = CommunicationLink::new("a".into(), "b".into(), SPEED_OF_LIGHT_KM_S * 2.0, true);
        assert!((link.latency_secs - 2.0).abs() < 1e-12);
    }

    #[test]
    fn routing_entry_targets_link_destination() {
        let link = CommunicationLink::new("a".into(), "b".into(), 384_400.0, true);
        let entry = RoutingEntry::via(&link);
        assert_eq!(entry.next_hop, NodeId::from("b"));
        assert_eq!(entry.destination, entry.next_hop);
        assert_eq!(entry.estimated_latency_secs, link.latency_secs);
    }
}

//! Geometry provider and occlusion predicates.
//!
//! The engine only needs `position(node, time)`. Orbital mechanics are kept
//! deliberately crude: nodes are either fixed or on circular orbits in the
//! XY plane around an arbitrary center.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::sync::RwLock;

use farcast_core::config::TopologyConfig;
use farcast_core::{NodeId, Position, Timestamp};
use thiserror::Error;

/// Resolves a node's position at a point in time.
pub trait GeometryProvider: Send + Sync {
    fn position(&self, node: &NodeId, at: Timestamp) -> Result<Position, GeometryError>;
}

/// Decides whether `from` can see `to`. Need not be symmetric.
pub trait Occlusion: Send + Sync {
    fn line_of_sight(&self, from: &NodeId, from_pos: &Position, to: &NodeId, to_pos: &Position)
        -> bool;
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("no geometry for node {0}")]
    UnknownNode(NodeId),
    #[error("invalid placement for node {node}: {reason}")]
    InvalidPlacement { node: NodeId, reason: String },
}

// ── Configured geometry ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Placement {
    Fixed(Position),
    Circular {
        center: Position,
        radius_km: f64,
        period_secs: f64,
        phase_rad: f64,
    },
}

impl Placement {
    fn at(&self, at: Timestamp) -> Position {
        match *self {
            Placement::Fixed(p) => p,
            Placement::Circular {
                center,
                radius_km,
                period_secs,
                phase_rad,
            } => {
                let t = at as f64 / 1000.0;
                let angle = phase_rad + TAU * (t / period_secs).fract();
                Position::new(
                    center.x + radius_km * angle.cos(),
                    center.y + radius_km * angle.sin(),
                    center.z,
                )
            }
        }
    }
}

/// Fixed and circular-orbit nodes, usually built from `[topology]` config.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredGeometry {
    placements: HashMap<NodeId, Placement>,
}

impl ConfiguredGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(topology: &TopologyConfig) -> Result<Self, GeometryError> {
        let mut geometry = Self::new();
        for node in &topology.nodes {
            let id = NodeId::new(node.id.clone());
            geometry = match (&node.position, &node.orbit) {
                (Some(p), None) => geometry.with_fixed(id, Position::new(p[0], p[1], p[2])),
                (None, Some(o)) => geometry.with_orbit(
                    id,
                    Position::new(o.center[0], o.center[1], o.center[2]),
                    o.radius_km,
                    o.period_secs,
                    o.phase_deg,
                )?,
                _ => {
                    return Err(GeometryError::InvalidPlacement {
                        node: id,
                        reason: "exactly one of `position` or `orbit` must be set".into(),
                    })
                }
            };
        }
        Ok(geometry)
    }

    pub fn with_fixed(mut self, node: NodeId, position: Position) -> Self {
        self.placements.insert(node, Placement::Fixed(position));
        self
    }

    pub fn with_orbit(
        mut self,
        node: NodeId,
        center: Position,
        radius_km: f64,
        period_secs: f64,
        phase_deg: f64,
    ) -> Result<Self, GeometryError> {
        if !(period_secs > 0.0) || !(radius_km >= 0.0) {
            return Err(GeometryError::InvalidPlacement {
                node,
                reason: format!("radius {radius_km} km, period {period_secs} s"),
            });
        }
        self.placements.insert(
            node,
            Placement::Circular {
                center,
                radius_km,
                period_secs,
                phase_rad: phase_deg.to_radians(),
            },
        );
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

impl GeometryProvider for ConfiguredGeometry {
    fn position(&self, node: &NodeId, at: Timestamp) -> Result<Position, GeometryError> {
        self.placements
            .get(node)
            .map(|p| p.at(at))
            .ok_or_else(|| GeometryError::UnknownNode(node.clone()))
    }
}

// ── Occlusion predicates ──────────────────────────────────────────────────────

/// Every pair can see every other pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unobstructed;

impl Occlusion for Unobstructed {
    fn line_of_sight(&self, _: &NodeId, _: &Position, _: &NodeId, _: &Position) -> bool {
        true
    }
}

/// A sphere that blocks any segment passing through it.
#[derive(Debug, Clone)]
pub struct Body {
    pub name: String,
    pub center: Position,
    pub radius_km: f64,
}

impl Body {
    /// Does the segment `a`–`b` pass strictly inside this body?
    pub fn blocks(&self, a: &Position, b: &Position) -> bool {
        let d = (b.x - a.x, b.y - a.y, b.z - a.z);
        let f = (a.x - self.center.x, a.y - self.center.y, a.z - self.center.z);
        let dd = d.0 * d.0 + d.1 * d.1 + d.2 * d.2;
        let t = if dd == 0.0 {
            0.0
        } else {
            (-(f.0 * d.0 + f.1 * d.1 + f.2 * d.2) / dd).clamp(0.0, 1.0)
        };
        let closest = Position::new(a.x + t * d.0, a.y + t * d.1, a.z + t * d.2);
        closest.distance_to(&self.center) < self.radius_km
    }
}

/// Spherical bodies plus an optional range limit.
#[derive(Debug, Clone, Default)]
pub struct BodyOcclusion {
    bodies: Vec<Body>,
    max_range_km: Option<f64>,
}

impl BodyOcclusion {
    pub fn new(bodies: Vec<Body>, max_range_km: Option<f64>) -> Self {
        Self {
            bodies,
            max_range_km,
        }
    }

    pub fn from_config(topology: &TopologyConfig) -> Self {
        let bodies = topology
            .bodies
            .iter()
            .map(|b| Body {
                name: b.name.clone(),
                center: Position::new(b.center[0], b.center[1], b.center[2]),
                radius_km: b.radius_km,
            })
            .collect();
        let max_range_km = (topology.max_range_km > 0.0).then_some(topology.max_range_km);
        Self::new(bodies, max_range_km)
    }
}

impl Occlusion for BodyOcclusion {
    fn line_of_sight(&self, _: &NodeId, from_pos: &Position, _: &NodeId, to_pos: &Position) -> bool {
        if let Some(max) = self.max_range_km {
            if from_pos.distance_to(to_pos) > max {
                return false;
            }
        }
        !self.bodies.iter().any(|b| b.blocks(from_pos, to_pos))
    }
}

/// Explicit directed visibility, adjustable at runtime.
///
/// Only pairs that were opened are visible. Useful for replaying a known
/// contact plan or scripting disruption.
#[derive(Debug, Default)]
pub struct ScriptedVisibility {
    open: RwLock<HashSet<(NodeId, NodeId)>>,
}

impl ScriptedVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `from → to` only.
    pub fn open(&self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        if let Ok(mut open) = self.open.write() {
            open.insert((from.into(), to.into()));
        }
    }

    /// Open both directions.
    pub fn open_both(&self, a: impl Into<NodeId>, b: impl Into<NodeId>) {
        let (a, b) = (a.into(), b.into());
        self.open(a.clone(), b.clone());
        self.open(b, a);
    }

    /// Close `from → to` only.
    pub fn close(&self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        if let Ok(mut open) = self.open.write() {
            open.remove(&(from.into(), to.into()));
        }
    }
}

impl Occlusion for ScriptedVisibility {
    fn line_of_sight(&self, from: &NodeId, _: &Position, to: &NodeId, _: &Position) -> bool {
        self.open
            .read()
            .map(|open| open.contains(&(from.clone(), to.clone())))
            .unwrap_or(false)
    }
}

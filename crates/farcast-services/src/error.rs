//! Engine error taxonomy.
//!
//! Only malformed input and collaborator contract violations are errors.
//! "No opportunity to send" (no route, no line of sight, failed attempt)
//! is a normal steady state and never surfaces here.

use farcast_core::{CryptoError, NodeId};
use thiserror::Error;

use crate::geometry::GeometryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
}

impl EngineError {
    /// True for errors caused by the caller's request rather than by the
    /// engine or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::UnknownNode(_) | EngineError::InvalidBundle(_))
    }
}

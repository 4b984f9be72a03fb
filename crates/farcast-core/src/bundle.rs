//! Bundle data model. A bundle is the unit of store-and-forward transfer.
//!
//! A bundle is created once at its source, carries its payload (possibly
//! ciphertext) across however many custody transfers it takes, and is
//! retired when it reaches its destination.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Bundles with a priority strictly above this value are encrypted
/// before they enter any store.
pub const ENCRYPTION_PRIORITY_THRESHOLD: u8 = 5;

/// Unix milliseconds.
pub type Timestamp = u64;

/// Opaque node identifier, e.g. "earth-gs" or "lunar-gateway".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hex-encoded bundle identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(String);

impl BundleId {
    /// Derive an id from the bundle's immutable creation fields.
    ///
    ///   id = BLAKE3(source || 0 || destination || 0 || created_at || seq || payload)[..16]
    ///
    /// `seq` is a per-engine counter, so two submissions with identical
    /// content in the same millisecond still get distinct ids.
    pub fn derive(
        source: &NodeId,
        destination: &NodeId,
        created_at: Timestamp,
        seq: u64,
        payload: &[u8],
    ) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(source.as_str().as_bytes());
        h.update(&[0]);
        h.update(destination.as_str().as_bytes());
        h.update(&[0]);
        h.update(&created_at.to_le_bytes());
        h.update(&seq.to_le_bytes());
        h.update(payload);
        Self(hex::encode(&h.finalize().as_bytes()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BundleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A bundle in custody of exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: BundleId,
    pub source: NodeId,
    pub destination: NodeId,
    /// Plaintext, or ciphertext when `encrypted` is set.
    pub payload: Bytes,
    pub creation_time: Timestamp,
    /// Plaintext length at creation. Used for buffer accounting and never
    /// updated after encryption.
    pub size: u64,
    pub priority: u8,
    /// Nodes visited so far. `path[0] == source`; one element is appended
    /// per successful custody transfer.
    pub path: Vec<NodeId>,
    /// Reserved for acknowledgement bundles. Always false for data bundles.
    pub is_ack: bool,
    pub encrypted: bool,
}

impl Bundle {
    /// Build a fresh data bundle at its source. The payload is stored as given;
    /// encryption is applied by the engine before the bundle is queued.
    pub fn new(
        id: BundleId,
        source: NodeId,
        destination: NodeId,
        payload: Bytes,
        priority: u8,
        creation_time: Timestamp,
    ) -> Self {
        let size = payload.len() as u64;
        Self {
            id,
            path: vec![source.clone()],
            source,
            destination,
            payload,
            creation_time,
            size,
            priority,
            is_ack: false,
            encrypted: false,
        }
    }

    /// Does this bundle's priority call for payload encryption?
    pub fn requires_encryption(&self) -> bool {
        self.priority > ENCRYPTION_PRIORITY_THRESHOLD
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            id: self.id.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            size: self.size,
            priority: self.priority,
            creation_time: self.creation_time,
            path: self.path.clone(),
            encrypted: self.encrypted,
        }
    }
}

/// Payload-free view of a queued bundle, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSummary {
    pub id: BundleId,
    pub source: NodeId,
    pub destination: NodeId,
    pub size: u64,
    pub priority: u8,
    pub creation_time: Timestamp,
    pub path: Vec<NodeId>,
    pub encrypted: bool,
}

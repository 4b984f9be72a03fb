//! farcast-core — shared data model, configuration, and payload cryptography.
//! All other Farcast crates depend on this one.

pub mod bundle;
pub mod config;
pub mod crypto;
pub mod link;

pub use bundle::{Bundle, BundleId, BundleSummary, NodeId, Timestamp, ENCRYPTION_PRIORITY_THRESHOLD};
pub use crypto::{CryptoError, NodeKeyring, PayloadCipher};
pub use link::{CommunicationLink, Position, RoutingEntry, SPEED_OF_LIGHT_KM_S};

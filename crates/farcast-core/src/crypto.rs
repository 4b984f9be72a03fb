//! Payload cryptography for high-priority bundles.
//!
//! Every node holds a static X25519 keypair. Two nodes share a pairwise
//! key derived from their Diffie-Hellman secret:
//!
//!   key = BLAKE3-derive_key("farcast bundle payload v1", X25519(local, peer))
//!
//! The derivation is symmetric, so the source can seal for the destination
//! and the destination can open using the source as its peer. Payloads are
//! sealed with ChaCha20-Poly1305 under a fresh random nonce:
//!
//!   sealed = nonce (12) || ciphertext || tag (16)
//!
//! Derived keys are wrapped in `Zeroizing` and wiped when dropped.

use std::collections::HashMap;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::bundle::NodeId;

const KDF_CONTEXT: &str = "farcast bundle payload v1";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt/decrypt capability consumed by the engine.
///
/// `local` is the node performing the operation, `peer` the other end of the
/// pairwise channel. The engine seals at acceptance with
/// `(source, destination)` and opens at final delivery with
/// `(destination, source)`.
pub trait PayloadCipher: Send + Sync {
    fn encrypt(&self, local: &NodeId, peer: &NodeId, plaintext: &[u8])
        -> Result<Vec<u8>, CryptoError>;

    fn decrypt(&self, local: &NodeId, peer: &NodeId, sealed: &[u8])
        -> Result<Vec<u8>, CryptoError>;
}

struct NodeKey {
    secret: StaticSecret,
    public: PublicKey,
}

/// Static X25519 keys for every known node, generated in-process at startup.
pub struct NodeKeyring {
    keys: HashMap<NodeId, NodeKey>,
}

impl NodeKeyring {
    /// Generate a fresh keypair for each node.
    pub fn generate<'a>(nodes: impl IntoIterator<Item = &'a NodeId>) -> Self {
        let keys = nodes
            .into_iter()
            .map(|node| {
                let secret = StaticSecret::random_from_rng(rand::thread_rng());
                let public = PublicKey::from(&secret);
                (node.clone(), NodeKey { secret, public })
            })
            .collect();
        Self { keys }
    }

    /// Public key of a node, if known.
    pub fn public_key(&self, node: &NodeId) -> Option<[u8; 32]> {
        self.keys.get(node).map(|k| *k.public.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn cipher_for(&self, local: &NodeId, peer: &NodeId) -> Result<ChaCha20Poly1305, CryptoError> {
        let local_key = self
            .keys
            .get(local)
            .ok_or_else(|| CryptoError::UnknownNode(local.clone()))?;
        let peer_key = self
            .keys
            .get(peer)
            .ok_or_else(|| CryptoError::UnknownNode(peer.clone()))?;

        let shared = local_key.secret.diffie_hellman(&peer_key.public);
        let key = Zeroizing::new(blake3::derive_key(KDF_CONTEXT, shared.as_bytes()));
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key[..])))
    }
}

impl PayloadCipher for NodeKeyring {
    fn encrypt(
        &self,
        local: &NodeId,
        peer: &NodeId,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = self.cipher_for(local, peer)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::SealFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, local: &NodeId, peer: &NodeId, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated(sealed.len()));
        }
        let cipher = self.cipher_for(local, peer)?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::OpenFailed)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key material for node {0}")]
    UnknownNode(NodeId),
    #[error("sealed payload too short: {0} bytes")]
    Truncated(usize),
    #[error("payload encryption failed")]
    SealFailed,
    #[error("payload authentication failed")]
    OpenFailed,
}

//! Hashlock pre-image generation and lock hash calculation
//!
//! The lock is `sha256(pre_image)` over the raw 32 bytes, hex encoded with a
//! `0x` prefix. This is the format the channel network's hashlock transfer
//! definition checks on resolve.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random 32-byte secret that unlocks a hashlock transfer.
///
/// The bytes are wiped on drop and never printed by `Debug`/`Display`.
/// Use [`PreImage::expose_hex`] only when handing the secret to the node
/// in the resolve call.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PreImage([u8; 32]);

impl PreImage {
    /// Generates a fresh pre-image from the OS random source.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a `0x`-prefixed (or bare) 64 character hex string.
    pub fn from_hex(value: &str) -> anyhow::Result<Self> {
        Ok(Self(decode_bytes32(value)?))
    }

    /// Hex encoding of the secret, `0x`-prefixed.
    pub fn expose_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn lock_hash(&self) -> LockHash {
        let digest = Sha256::digest(self.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        LockHash(out)
    }

    /// Whether this pre-image unlocks `lock`.
    pub fn unlocks(&self, lock: &LockHash) -> bool {
        self.lock_hash() == *lock
    }
}

impl fmt::Debug for PreImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreImage").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for PreImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// `sha256` of a [`PreImage`]. Safe to share and log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockHash([u8; 32]);

impl LockHash {
    pub fn from_hex(value: &str) -> anyhow::Result<Self> {
        Ok(Self(decode_bytes32(value)?))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for LockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn decode_bytes32(value: &str) -> anyhow::Result<[u8; 32]> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped).map_err(|_| anyhow::anyhow!("Invalid hex bytes32"))?;
    if bytes.len() != 32 {
        anyhow::bail!("Invalid bytes32 length: expected 32 bytes, got {}", bytes.len());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

//! Cryptographic helpers
//!
//! Hashlock secret generation and lock hashing for conditional transfers.

pub mod hashlock;

// Re-export for convenience
pub use hashlock::{LockHash, PreImage};

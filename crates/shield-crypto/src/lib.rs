//! # Shield Cryptography
//!
//! Primitives the bridge verifiers build on:
//! - Keccak-256 for EVM trie nodes and event topics
//! - BLAKE3 for bridge-internal digests
//! - RLP item access and Merkle-Patricia inclusion proofs
//!
//! | Function | Algorithm |
//! |----------|-----------|
//! | Trie nodes, topics | Keccak-256 |
//! | Internal digests | BLAKE3 |
//! | Receipt inclusion | MPT proof walk |

pub mod error;
pub mod hash;
pub mod rlp;
pub mod trie;

pub use error::*;
pub use hash::*;
pub use trie::{verify_proof, to_nibbles};

#[cfg(any(test, feature = "test-utils"))]
pub use trie::testing;

/// Cryptographic prelude
pub mod prelude {
    pub use crate::error::{Result, TrieError};
    pub use crate::hash::{event_topic, hash_blake3, keccak256};
    pub use crate::trie::verify_proof;
}

//! Proof verification error types

use thiserror::Error;

/// Result type for proof operations
pub type Result<T> = std::result::Result<T, TrieError>;

/// Errors raised while walking a Merkle-Patricia proof
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// A node referenced by hash is not in the proof set
    #[error("Missing proof node: {0}")]
    MissingNode(String),

    /// A node is not a valid branch, extension or leaf
    #[error("Invalid trie node: {0}")]
    InvalidNode(String),

    /// The proof is well formed but proves absence of the key
    #[error("Key not present in trie")]
    KeyNotFound,

    /// RLP decoding failed
    #[error("RLP error: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}

impl TrieError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::MissingNode(_) => 5001,
            Self::InvalidNode(_) => 5002,
            Self::KeyNotFound => 5003,
            Self::Rlp(_) => 5004,
        }
    }
}

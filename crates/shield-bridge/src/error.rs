//! Bridge error types
//!
//! Every verification failure is final for the proof that produced it.

use shield_core::CoreError;
use shield_crypto::TrieError;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Errors raised by the oracle clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// No host is configured
    #[error("No oracle hosts configured")]
    NoHosts,

    /// HTTP transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something unparseable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Every configured host failed; holds the last failure
    #[error("All {hosts} hosts failed, last error: {last}")]
    AllHostsFailed { hosts: usize, last: String },
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Proof verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    // === Chain State ===
    /// Header unknown or not on the canonical chain
    #[error("External block {0} is not on the canonical chain")]
    ExternalChainForked(String),

    /// Header is not deep enough below the chain head
    #[error("Block {block_number} has too few confirmations: head {head}, required {required}")]
    InsufficientConfirmations { block_number: u64, head: u64, required: u64 },

    // === Proof & Receipt ===
    /// Proof nodes do not lead from the receipts root to the transaction
    #[error("Invalid inclusion proof: {0}")]
    InvalidInclusionProof(String),

    /// Receipt or instruction payload cannot be decoded
    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    /// The external transaction did not succeed
    #[error("External transaction reverted")]
    ExternalTxReverted,

    /// No log or instruction from the expected contract
    #[error("Expected event not found: {0}")]
    EventNotFound(String),

    /// Amount does not fit the internal representation
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    // === Request ===
    /// No parameters are configured for the network
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Request failed a structural check before verification
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Oracle could not be queried
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

impl VerifyError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::ExternalChainForked(_) => 3001,
            Self::InsufficientConfirmations { .. } => 3002,
            Self::InvalidInclusionProof(_) => 3003,
            Self::MalformedReceipt(_) => 3004,
            Self::ExternalTxReverted => 3005,
            Self::EventNotFound(_) => 3006,
            Self::AmountOutOfRange(_) => 3007,
            Self::UnknownNetwork(_) | Self::InvalidRequest(_) => 3008,
            Self::Oracle(_) => 3009,
        }
    }

    /// Whether resubmitting the same proof later could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientConfirmations { .. } | Self::Oracle(_))
    }
}

impl From<TrieError> for VerifyError {
    fn from(err: TrieError) -> Self {
        Self::InvalidInclusionProof(err.to_string())
    }
}

impl From<CoreError> for VerifyError {
    fn from(err: CoreError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

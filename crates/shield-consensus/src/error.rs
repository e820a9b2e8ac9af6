//! Error types for instruction matching and block validation

use shield_core::CoreError;
use thiserror::Error;

/// Result type alias for consensus operations
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors raised while matching a response against the instruction ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    // === Matching ===
    /// No unconsumed instruction authorizes the claim
    #[error("No matching instruction for request {0}")]
    NoMatchingInstruction(String),

    /// The instruction at this index was already consumed in this pass
    #[error("Instruction {0} already consumed")]
    InstructionAlreadyConsumed(usize),

    /// Index is past the end of the ledger
    #[error("Instruction index {index} out of range for ledger of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The only candidate instruction could not be decoded
    #[error("Instruction {index} could not be decoded: {source}")]
    Decode {
        index: usize,
        #[source]
        source: CoreError,
    },

    // === Transaction Shape ===
    /// The transaction does not mint anything
    #[error("Transaction is not a mint: {0}")]
    NotAMint(String),

    /// A response transaction spends inputs
    #[error("Response of kind {0} must not spend inputs")]
    UnexpectedInputs(u16),
}

impl MatchError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::NoMatchingInstruction(_) => 4001,
            Self::InstructionAlreadyConsumed(_) => 4002,
            Self::IndexOutOfRange { .. } => 4003,
            Self::Decode { .. } => 4004,
            Self::NotAMint(_) => 4005,
            Self::UnexpectedInputs(_) => 4006,
        }
    }
}

/// A block was rejected; nothing of its ledger survives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Block rejected at transaction {position}: {source}")]
pub struct BlockError {
    /// Position of the offending transaction in the block
    pub position: usize,
    #[source]
    pub source: MatchError,
}

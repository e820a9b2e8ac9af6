//! Error types for shield core operations

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing wire values or decoding instruction content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Wire Format ===
    /// Instruction tuple has the wrong number of fields
    #[error("Instruction must have 4 fields, got {0}")]
    InvalidWireLength(usize),

    /// Meta type field is not an integer
    #[error("Invalid meta type: {0}")]
    InvalidMetaType(String),

    /// Meta type tag is not known to this node
    #[error("Unknown meta type tag: {0}")]
    UnknownMetaType(u16),

    /// Shard id field is not a valid shard
    #[error("Invalid shard id: {0}")]
    InvalidShard(String),

    /// Status discriminator does not select a content variant
    #[error("Unknown instruction status: {0}")]
    UnknownStatus(String),

    // === Content Decoding ===
    /// Content is not valid base64
    #[error("Base64 decoding failed: {0}")]
    Base64(String),

    /// Content bytes do not match the selected variant layout
    #[error("Content decoding failed: {0}")]
    Json(String),

    /// Hex string could not be decoded
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Fixed-size value has the wrong length
    #[error("Invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    // === Metadata ===
    /// Request metadata failed a sanity check
    #[error("Sanity check failed: {0}")]
    Sanity(String),
}

impl CoreError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidWireLength(_) | Self::InvalidMetaType(_) | Self::InvalidShard(_) => 2001,
            Self::UnknownMetaType(_) | Self::UnknownStatus(_) => 2002,
            Self::Base64(_) | Self::Json(_) => 2003,
            Self::InvalidHex(_) | Self::InvalidLength { .. } => 2004,
            Self::Sanity(_) => 2005,
        }
    }

    /// Whether the error came from decoding bytes, as opposed to a rule violation
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, Self::Sanity(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

impl From<hex::FromHexError> for CoreError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

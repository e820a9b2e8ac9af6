//! Beacon instruction wire type
//!
//! On the wire an instruction is the string 4-tuple
//! `[metaType, shardID, status, content]` where `content` is base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::meta::MetaType;
use crate::types::ShardId;

/// Status discriminator selecting the content variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionStatus {
    Accepted,
    Rejected,
    Refund,
}

impl InstructionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "refund" => Ok(Self::Refund),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a block's instruction list
///
/// Meta type and status are kept raw: instruction lists mix kinds owned by
/// unrelated subsystems, and those must survive parsing untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub meta_type: u16,
    pub shard_id: ShardId,
    pub status: String,
    /// Base64 of the canonical content bytes
    pub content: String,
}

impl Instruction {
    /// Build an instruction from already-encoded content bytes
    pub fn new(meta_type: MetaType, shard_id: ShardId, status: InstructionStatus, content: &[u8]) -> Self {
        Self {
            meta_type: meta_type.as_u16(),
            shard_id,
            status: status.as_str().to_string(),
            content: BASE64.encode(content),
        }
    }

    /// Known meta kind, if any
    pub fn meta(&self) -> Option<MetaType> {
        MetaType::from_u16(self.meta_type)
    }

    /// Parsed status discriminator
    pub fn status(&self) -> Result<InstructionStatus> {
        InstructionStatus::parse(&self.status)
    }

    /// Decoded content bytes
    pub fn content_bytes(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.content)?)
    }

    /// Wire form
    pub fn to_string_slice(&self) -> [String; 4] {
        [
            self.meta_type.to_string(),
            self.shard_id.to_string(),
            self.status.clone(),
            self.content.clone(),
        ]
    }

    /// Parse the wire form
    pub fn from_string_slice<S: AsRef<str>>(fields: &[S]) -> Result<Self> {
        if fields.len() != 4 {
            return Err(CoreError::InvalidWireLength(fields.len()));
        }
        let meta = fields[0].as_ref();
        let meta_type = meta
            .parse::<u16>()
            .map_err(|_| CoreError::InvalidMetaType(meta.to_string()))?;
        Ok(Self {
            meta_type,
            shard_id: ShardId::parse(fields[1].as_ref())?,
            status: fields[2].as_ref().to_string(),
            content: fields[3].as_ref().to_string(),
        })
    }
}

impl Serialize for Instruction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_string_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Instruction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = Vec::<String>::deserialize(deserializer)?;
        Self::from_string_slice(&fields).map_err(serde::de::Error::custom)
    }
}

//! # Instruction Codec
//!
//! Canonical encoding of instruction content. Every variant is a plain struct
//! serialized with serde_json in declaration order, so equal content always
//! yields equal bytes on every node. The variant is never inferred from the
//! bytes; the instruction's status discriminator selects it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::instruction::{Instruction, InstructionStatus};
use crate::meta::MetaType;
use crate::types::{ExternalTokenId, ReceiverDescriptor, ShardId, TokenId, TxHash, UniquenessToken};

/// Content of an accepted request: authorizes one mint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AcceptedContent {
    pub request_tx_id: TxHash,
    /// Shard of the receiver
    pub shard_id: ShardId,
    pub receiver: ReceiverDescriptor,
    pub token_id: TokenId,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniqueness_token: Option<UniquenessToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token_id: Option<ExternalTokenId>,
}

/// Content of a rejected request: authorizes nothing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RejectedContent {
    pub request_tx_id: TxHash,
    pub shard_id: ShardId,
    pub error_code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Content of a refund: authorizes returning value to the requester
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefundedContent {
    pub request_tx_id: TxHash,
    pub shard_id: ShardId,
    pub receiver: ReceiverDescriptor,
    pub token_id: TokenId,
    pub amount: u64,
}

/// Closed set of content variants
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionContent {
    Accepted(AcceptedContent),
    Rejected(RejectedContent),
    Refunded(RefundedContent),
}

impl InstructionContent {
    pub fn status(&self) -> InstructionStatus {
        match self {
            Self::Accepted(_) => InstructionStatus::Accepted,
            Self::Rejected(_) => InstructionStatus::Rejected,
            Self::Refunded(_) => InstructionStatus::Refund,
        }
    }

    pub fn request_tx_id(&self) -> &TxHash {
        match self {
            Self::Accepted(c) => &c.request_tx_id,
            Self::Rejected(c) => &c.request_tx_id,
            Self::Refunded(c) => &c.request_tx_id,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        match self {
            Self::Accepted(c) => c.shard_id,
            Self::Rejected(c) => c.shard_id,
            Self::Refunded(c) => c.shard_id,
        }
    }
}

/// Canonical encoder/decoder for instruction content
pub struct InstructionCodec;

impl InstructionCodec {
    /// Canonical bytes of a content value
    pub fn encode(content: &InstructionContent) -> Result<Vec<u8>> {
        let bytes = match content {
            InstructionContent::Accepted(c) => serde_json::to_vec(c)?,
            InstructionContent::Rejected(c) => serde_json::to_vec(c)?,
            InstructionContent::Refunded(c) => serde_json::to_vec(c)?,
        };
        Ok(bytes)
    }

    /// Decode bytes as the variant selected by `status`
    pub fn decode(status: InstructionStatus, bytes: &[u8]) -> Result<InstructionContent> {
        Ok(match status {
            InstructionStatus::Accepted => InstructionContent::Accepted(from_bytes(bytes)?),
            InstructionStatus::Rejected => InstructionContent::Rejected(from_bytes(bytes)?),
            InstructionStatus::Refund => InstructionContent::Refunded(from_bytes(bytes)?),
        })
    }

    /// Wrap content into an instruction of the given kind
    pub fn to_instruction(meta_type: MetaType, shard_id: ShardId, content: &InstructionContent) -> Result<Instruction> {
        let bytes = Self::encode(content)?;
        Ok(Instruction::new(meta_type, shard_id, content.status(), &bytes))
    }

    /// Decode the content carried by an instruction
    pub fn from_instruction(instruction: &Instruction) -> Result<InstructionContent> {
        let status = instruction.status()?;
        let bytes = instruction.content_bytes()?;
        Self::decode(status, &bytes)
    }
}

fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Shard-to-beacon action carrying a request for the beacon to process
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAction<M> {
    pub meta: M,
    pub tx_req_id: TxHash,
    pub shard_id: ShardId,
}

impl<M: Serialize + DeserializeOwned> RequestAction<M> {
    /// Wire form `[metaType, base64(content)]`
    pub fn to_action(&self, meta_type: MetaType) -> Result<[String; 2]> {
        let bytes = serde_json::to_vec(self)?;
        Ok([meta_type.as_u16().to_string(), BASE64.encode(bytes)])
    }

    /// Parse the wire form, checking the tag against the expected kind
    pub fn from_action<S: AsRef<str>>(action: &[S], expected: MetaType) -> Result<Self> {
        if action.len() != 2 {
            return Err(CoreError::InvalidWireLength(action.len()));
        }
        let meta_type = MetaType::parse(action[0].as_ref())?;
        if meta_type != expected {
            return Err(CoreError::UnknownMetaType(meta_type.as_u16()));
        }
        let bytes = BASE64.decode(action[1].as_ref())?;
        from_bytes(&bytes)
    }
}

//! Transaction metadata for shielding requests and their mint responses
//!
//! Every payload holds a [`MetadataBase`] alongside its own fields.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::meta::MetaType;
use crate::types::{constants, ExternalTokenId, Hash, Signature, StealthNonce, TokenId, TxHash, UniquenessToken};

/// Fields shared by every metadata payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBase {
    #[serde(rename = "type")]
    pub meta_type: MetaType,
    #[serde(default)]
    pub signature: Signature,
}

impl MetadataBase {
    pub fn new(meta_type: MetaType) -> Self {
        Self {
            meta_type,
            signature: Signature::default(),
        }
    }
}

/// Request to shield a deposit proven by an EVM receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuingEvmRequest {
    #[serde(flatten)]
    pub base: MetadataBase,
    /// Hash of the external block holding the deposit
    pub block_hash: Hash,
    pub tx_index: u64,
    /// Base64 trie proof nodes
    pub proof_strs: Vec<String>,
    pub inc_token_id: TokenId,
    /// Network id of the bridge, for aggregated requests
    #[serde(default)]
    pub network_id: Option<u8>,
}

impl IssuingEvmRequest {
    /// Cheap structural checks run before any oracle I/O
    pub fn validate_sanity(&self) -> Result<()> {
        if !self.base.meta_type.is_evm_shield_request() {
            return Err(CoreError::Sanity(format!(
                "meta type {} is not an EVM shielding request",
                self.base.meta_type
            )));
        }
        if self.proof_strs.is_empty() {
            return Err(CoreError::Sanity("proofs must not be empty".into()));
        }
        if self.block_hash.is_zero() {
            return Err(CoreError::Sanity("block hash must not be zero".into()));
        }
        if self.inc_token_id == constants::PRV_TOKEN_ID {
            return Err(CoreError::Sanity("bridge cannot mint PRV".into()));
        }
        Ok(())
    }

    /// `block_hash || ascii(tx_index)`
    pub fn uniqueness_token(&self) -> UniquenessToken {
        evm_uniqueness_token(&self.block_hash, self.tx_index)
    }
}

/// Uniqueness token for an EVM deposit
pub fn evm_uniqueness_token(block_hash: &Hash, tx_index: u64) -> UniquenessToken {
    let mut bytes = block_hash.as_bytes().to_vec();
    bytes.extend_from_slice(tx_index.to_string().as_bytes());
    UniquenessToken::new(bytes)
}

/// Request to shield a deposit on the RPC-trust chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuingSolanaRequest {
    #[serde(flatten)]
    pub base: MetadataBase,
    pub tx_signature: String,
    pub inc_token_id: TokenId,
}

impl IssuingSolanaRequest {
    pub fn validate_sanity(&self) -> Result<()> {
        if self.base.meta_type != MetaType::IssuingSolanaRequest {
            return Err(CoreError::Sanity(format!("unexpected meta type {}", self.base.meta_type)));
        }
        if self.tx_signature.is_empty() {
            return Err(CoreError::Sanity("transaction signature must not be empty".into()));
        }
        if self.inc_token_id == constants::PRV_TOKEN_ID {
            return Err(CoreError::Sanity("bridge cannot mint PRV".into()));
        }
        Ok(())
    }

    pub fn uniqueness_token(&self) -> UniquenessToken {
        UniquenessToken::new(self.tx_signature.as_bytes().to_vec())
    }
}

/// Request to shield an Aurora deposit named by its transaction hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuingAuroraRequest {
    #[serde(flatten)]
    pub base: MetadataBase,
    pub tx_hash: Hash,
    pub inc_token_id: TokenId,
}

impl IssuingAuroraRequest {
    pub fn validate_sanity(&self) -> Result<()> {
        if self.base.meta_type != MetaType::IssuingAuroraRequest {
            return Err(CoreError::Sanity(format!("unexpected meta type {}", self.base.meta_type)));
        }
        if self.tx_hash.is_zero() {
            return Err(CoreError::Sanity("transaction hash must not be zero".into()));
        }
        if self.inc_token_id == constants::PRV_TOKEN_ID {
            return Err(CoreError::Sanity("bridge cannot mint PRV".into()));
        }
        Ok(())
    }
}

/// Request to shield a deposit made to the NEAR (Wasm) vault contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuingWasmRequest {
    #[serde(flatten)]
    pub base: MetadataBase,
    /// Base58 NEAR transaction hash
    pub tx_hash: String,
    pub inc_token_id: TokenId,
}

impl IssuingWasmRequest {
    pub fn validate_sanity(&self) -> Result<()> {
        if self.base.meta_type != MetaType::IssuingNearRequest {
            return Err(CoreError::Sanity(format!("unexpected meta type {}", self.base.meta_type)));
        }
        if self.tx_hash.is_empty() {
            return Err(CoreError::Sanity("transaction hash must not be empty".into()));
        }
        if self.inc_token_id == constants::PRV_TOKEN_ID {
            return Err(CoreError::Sanity("bridge cannot mint PRV".into()));
        }
        Ok(())
    }
}

/// Metadata of a mint transaction answering an earlier request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(flatten)]
    pub base: MetadataBase,
    pub request_tx_id: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniqueness_token: Option<UniquenessToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_token_id: Option<ExternalTokenId>,
    /// Set once the minted coin is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_random: Option<StealthNonce>,
}

impl ResponseMetadata {
    pub fn new(meta_type: MetaType, request_tx_id: TxHash) -> Self {
        Self {
            base: MetadataBase::new(meta_type),
            request_tx_id,
            uniqueness_token: None,
            external_token_id: None,
            shared_random: None,
        }
    }

    pub fn with_uniqueness_token(mut self, token: UniquenessToken) -> Self {
        self.uniqueness_token = Some(token);
        self
    }

    pub fn with_external_token_id(mut self, token: ExternalTokenId) -> Self {
        self.external_token_id = Some(token);
        self
    }

    pub fn set_shared_random(&mut self, nonce: StealthNonce) {
        self.shared_random = Some(nonce);
    }
}

/// Closed set of modeled metadata payloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Metadata {
    IssuingEvmRequest(IssuingEvmRequest),
    IssuingAuroraRequest(IssuingAuroraRequest),
    IssuingWasmRequest(IssuingWasmRequest),
    IssuingSolanaRequest(IssuingSolanaRequest),
    Response(ResponseMetadata),
}

impl Metadata {
    pub fn base(&self) -> &MetadataBase {
        match self {
            Self::IssuingEvmRequest(m) => &m.base,
            Self::IssuingAuroraRequest(m) => &m.base,
            Self::IssuingWasmRequest(m) => &m.base,
            Self::IssuingSolanaRequest(m) => &m.base,
            Self::Response(m) => &m.base,
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.base().meta_type
    }

    /// Parse a JSON payload, selecting the layout by its `type` tag
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        #[derive(Deserialize)]
        struct Tag {
            #[serde(rename = "type")]
            meta_type: MetaType,
        }
        let tag: Tag = serde_json::from_slice(bytes)?;
        if tag.meta_type.is_evm_shield_request() {
            Ok(Self::IssuingEvmRequest(serde_json::from_slice(bytes)?))
        } else if tag.meta_type == MetaType::IssuingAuroraRequest {
            Ok(Self::IssuingAuroraRequest(serde_json::from_slice(bytes)?))
        } else if tag.meta_type == MetaType::IssuingNearRequest {
            Ok(Self::IssuingWasmRequest(serde_json::from_slice(bytes)?))
        } else if tag.meta_type == MetaType::IssuingSolanaRequest {
            Ok(Self::IssuingSolanaRequest(serde_json::from_slice(bytes)?))
        } else if tag.meta_type.is_response() {
            Ok(Self::Response(serde_json::from_slice(bytes)?))
        } else {
            Err(CoreError::UnknownMetaType(tag.meta_type.as_u16()))
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Self::IssuingEvmRequest(m) => serde_json::to_vec(m)?,
            Self::IssuingAuroraRequest(m) => serde_json::to_vec(m)?,
            Self::IssuingWasmRequest(m) => serde_json::to_vec(m)?,
            Self::IssuingSolanaRequest(m) => serde_json::to_vec(m)?,
            Self::Response(m) => serde_json::to_vec(m)?,
        })
    }
}

//! Mint descriptors and the collaborator that checks them
//!
//! The coin-commitment scheme stays outside this crate. A response
//! transaction is seen through [`MintTransaction`], and the value it mints is
//! compared to an instruction through [`MintDescriptorValidator`].

use serde::{Deserialize, Serialize};
use shield_core::{
    MetaType, ReceiverDescriptor, ResponseMetadata, ShardId, StealthNonce, TokenId, TxHash, UniquenessToken,
};

use crate::error::{MatchError, Result};

/// Value a mint commits to, or that an instruction authorizes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintDescriptor {
    pub recipient: ReceiverDescriptor,
    pub token_id: TokenId,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth_nonce: Option<StealthNonce>,
}

impl MintDescriptor {
    pub fn new(recipient: ReceiverDescriptor, token_id: TokenId, amount: u64) -> Self {
        Self {
            recipient,
            token_id,
            amount,
            stealth_nonce: None,
        }
    }

    pub fn with_stealth_nonce(mut self, nonce: StealthNonce) -> Self {
        self.stealth_nonce = Some(nonce);
        self
    }
}

/// Decides whether a claimed mint is exactly what an instruction authorized
pub trait MintDescriptorValidator {
    fn check(&self, authorized: &MintDescriptor, claimed: &MintDescriptor) -> bool;
}

/// Opens a minted coin against its stealth nonce
pub trait StealthOpener {
    fn opens(&self, recipient: &ReceiverDescriptor, nonce: &StealthNonce) -> bool;
}

/// Exact comparison of recipient, token and amount; nonces go to the opener
#[derive(Clone, Debug, Default)]
pub struct ExactMintValidator<O> {
    opener: O,
}

impl<O: StealthOpener> ExactMintValidator<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }
}

impl<O: StealthOpener> MintDescriptorValidator for ExactMintValidator<O> {
    fn check(&self, authorized: &MintDescriptor, claimed: &MintDescriptor) -> bool {
        authorized.recipient == claimed.recipient
            && authorized.token_id == claimed.token_id
            && authorized.amount == claimed.amount
            && claimed
                .stealth_nonce
                .as_ref()
                .map_or(true, |nonce| self.opener.opens(&claimed.recipient, nonce))
    }
}

/// Response transaction as seen by the matcher
pub trait MintTransaction {
    fn meta_type(&self) -> MetaType;

    /// Shard the transaction was proposed in
    fn shard_id(&self) -> ShardId;

    fn response_metadata(&self) -> Option<&ResponseMetadata>;

    fn has_inputs(&self) -> bool;

    fn is_mint_transaction(&self) -> bool;

    fn minted_token_id(&self) -> Option<TokenId>;

    fn minted_amount(&self) -> Option<u64>;

    fn mint_descriptor(&self) -> Option<MintDescriptor>;
}

/// Decoded intent of a proposed mint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseClaim {
    pub request_tx_id: TxHash,
    pub shard_id: ShardId,
    pub uniqueness_token: Option<UniquenessToken>,
    pub mint: MintDescriptor,
}

impl ResponseClaim {
    /// Claim made by a response transaction.
    ///
    /// The stealth nonce comes from the mint itself, falling back to the
    /// metadata's shared random.
    pub fn from_transaction<T: MintTransaction + ?Sized>(tx: &T) -> Result<Self> {
        if !tx.is_mint_transaction() {
            return Err(MatchError::NotAMint(format!("kind {}", tx.meta_type())));
        }
        let meta = tx
            .response_metadata()
            .ok_or_else(|| MatchError::NotAMint("missing response metadata".into()))?;
        let mut mint = tx
            .mint_descriptor()
            .ok_or_else(|| MatchError::NotAMint("missing mint output".into()))?;
        if mint.stealth_nonce.is_none() {
            mint.stealth_nonce = meta.shared_random;
        }
        Ok(Self {
            request_tx_id: meta.request_tx_id,
            shard_id: tx.shard_id(),
            uniqueness_token: meta.uniqueness_token.clone(),
            mint,
        })
    }
}

/// Plain response transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseTransaction {
    pub metadata: ResponseMetadata,
    pub shard_id: ShardId,
    /// Number of spent inputs
    pub inputs: usize,
    pub mint: Option<MintDescriptor>,
}

impl ResponseTransaction {
    pub fn new(metadata: ResponseMetadata, shard_id: ShardId, mint: MintDescriptor) -> Self {
        Self {
            metadata,
            shard_id,
            inputs: 0,
            mint: Some(mint),
        }
    }
}

impl MintTransaction for ResponseTransaction {
    fn meta_type(&self) -> MetaType {
        self.metadata.base.meta_type
    }

    fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    fn response_metadata(&self) -> Option<&ResponseMetadata> {
        Some(&self.metadata)
    }

    fn has_inputs(&self) -> bool {
        self.inputs > 0
    }

    fn is_mint_transaction(&self) -> bool {
        self.mint.is_some() && self.metadata.base.meta_type.is_response()
    }

    fn minted_token_id(&self) -> Option<TokenId> {
        self.mint.as_ref().map(|m| m.token_id)
    }

    fn minted_amount(&self) -> Option<u64> {
        self.mint.as_ref().map(|m| m.amount)
    }

    fn mint_descriptor(&self) -> Option<MintDescriptor> {
        self.mint.clone()
    }
}

//! # Shield Instruction Builder
//!
//! Turns a verified shielding request into beacon instructions. A request
//! either yields one accepted instruction per shield event, or a single
//! rejected instruction; it never yields a mix.
//!
//! Before accepting, the builder rejects:
//! - deposits whose uniqueness token was minted in an earlier block or is
//!   already used earlier in the current block;
//! - token pairs that contradict a known external↔internal pair;
//! - requests to mint PRV.
//!
//! Accepted instructions go to the receiver's shard, rejected ones to the
//! shard of the request.

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use shield_core::codec::{AcceptedContent, RejectedContent};
use shield_core::{
    constants, CoreError, ExternalTokenId, Instruction, InstructionCodec, InstructionContent, IssuingAuroraRequest,
    IssuingEvmRequest, IssuingSolanaRequest, IssuingWasmRequest, MetaType, ShardId, TokenId, TxHash,
    UniquenessToken,
};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Span};

use crate::common::DecodedReceipt;
use crate::error::VerifyError;
use crate::events::ShieldEvent;

// === Collaborators ===

/// Uniqueness tokens already minted in committed blocks
pub trait IssuedTokenStore: Send + Sync {
    fn is_issued(&self, token: &UniquenessToken) -> bool;

    fn mark_issued(&self, token: UniquenessToken);
}

/// Committed external↔internal token pairs
pub trait TokenPairStore: Send + Sync {
    fn internal_for(&self, external: &ExternalTokenId) -> Option<TokenId>;

    fn external_for(&self, internal: &TokenId) -> Option<ExternalTokenId>;

    fn insert_pair(&self, external: ExternalTokenId, internal: TokenId);
}

/// Maps a shield's receiver to the shard holding its coins
pub trait ShardResolver: Send + Sync {
    fn shard_of(&self, event: &ShieldEvent) -> ShardId;
}

/// Shard = last byte of the receiver modulo the shard count. For one-time
/// receivers the byte is the last of the OTA public key.
#[derive(Clone, Copy, Debug)]
pub struct LastByteShardResolver {
    num_shards: u8,
}

impl LastByteShardResolver {
    pub fn new(num_shards: u8) -> Self {
        Self {
            num_shards: num_shards.max(1),
        }
    }
}

impl ShardResolver for LastByteShardResolver {
    fn shard_of(&self, event: &ShieldEvent) -> ShardId {
        ShardId(event.shard_byte().unwrap_or(0) % self.num_shards)
    }
}

/// In-memory bridge state
#[derive(Default)]
pub struct MemoryBridgeStore {
    issued: RwLock<HashSet<UniquenessToken>>,
    pairs: RwLock<HashMap<ExternalTokenId, TokenId>>,
}

impl MemoryBridgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IssuedTokenStore for MemoryBridgeStore {
    fn is_issued(&self, token: &UniquenessToken) -> bool {
        self.issued.read().contains(token)
    }

    fn mark_issued(&self, token: UniquenessToken) {
        self.issued.write().insert(token);
    }
}

impl TokenPairStore for MemoryBridgeStore {
    fn internal_for(&self, external: &ExternalTokenId) -> Option<TokenId> {
        self.pairs.read().get(external).copied()
    }

    fn external_for(&self, internal: &TokenId) -> Option<ExternalTokenId> {
        self.pairs
            .read()
            .iter()
            .find(|(_, id)| *id == internal)
            .map(|(ext, _)| ext.clone())
    }

    fn insert_pair(&self, external: ExternalTokenId, internal: TokenId) {
        self.pairs.write().insert(external, internal);
    }
}

// === Requests ===

/// The parts of a shielding request the builder needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldRequest {
    pub tx_id: TxHash,
    pub shard_id: ShardId,
    pub meta_type: MetaType,
    pub inc_token_id: TokenId,
}

impl ShieldRequest {
    pub fn evm(tx_id: TxHash, shard_id: ShardId, request: &IssuingEvmRequest) -> Self {
        Self {
            tx_id,
            shard_id,
            meta_type: request.base.meta_type,
            inc_token_id: request.inc_token_id,
        }
    }

    pub fn solana(tx_id: TxHash, shard_id: ShardId, request: &IssuingSolanaRequest) -> Self {
        Self {
            tx_id,
            shard_id,
            meta_type: request.base.meta_type,
            inc_token_id: request.inc_token_id,
        }
    }

    pub fn aurora(tx_id: TxHash, shard_id: ShardId, request: &IssuingAuroraRequest) -> Self {
        Self {
            tx_id,
            shard_id,
            meta_type: request.base.meta_type,
            inc_token_id: request.inc_token_id,
        }
    }

    pub fn wasm(tx_id: TxHash, shard_id: ShardId, request: &IssuingWasmRequest) -> Self {
        Self {
            tx_id,
            shard_id,
            meta_type: request.base.meta_type,
            inc_token_id: request.inc_token_id,
        }
    }
}

/// Why a request was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Deposit already shielded")]
    AlreadyShielded,

    #[error("Token pair mismatch: {0}")]
    TokenPairMismatch(String),

    #[error("The bridge cannot mint PRV")]
    MintingPrv,
}

impl RejectReason {
    /// Error code carried by the rejected instruction
    pub fn code(&self) -> u32 {
        match self {
            Self::Verify(e) => e.code(),
            Self::AlreadyShielded => 3101,
            Self::TokenPairMismatch(_) => 3102,
            Self::MintingPrv => 3103,
        }
    }
}

/// State accumulated while building the instructions of one block
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockContext {
    used_tokens: HashSet<UniquenessToken>,
    pairs: HashMap<ExternalTokenId, TokenId>,
}

impl BlockContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_used(&self, token: &UniquenessToken) -> bool {
        self.used_tokens.contains(token)
    }

    /// Persist the block's tokens and pairs once the block is committed
    pub fn commit<S: IssuedTokenStore + TokenPairStore + ?Sized>(self, store: &S) {
        for token in self.used_tokens {
            store.mark_issued(token);
        }
        for (external, internal) in self.pairs {
            store.insert_pair(external, internal);
        }
    }
}

// === Builder ===

pub struct ShieldInstructionBuilder<S, R> {
    store: S,
    shards: R,
    span: Span,
}

impl<S, R> ShieldInstructionBuilder<S, R>
where
    S: IssuedTokenStore + TokenPairStore,
    R: ShardResolver,
{
    pub fn new(store: S, shards: R) -> Self {
        Self {
            store,
            shards,
            span: info_span!("shield_builder"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Instructions for one request given its verification outcome
    pub fn build(
        &self,
        request: &ShieldRequest,
        verified: Result<DecodedReceipt, VerifyError>,
        ctx: &mut BlockContext,
    ) -> Result<Vec<Instruction>, CoreError> {
        let _guard = self.span.enter();
        match verified
            .map_err(RejectReason::from)
            .and_then(|receipt| self.accept(request, &receipt, ctx))
        {
            Ok(instructions) => {
                info!(tx = %request.tx_id, count = instructions.len(), "Shield request accepted");
                Ok(instructions)
            }
            Err(reason) => {
                warn!(tx = %request.tx_id, code = reason.code(), reason = %reason, "Shield request rejected");
                Ok(vec![self.rejected(request, &reason)?])
            }
        }
    }

    /// Re-run `build` and compare with a producer's instructions
    pub fn rederive_and_compare(
        &self,
        request: &ShieldRequest,
        verified: Result<DecodedReceipt, VerifyError>,
        ctx: &mut BlockContext,
        produced: &[Instruction],
    ) -> Result<bool, CoreError> {
        let expected = self.build(request, verified, ctx)?;
        let same = expected.len() == produced.len()
            && expected
                .iter()
                .zip(produced)
                .all(|(a, b)| a.to_string_slice() == b.to_string_slice());
        if !same {
            warn!(tx = %request.tx_id, "Producer instructions differ from rederived ones");
        }
        Ok(same)
    }

    fn accept(
        &self,
        request: &ShieldRequest,
        receipt: &DecodedReceipt,
        ctx: &mut BlockContext,
    ) -> Result<Vec<Instruction>, RejectReason> {
        if request.inc_token_id == constants::PRV_TOKEN_ID {
            return Err(RejectReason::MintingPrv);
        }

        // Check every event before touching the block context; pairs staged
        // by earlier events of this request count as known
        let mut tokens = Vec::with_capacity(receipt.events.len());
        let mut staged = ctx.pairs.clone();
        for event in &receipt.events {
            let token = event
                .uniqueness_token
                .clone()
                .unwrap_or_else(|| receipt.uniqueness_token.clone());
            if ctx.is_used(&token) || tokens.contains(&token) || self.store.is_issued(&token) {
                return Err(RejectReason::AlreadyShielded);
            }
            self.check_pair(&event.external_token_id, &request.inc_token_id, &staged)?;
            staged.insert(event.external_token_id.clone(), request.inc_token_id);
            tokens.push(token);
        }

        let mut instructions = Vec::with_capacity(tokens.len());
        for (event, token) in receipt.events.iter().zip(tokens) {
            let shard_id = self.shards.shard_of(event);
            let content = InstructionContent::Accepted(AcceptedContent {
                request_tx_id: request.tx_id,
                shard_id,
                receiver: event.receiver.clone(),
                token_id: request.inc_token_id,
                amount: event.amount,
                uniqueness_token: Some(token.clone()),
                external_token_id: Some(event.external_token_id.clone()),
            });
            let instruction = InstructionCodec::to_instruction(request.meta_type, shard_id, &content)
                .map_err(|e| RejectReason::Verify(VerifyError::from(e)))?;
            debug!(shard = shard_id.0, amount = event.amount, "Accepted shield event");
            instructions.push(instruction);

            ctx.used_tokens.insert(token);
        }
        ctx.pairs = staged;
        Ok(instructions)
    }

    fn check_pair(
        &self,
        external: &ExternalTokenId,
        internal: &TokenId,
        pairs: &HashMap<ExternalTokenId, TokenId>,
    ) -> Result<(), RejectReason> {
        let known_internal = pairs
            .get(external)
            .copied()
            .or_else(|| self.store.internal_for(external));
        if let Some(known) = known_internal {
            if &known != internal {
                return Err(RejectReason::TokenPairMismatch(format!(
                    "{} is paired with {known}",
                    external.to_hex()
                )));
            }
            return Ok(());
        }

        let known_external = pairs
            .iter()
            .find(|(_, id)| *id == internal)
            .map(|(ext, _)| ext.clone())
            .or_else(|| self.store.external_for(internal));
        match known_external {
            Some(known) if &known != external => Err(RejectReason::TokenPairMismatch(format!(
                "{internal} is paired with {}",
                known.to_hex()
            ))),
            _ => Ok(()),
        }
    }

    fn rejected(&self, request: &ShieldRequest, reason: &RejectReason) -> Result<Instruction, CoreError> {
        let content = InstructionContent::Rejected(RejectedContent {
            request_tx_id: request.tx_id,
            shard_id: request.shard_id,
            error_code: reason.code(),
            data: Some(reason.to_string()),
        });
        InstructionCodec::to_instruction(request.meta_type, request.shard_id, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use alloy_primitives::Address;
    use shield_core::{Hash, InstructionStatus, ReceiverDescriptor};

    const TOKEN: TokenId = Hash::new([0x77; 32]);

    fn request(tx: u8) -> ShieldRequest {
        ShieldRequest {
            tx_id: Hash::new([tx; 32]),
            shard_id: ShardId(1),
            meta_type: MetaType::IssuingEthRequest,
            inc_token_id: TOKEN,
        }
    }

    fn event(receiver: &str, amount: u64) -> ShieldEvent {
        ShieldEvent {
            receiver: ReceiverDescriptor::new(receiver),
            amount,
            external_token_id: Network::Eth.external_token_id(&Address::repeat_byte(0x11)),
            one_time: false,
            uniqueness_token: None,
        }
    }

    fn receipt(token: &[u8], events: Vec<ShieldEvent>) -> DecodedReceipt {
        DecodedReceipt {
            block_number: 10,
            uniqueness_token: UniquenessToken::new(token.to_vec()),
            events,
        }
    }

    fn builder() -> ShieldInstructionBuilder<MemoryBridgeStore, LastByteShardResolver> {
        ShieldInstructionBuilder::new(MemoryBridgeStore::new(), LastByteShardResolver::new(8))
    }

    fn content(instruction: &Instruction) -> InstructionContent {
        InstructionCodec::from_instruction(instruction).unwrap()
    }

    #[test]
    fn test_accepted_instruction_goes_to_receiver_shard() {
        let b = builder();
        let mut ctx = BlockContext::new();
        // 'C' = 67, 67 % 8 = 3
        let out = b
            .build(&request(1), Ok(receipt(b"u1", vec![event("12RxC", 40)])), &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].meta(), Some(MetaType::IssuingEthRequest));
        assert_eq!(out[0].shard_id, ShardId(3));

        match content(&out[0]) {
            InstructionContent::Accepted(c) => {
                assert_eq!(c.amount, 40);
                assert_eq!(c.token_id, TOKEN);
                assert_eq!(c.uniqueness_token, Some(UniquenessToken::new(b"u1".to_vec())));
            }
            other => panic!("unexpected content {other:?}"),
        }
        assert!(ctx.is_used(&UniquenessToken::new(b"u1".to_vec())));
    }

    #[test]
    fn test_verification_failure_rejected_on_request_shard() {
        let b = builder();
        let mut ctx = BlockContext::new();
        let out = b
            .build(&request(1), Err(VerifyError::ExternalTxReverted), &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status().unwrap(), InstructionStatus::Rejected);
        assert_eq!(out[0].shard_id, ShardId(1));
        match content(&out[0]) {
            InstructionContent::Rejected(c) => assert_eq!(c.error_code, 3005),
            other => panic!("unexpected content {other:?}"),
        }
        assert_eq!(ctx, BlockContext::new());
    }

    #[test]
    fn test_double_shield_in_same_block() {
        let b = builder();
        let mut ctx = BlockContext::new();
        b.build(&request(1), Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        let out = b
            .build(&request(2), Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        assert_eq!(out[0].status().unwrap(), InstructionStatus::Rejected);
    }

    #[test]
    fn test_double_shield_across_blocks() {
        let b = builder();
        let mut ctx = BlockContext::new();
        b.build(&request(1), Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        ctx.commit(b.store());

        let mut next = BlockContext::new();
        let out = b
            .build(&request(2), Ok(receipt(b"u1", vec![event("a", 1)])), &mut next)
            .unwrap();
        match content(&out[0]) {
            InstructionContent::Rejected(c) => assert_eq!(c.error_code, RejectReason::AlreadyShielded.code()),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_redeposits_use_own_tokens_all_or_nothing() {
        let b = builder();
        let mut ctx = BlockContext::new();
        let mut first = event("a", 1);
        first.uniqueness_token = Some(UniquenessToken::new(vec![1]));
        let mut second = event("b", 2);
        second.uniqueness_token = Some(UniquenessToken::new(vec![2]));

        let out = b
            .build(&request(1), Ok(receipt(b"tx", vec![first.clone(), second.clone()])), &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 2);

        // One duplicate token rejects the whole request and records nothing
        let mut fresh = event("c", 3);
        fresh.uniqueness_token = Some(UniquenessToken::new(vec![3]));
        let out = b
            .build(&request(2), Ok(receipt(b"tx2", vec![fresh, second])), &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status().unwrap(), InstructionStatus::Rejected);
        assert!(!ctx.is_used(&UniquenessToken::new(vec![3])));
    }

    #[test]
    fn test_token_pair_mismatch() {
        let b = builder();
        b.store().insert_pair(
            Network::Eth.external_token_id(&Address::repeat_byte(0x11)),
            Hash::new([0x55; 32]),
        );
        let mut ctx = BlockContext::new();
        let out = b
            .build(&request(1), Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        match content(&out[0]) {
            InstructionContent::Rejected(c) => assert_eq!(c.error_code, 3102),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_internal_token_bound_to_other_external() {
        let b = builder();
        b.store()
            .insert_pair(Network::Bsc.external_token_id(&Address::repeat_byte(0x11)), TOKEN);
        let mut ctx = BlockContext::new();
        let out = b
            .build(&request(1), Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        assert_eq!(out[0].status().unwrap(), InstructionStatus::Rejected);
    }

    #[test]
    fn test_redeposits_of_two_externals_into_one_token_rejected() {
        let b = builder();
        let mut ctx = BlockContext::new();
        let mut first = event("a", 1);
        first.uniqueness_token = Some(UniquenessToken::new(vec![1]));
        let mut second = event("b", 2);
        second.uniqueness_token = Some(UniquenessToken::new(vec![2]));
        second.external_token_id = Network::Eth.external_token_id(&Address::repeat_byte(0x22));

        let out = b
            .build(&request(1), Ok(receipt(b"tx", vec![first, second])), &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 1);
        match content(&out[0]) {
            InstructionContent::Rejected(c) => assert_eq!(c.error_code, 3102),
            other => panic!("unexpected content {other:?}"),
        }
        assert_eq!(ctx, BlockContext::new());
    }

    #[test]
    fn test_one_time_receiver_routed_by_public_key() {
        let b = builder();
        let mut ctx = BlockContext::new();
        let mut raw = vec![0xff; 64];
        raw[31] = 13;
        let mut redeposit = event(&bs58::encode(&raw).into_string(), 5);
        redeposit.one_time = true;
        redeposit.uniqueness_token = Some(UniquenessToken::new(vec![9]));

        let out = b
            .build(&request(1), Ok(receipt(b"tx", vec![redeposit])), &mut ctx)
            .unwrap();
        // 13 % 8
        assert_eq!(out[0].shard_id, ShardId(5));
    }

    #[test]
    fn test_prv_cannot_be_minted() {
        let b = builder();
        let mut ctx = BlockContext::new();
        let mut req = request(1);
        req.inc_token_id = constants::PRV_TOKEN_ID;
        let out = b
            .build(&req, Ok(receipt(b"u1", vec![event("a", 1)])), &mut ctx)
            .unwrap();
        match content(&out[0]) {
            InstructionContent::Rejected(c) => assert_eq!(c.error_code, RejectReason::MintingPrv.code()),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_rederive_and_compare() {
        let producer = builder();
        let validator = builder();
        let verified = || Ok(receipt(b"u1", vec![event("12RxC", 40)]));

        let produced = producer
            .build(&request(1), verified(), &mut BlockContext::new())
            .unwrap();
        assert!(validator
            .rederive_and_compare(&request(1), verified(), &mut BlockContext::new(), &produced)
            .unwrap());

        let mut tampered = produced.clone();
        let mut c = match content(&tampered[0]) {
            InstructionContent::Accepted(c) => c,
            other => panic!("unexpected content {other:?}"),
        };
        c.amount = 999;
        tampered[0] =
            InstructionCodec::to_instruction(MetaType::IssuingEthRequest, c.shard_id, &InstructionContent::Accepted(c))
                .unwrap();
        assert!(!validator
            .rederive_and_compare(&request(1), verified(), &mut BlockContext::new(), &tampered)
            .unwrap());
    }
}

//! End-to-end tests from an external deposit to the mint that consumes it
//!
//! A deposit receipt is proven against a receipts trie, turned into an
//! accepted instruction, placed in a block ledger and then consumed by the
//! response transaction that mints it.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shield_bridge::events::Deposit;
use shield_bridge::receipt::{EvmLog, RawReceipt};
use shield_bridge::{
    BlockContext, EvmHeader, EvmOracle, EvmProof, EvmProofVerifier, HeaderStatus, LastByteShardResolver,
    MemoryBridgeStore, Network, NetworkParams, OracleError, ShieldInstructionBuilder, ShieldRequest,
    TransactionReceipt, VaultEvent,
};
use shield_consensus::{
    BlockValidator, ExactMintValidator, InstructionLedger, MatchConsumeEngine, MatchError, MintDescriptor,
    ResponseClaim, ResponseKind, ResponseTransaction, StealthOpener,
};
use shield_core::codec::AcceptedContent;
use shield_core::{
    evm_uniqueness_token, Hash, Instruction, InstructionCodec, InstructionContent, IssuingEvmRequest,
    MetaType, MetadataBase, ReceiverDescriptor, ResponseMetadata, ShardId, StealthNonce,
};
use shield_crypto::testing::TrieBuilder;

const VAULT: Address = Address::repeat_byte(0x43);
const ERC20: Address = Address::repeat_byte(0x11);
const BLOCK: Hash = Hash::new([0xb1; 32]);
const BLOCK_NUMBER: u64 = 1_000;
const REQUEST_TX: Hash = Hash::new([0x5e; 32]);
const INC_TOKEN: Hash = Hash::new([0x77; 32]);
const NONCE: StealthNonce = StealthNonce::new([0x0c; 32]);
// 'C' = 67, 67 % 8 = 3
const RECEIVER: &str = "12ShieldRecvC";
const RECEIVER_SHARD: ShardId = ShardId(3);

/// Chain with one canonical block far behind the head
struct FixedChain {
    receipts_root: Hash,
}

#[async_trait]
impl EvmOracle for FixedChain {
    async fn header_by_hash(&self, hash: Hash) -> Result<Option<HeaderStatus>, OracleError> {
        if hash != BLOCK {
            return Ok(None);
        }
        Ok(Some(HeaderStatus {
            header: EvmHeader {
                hash,
                number: BLOCK_NUMBER,
                receipts_root: self.receipts_root,
            },
            canonical: true,
        }))
    }

    async fn block_number(&self) -> Result<u64, OracleError> {
        Ok(BLOCK_NUMBER + 100)
    }

    async fn transaction_receipt(&self, _tx_hash: Hash) -> Result<Option<TransactionReceipt>, OracleError> {
        Ok(None)
    }
}

/// Opens only coins created with the expected shared random
struct KnownNonce(StealthNonce);

impl StealthOpener for KnownNonce {
    fn opens(&self, _recipient: &ReceiverDescriptor, nonce: &StealthNonce) -> bool {
        *nonce == self.0
    }
}

fn receipt(logs: Vec<EvmLog>) -> RawReceipt {
    RawReceipt {
        status: Bytes::from_static(&[1]),
        cumulative_gas_used: 21_000,
        logs_bloom: Bytes::from(vec![0u8; 256]),
        logs,
    }
}

fn deposit_log(amount: u64) -> EvmLog {
    let event = Deposit {
        token: ERC20,
        incognitoAddress: RECEIVER.to_string(),
        amount: U256::from(amount),
    };
    EvmLog {
        address: VAULT,
        topics: vec![Deposit::SIGNATURE_HASH],
        data: Bytes::from(event.encode_data()),
    }
}

/// Request and oracle for a deposit of `amount` at index 3 of a five-receipt block
fn deposit_request(amount: u64) -> (IssuingEvmRequest, FixedChain) {
    let mut trie = TrieBuilder::new();
    for i in 0u64..5 {
        let logs = if i == 3 { vec![deposit_log(amount)] } else { Vec::new() };
        trie.insert(&alloy_rlp::encode(i), alloy_rlp::encode(receipt(logs)));
    }
    let built = trie.build();
    let request = IssuingEvmRequest {
        base: MetadataBase::new(MetaType::IssuingEthRequest),
        block_hash: BLOCK,
        tx_index: 3,
        proof_strs: built.nodes.iter().map(|n| BASE64.encode(n)).collect(),
        inc_token_id: INC_TOKEN,
        network_id: None,
    };
    let chain = FixedChain {
        receipts_root: Hash::new(built.root),
    };
    (request, chain)
}

/// Accepted instruction of an unrelated issuance
fn filler(seed: u8) -> Instruction {
    let content = InstructionContent::Accepted(AcceptedContent {
        request_tx_id: Hash::new([seed; 32]),
        shard_id: ShardId(0),
        receiver: ReceiverDescriptor::new("12Other"),
        token_id: Hash::new([seed; 32]),
        amount: seed as u64,
        uniqueness_token: None,
        external_token_id: None,
    });
    InstructionCodec::to_instruction(MetaType::IssuingRequest, ShardId(0), &content).unwrap()
}

/// Verify the deposit and return the block's six instructions, ours at index 3
async fn shield_block(amount: u64) -> Vec<Instruction> {
    let (request, chain) = deposit_request(amount);
    let params = NetworkParams::new(Network::Eth, VAULT);
    let proof = EvmProof::from_request(&request, &params, VaultEvent::Deposit).unwrap();
    let verified = EvmProofVerifier::new(chain, params).verify(&proof).await;

    let builder = ShieldInstructionBuilder::new(MemoryBridgeStore::new(), LastByteShardResolver::new(8));
    let mut ctx = BlockContext::new();
    let produced = builder
        .build(&ShieldRequest::evm(REQUEST_TX, ShardId(0), &request), verified, &mut ctx)
        .unwrap();
    assert_eq!(produced.len(), 1);

    let mut block = vec![filler(1), filler(2), filler(3)];
    block.extend(produced);
    block.extend([filler(4), filler(5)]);
    block
}

fn response(amount: u64, nonce: StealthNonce) -> ResponseTransaction {
    let mut meta = ResponseMetadata::new(MetaType::IssuingEthResponse, REQUEST_TX)
        .with_uniqueness_token(evm_uniqueness_token(&BLOCK, 3));
    meta.set_shared_random(nonce);
    ResponseTransaction::new(
        meta,
        RECEIVER_SHARD,
        MintDescriptor::new(ReceiverDescriptor::new(RECEIVER), INC_TOKEN, amount),
    )
}

const ETH: ResponseKind = ResponseKind::IssuingEvm {
    request: MetaType::IssuingEthRequest,
};

mod shield_to_mint_tests {
    use super::*;

    #[tokio::test]
    async fn test_deposit_produces_accepted_instruction() {
        let block = shield_block(1_000).await;
        let instruction = &block[3];
        assert_eq!(instruction.meta_type, MetaType::IssuingEthRequest.as_u16());
        assert_eq!(instruction.shard_id, RECEIVER_SHARD);

        let InstructionContent::Accepted(content) = InstructionCodec::from_instruction(instruction).unwrap() else {
            panic!("expected accepted content");
        };
        assert_eq!(content.amount, 1_000);
        assert_eq!(content.token_id, INC_TOKEN);
        assert_eq!(content.uniqueness_token, Some(evm_uniqueness_token(&BLOCK, 3)));
        assert_eq!(content.external_token_id, Some(Network::Eth.external_token_id(&ERC20)));
    }

    #[tokio::test]
    async fn test_response_consumes_index_three_once() {
        let mut ledger = InstructionLedger::new(shield_block(1_000).await);
        let validator = ExactMintValidator::new(KnownNonce(NONCE));
        let engine = MatchConsumeEngine::new();
        let claim = ResponseClaim::from_transaction(&response(1_000, NONCE)).unwrap();

        assert_eq!(engine.match_and_consume(&claim, &mut ledger, ETH, &validator), Ok(3));
        assert_eq!(ledger.consumed_indices(), vec![3]);

        // Resubmitting the same response finds nothing left to consume
        assert!(matches!(
            engine.match_and_consume(&claim, &mut ledger, ETH, &validator),
            Err(MatchError::NoMatchingInstruction(_))
        ));
        assert_eq!(ledger.consumed_count(), 1);
    }

    #[tokio::test]
    async fn test_tampered_amount_not_consumed() {
        let mut ledger = InstructionLedger::new(shield_block(1_000).await);
        let validator = ExactMintValidator::new(KnownNonce(NONCE));
        let claim = ResponseClaim::from_transaction(&response(999, NONCE)).unwrap();

        assert!(matches!(
            MatchConsumeEngine::new().match_and_consume(&claim, &mut ledger, ETH, &validator),
            Err(MatchError::NoMatchingInstruction(_))
        ));
        assert!(!ledger.is_consumed(3));
    }

    #[tokio::test]
    async fn test_wrong_stealth_nonce_not_consumed() {
        let mut ledger = InstructionLedger::new(shield_block(1_000).await);
        let validator = ExactMintValidator::new(KnownNonce(NONCE));
        let claim = ResponseClaim::from_transaction(&response(1_000, StealthNonce::new([0xee; 32]))).unwrap();

        assert!(MatchConsumeEngine::new()
            .match_and_consume(&claim, &mut ledger, ETH, &validator)
            .is_err());
        assert!(!ledger.is_consumed(3));
    }

    #[tokio::test]
    async fn test_block_with_duplicate_mint_rejected() {
        let block = shield_block(1_000).await;
        let validator = BlockValidator::new(ExactMintValidator::new(KnownNonce(NONCE)));

        let report = validator
            .validate_block(block.clone(), &[response(1_000, NONCE)])
            .unwrap();
        assert_eq!(report.consumed, vec![3]);

        let err = validator
            .validate_block(block, &[response(1_000, NONCE), response(1_000, NONCE)])
            .unwrap_err();
        assert_eq!(err.position, 1);
    }

    #[tokio::test]
    async fn test_replayed_deposit_is_rejected_and_unmintable() {
        let (request, chain) = deposit_request(1_000);
        let params = NetworkParams::new(Network::Eth, VAULT);
        let proof = EvmProof::from_request(&request, &params, VaultEvent::Deposit).unwrap();
        let verifier = EvmProofVerifier::new(chain, params);
        let builder = ShieldInstructionBuilder::new(MemoryBridgeStore::new(), LastByteShardResolver::new(8));
        let mut ctx = BlockContext::new();

        let first = builder
            .build(&ShieldRequest::evm(REQUEST_TX, ShardId(0), &request), verifier.verify(&proof).await, &mut ctx)
            .unwrap();
        let replay = builder
            .build(&ShieldRequest::evm(REQUEST_TX, ShardId(0), &request), verifier.verify(&proof).await, &mut ctx)
            .unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].status, "rejected");
        assert_eq!(replay[0].shard_id, ShardId(0));

        // Only the accepted instruction can back a mint
        let mut ledger = InstructionLedger::new(vec![replay[0].clone(), first[0].clone()]);
        let claim = ResponseClaim::from_transaction(&response(1_000, NONCE)).unwrap();
        let validator = ExactMintValidator::new(KnownNonce(NONCE));
        assert_eq!(
            MatchConsumeEngine::new().match_and_consume(&claim, &mut ledger, ETH, &validator),
            Ok(1)
        );
        assert!(!ledger.is_consumed(0));
    }
}

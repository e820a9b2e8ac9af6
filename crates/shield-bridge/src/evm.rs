//! # Trie-Family Proof Verifier
//!
//! Verifies that an EVM receipt proves a vault deposit:
//!
//! 1. the block is known and canonical;
//! 2. the block is deep enough below the head;
//! 3. the proof walks from the header's receipts root to `rlp(tx_index)`;
//! 4. the leaf decodes as a receipt (typed envelope stripped per network);
//! 5. the receipt records success;
//! 6. the vault contract emitted the expected event.
//!
//! Every failure is final for the proof. Host fail-over is the oracle's job.

use alloy_primitives::Address;
use async_trait::async_trait;
use shield_core::{evm_uniqueness_token, Hash, IssuingEvmRequest};
use shield_crypto::verify_proof;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::common::{DecodedReceipt, ExternalProof, ProofVerifier};
use crate::error::{Result, VerifyError};
use crate::events::{extract_events, VaultEvent};
use crate::network::{Network, NetworkParams};
use crate::oracle::{EvmHeader, EvmOracle};
use crate::receipt::decode_receipt;

/// A receipt inclusion proof for one EVM transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvmProof {
    pub network: Network,
    pub block_hash: Hash,
    pub tx_index: u64,
    /// Raw trie nodes, in any order
    pub proof_nodes: Vec<Vec<u8>>,
    pub required_confirmations: u64,
    pub contract_address: Address,
    pub event: VaultEvent,
}

impl EvmProof {
    /// Proof carried by a shielding request, checked against `params`
    pub fn from_request(request: &IssuingEvmRequest, params: &NetworkParams, event: VaultEvent) -> Result<Self> {
        request.validate_sanity()?;
        let proof_nodes = request
            .proof_strs
            .iter()
            .map(|s| crate::common::decode_proof_node(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            network: params.network,
            block_hash: request.block_hash,
            tx_index: request.tx_index,
            proof_nodes,
            required_confirmations: params.confirmations,
            contract_address: params.contract_address,
            event,
        })
    }

    /// Trie key of the receipt
    pub fn receipt_key(&self) -> Vec<u8> {
        alloy_rlp::encode(self.tx_index)
    }
}

/// Header of `block_hash` once it is canonical and `required` blocks deep
pub(crate) async fn confirmed_header<O: EvmOracle + ?Sized>(
    oracle: &O,
    block_hash: Hash,
    required: u64,
) -> Result<EvmHeader> {
    let status = oracle
        .header_by_hash(block_hash)
        .await?
        .ok_or_else(|| VerifyError::ExternalChainForked(block_hash.to_hex()))?;
    if status.header.hash != block_hash {
        warn!(requested = %block_hash, returned = %status.header.hash, "Oracle returned another block");
        return Err(VerifyError::ExternalChainForked(block_hash.to_hex()));
    }
    if !status.canonical {
        warn!(block = %block_hash, "Block is on a fork branch");
        return Err(VerifyError::ExternalChainForked(block_hash.to_hex()));
    }
    let header = status.header;

    let head = oracle.block_number().await?;
    if head < header.number.saturating_add(required) {
        warn!(block_number = header.number, head, required, "Not enough confirmations");
        return Err(VerifyError::InsufficientConfirmations {
            block_number: header.number,
            head,
            required,
        });
    }
    Ok(header)
}

/// Verifier for one EVM network
pub struct EvmProofVerifier<O> {
    oracle: O,
    params: NetworkParams,
    span: Span,
}

impl<O: EvmOracle> EvmProofVerifier<O> {
    pub fn new(oracle: O, params: NetworkParams) -> Self {
        let span = info_span!("evm_verifier", network = %params.network);
        Self { oracle, params, span }
    }

    /// Log inside `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub async fn verify(&self, proof: &EvmProof) -> Result<DecodedReceipt> {
        self.verify_inner(proof).instrument(self.span.clone()).await
    }

    async fn verify_inner(&self, proof: &EvmProof) -> Result<DecodedReceipt> {
        if proof.network != self.params.network {
            return Err(VerifyError::UnknownNetwork(proof.network.to_string()));
        }
        if !proof.network.has_receipt_proofs() {
            return Err(VerifyError::InvalidRequest(format!(
                "{} deposits are proven by transaction hash",
                proof.network
            )));
        }
        if proof.contract_address != self.params.contract_address {
            return Err(VerifyError::InvalidRequest(format!(
                "contract {} is not the {} vault",
                proof.contract_address, self.params.network
            )));
        }

        let required = proof.required_confirmations.max(self.params.confirmations);
        let header = confirmed_header(&self.oracle, proof.block_hash, required).await?;

        let leaf = verify_proof(header.receipts_root.as_bytes(), &proof.receipt_key(), &proof.proof_nodes)?;
        debug!(tx_index = proof.tx_index, leaf_len = leaf.len(), "Receipt proven");

        let receipt = decode_receipt(&leaf, self.params.strip_typed_receipt)?;
        if !receipt.is_success() {
            return Err(VerifyError::ExternalTxReverted);
        }

        let events = extract_events(&receipt, &proof.contract_address, proof.event, self.params.network)?;
        info!(
            block = %proof.block_hash,
            tx_index = proof.tx_index,
            events = events.len(),
            "Shield proof verified"
        );

        Ok(DecodedReceipt {
            block_number: header.number,
            uniqueness_token: evm_uniqueness_token(&proof.block_hash, proof.tx_index),
            events,
        })
    }
}

#[async_trait]
impl<O: EvmOracle> ProofVerifier for EvmProofVerifier<O> {
    fn name(&self) -> &str {
        self.params.network.name()
    }

    async fn verify_external(&self, proof: &ExternalProof) -> Result<DecodedReceipt> {
        match proof {
            ExternalProof::Evm(p) => self.verify(p).await,
            other => Err(VerifyError::UnknownNetwork(other.chain())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::{deposit_log, receipt_with};
    use crate::oracle::{EvmHeader, HeaderStatus, MockEvmOracle};
    use crate::receipt::RawReceipt;
    use alloy_primitives::{Bytes, U256};
    use shield_crypto::testing::TrieBuilder;

    const VAULT: Address = Address::repeat_byte(0x43);
    const TOKEN: Address = Address::repeat_byte(0x11);
    const BLOCK: Hash = Hash::new([0xb1; 32]);
    const BLOCK_NUMBER: u64 = 100;

    struct Fixture {
        receipts_root: Hash,
        proof: EvmProof,
    }

    /// A block of five receipts; `leaf` sits at index 3
    fn fixture(network: Network, leaf: Vec<u8>) -> Fixture {
        let mut trie = TrieBuilder::new();
        for i in 0u64..5 {
            let value = if i == 3 {
                leaf.clone()
            } else {
                alloy_rlp::encode(receipt_with(Vec::new()))
            };
            trie.insert(&alloy_rlp::encode(i), value);
        }
        let built = trie.build();
        Fixture {
            receipts_root: Hash::new(built.root),
            proof: EvmProof {
                network,
                block_hash: BLOCK,
                tx_index: 3,
                proof_nodes: built.nodes,
                required_confirmations: 15,
                contract_address: VAULT,
                event: VaultEvent::Deposit,
            },
        }
    }

    fn deposit_receipt() -> RawReceipt {
        receipt_with(vec![deposit_log(VAULT, TOKEN, "12RxReceiver", U256::from(500u64))])
    }

    fn oracle(receipts_root: Hash, canonical: bool, head: u64) -> MockEvmOracle {
        let mut oracle = MockEvmOracle::new();
        oracle.expect_header_by_hash().returning(move |hash| {
            Ok(Some(HeaderStatus {
                header: EvmHeader {
                    hash,
                    number: BLOCK_NUMBER,
                    receipts_root,
                },
                canonical,
            }))
        });
        oracle.expect_block_number().returning(move || Ok(head));
        oracle
    }

    fn verifier(oracle: MockEvmOracle, network: Network) -> EvmProofVerifier<MockEvmOracle> {
        EvmProofVerifier::new(oracle, NetworkParams::new(network, VAULT))
    }

    #[tokio::test]
    async fn test_valid_deposit_proof() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);

        let decoded = v.verify(&f.proof).await.unwrap();
        assert_eq!(decoded.block_number, BLOCK_NUMBER);
        assert_eq!(decoded.events.len(), 1);
        assert_eq!(decoded.events[0].amount, 500);
        assert_eq!(decoded.events[0].receiver.as_str(), "12RxReceiver");
        assert_eq!(decoded.uniqueness_token, evm_uniqueness_token(&BLOCK, 3));
    }

    #[tokio::test]
    async fn test_forked_header_with_valid_proof_rejected() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let v = verifier(oracle(f.receipts_root, false, BLOCK_NUMBER + 100), Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::ExternalChainForked(_))));
    }

    #[tokio::test]
    async fn test_header_of_other_block_rejected() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let receipts_root = f.receipts_root;
        let mut oracle = MockEvmOracle::new();
        oracle.expect_header_by_hash().returning(move |_| {
            Ok(Some(HeaderStatus {
                header: EvmHeader {
                    hash: Hash::new([0xee; 32]),
                    number: BLOCK_NUMBER,
                    receipts_root,
                },
                canonical: true,
            }))
        });
        oracle.expect_block_number().never();
        let v = verifier(oracle, Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::ExternalChainForked(_))));
    }

    #[tokio::test]
    async fn test_unknown_block_rejected() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let mut oracle = MockEvmOracle::new();
        oracle.expect_header_by_hash().returning(|_| Ok(None));
        oracle.expect_block_number().never();
        let v = verifier(oracle, Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::ExternalChainForked(_))));
    }

    #[tokio::test]
    async fn test_shallow_block_rejected() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 14), Network::Eth);
        let err = v.verify(&f.proof).await.unwrap_err();
        assert_eq!(
            err,
            VerifyError::InsufficientConfirmations {
                block_number: BLOCK_NUMBER,
                head: BLOCK_NUMBER + 14,
                required: 15,
            }
        );
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_network_depth_cannot_be_lowered_by_proof() {
        let mut f = fixture(Network::Plg, alloy_rlp::encode(deposit_receipt()));
        f.proof.required_confirmations = 1;
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 20), Network::Plg);
        assert!(matches!(
            v.verify(&f.proof).await,
            Err(VerifyError::InsufficientConfirmations { required: 128, .. })
        ));
    }

    #[tokio::test]
    async fn test_tampered_proof_rejected() {
        let mut f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let last = f.proof.proof_nodes.len() - 1;
        let node = &mut f.proof.proof_nodes[last];
        let byte = node.len() / 2;
        node[byte] ^= 0x01;
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::InvalidInclusionProof(_))));
    }

    #[tokio::test]
    async fn test_absent_index_rejected() {
        let mut f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        f.proof.tx_index = 9;
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::InvalidInclusionProof(_))));
    }

    #[tokio::test]
    async fn test_reverted_receipt_rejected() {
        let mut receipt = deposit_receipt();
        receipt.status = Bytes::new();
        let f = fixture(Network::Eth, alloy_rlp::encode(receipt));
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        assert_eq!(v.verify(&f.proof).await, Err(VerifyError::ExternalTxReverted));
    }

    #[tokio::test]
    async fn test_receipt_without_vault_event_rejected() {
        let receipt = receipt_with(vec![deposit_log(Address::repeat_byte(0x99), TOKEN, "x", U256::from(1u8))]);
        let f = fixture(Network::Eth, alloy_rlp::encode(receipt));
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn test_typed_receipt_per_network() {
        let mut typed = vec![0x02];
        typed.extend(alloy_rlp::encode(deposit_receipt()));

        let f = fixture(Network::Eth, typed.clone());
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        assert!(v.verify(&f.proof).await.is_ok());

        let f = fixture(Network::Bsc, typed);
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Bsc);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::MalformedReceipt(_))));
    }

    #[tokio::test]
    async fn test_foreign_contract_rejected() {
        let mut f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        f.proof.contract_address = Address::repeat_byte(0x99);
        let mut oracle = MockEvmOracle::new();
        oracle.expect_header_by_hash().never();
        let v = verifier(oracle, Network::Eth);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_aurora_trie_proof_refused() {
        let f = fixture(Network::Aurora, alloy_rlp::encode(deposit_receipt()));
        let mut oracle = MockEvmOracle::new();
        oracle.expect_header_by_hash().never();
        let v = verifier(oracle, Network::Aurora);
        assert!(matches!(v.verify(&f.proof).await, Err(VerifyError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_dispatch_through_trait() {
        let f = fixture(Network::Eth, alloy_rlp::encode(deposit_receipt()));
        let v = verifier(oracle(f.receipts_root, true, BLOCK_NUMBER + 15), Network::Eth);
        let verifier: &dyn ProofVerifier = &v;
        assert_eq!(verifier.name(), "eth");
        assert!(verifier.verify_external(&ExternalProof::Evm(f.proof)).await.is_ok());
    }
}

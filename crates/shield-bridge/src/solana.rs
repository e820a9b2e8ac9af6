//! RPC-trust proof verifier
//!
//! The chain's finality and the transaction contents are taken from a single
//! RPC host. The shield instruction is the one whose vault account slot holds
//! the bridge program address as a writable account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shield_core::{ExternalTokenId, IssuingSolanaRequest, ReceiverDescriptor, UniquenessToken};
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::common::{DecodedReceipt, ExternalProof, ProofVerifier};
use crate::config::SolanaConfig;
use crate::error::{Result, VerifyError};
use crate::events::ShieldEvent;
use crate::oracle::{SolanaInstruction, SolanaOracle, SolanaTransaction};

/// Tag byte of the vault's shield instruction
pub const SHIELD_INSTRUCTION_TAG: u8 = 0;

const AMOUNT_OFFSET: usize = 1;
const RECEIVER_OFFSET: usize = 9;

/// A shield transaction reference on the RPC-trust chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaProof {
    pub tx_signature: String,
    pub expected_program_address: String,
}

impl SolanaProof {
    pub fn from_request(request: &IssuingSolanaRequest, params: &SolanaParams) -> Result<Self> {
        request.validate_sanity()?;
        Ok(Self {
            tx_signature: request.tx_signature.clone(),
            expected_program_address: params.program_address.clone(),
        })
    }
}

/// Where the verifier looks inside a shield instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolanaParams {
    pub program_address: String,
    pub vault_account_slot: usize,
    pub source_token_slot: usize,
}

impl From<&SolanaConfig> for SolanaParams {
    fn from(cfg: &SolanaConfig) -> Self {
        Self {
            program_address: cfg.program_address.clone(),
            vault_account_slot: cfg.vault_account_slot,
            source_token_slot: cfg.source_token_slot,
        }
    }
}

/// Decoded shield instruction payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldPayload {
    pub amount: u64,
    pub receiver: String,
}

impl ShieldPayload {
    /// `tag (1) || amount (u64 LE) || receiver (UTF-8)`
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() <= RECEIVER_OFFSET {
            return Err(VerifyError::MalformedReceipt(format!(
                "shield payload of {} bytes",
                data.len()
            )));
        }
        if data[0] != SHIELD_INSTRUCTION_TAG {
            return Err(VerifyError::MalformedReceipt(format!("instruction tag {}", data[0])));
        }
        let mut amount = [0u8; 8];
        amount.copy_from_slice(&data[AMOUNT_OFFSET..RECEIVER_OFFSET]);
        let receiver = std::str::from_utf8(&data[RECEIVER_OFFSET..])
            .map_err(|e| VerifyError::MalformedReceipt(format!("receiver: {e}")))?;
        Ok(Self {
            amount: u64::from_le_bytes(amount),
            receiver: receiver.to_string(),
        })
    }
}

pub struct SolanaProofVerifier<O> {
    oracle: O,
    params: SolanaParams,
    span: Span,
}

impl<O: SolanaOracle> SolanaProofVerifier<O> {
    pub fn new(oracle: O, params: SolanaParams) -> Self {
        Self {
            oracle,
            params,
            span: info_span!("solana_verifier"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn verify(&self, proof: &SolanaProof) -> Result<DecodedReceipt> {
        self.verify_inner(proof).instrument(self.span.clone()).await
    }

    /// The shield instruction: vault slot writable and equal to the program address
    fn find_shield_instruction<'a>(
        &self,
        tx: &'a SolanaTransaction,
        program_address: &str,
    ) -> Option<&'a SolanaInstruction> {
        tx.instructions.iter().find(|ix| {
            tx.instruction_account(ix, self.params.vault_account_slot)
                .is_some_and(|account| account.writable && account.pubkey == program_address)
        })
    }

    async fn verify_inner(&self, proof: &SolanaProof) -> Result<DecodedReceipt> {
        if proof.expected_program_address != self.params.program_address {
            return Err(VerifyError::InvalidRequest(format!(
                "program {} is not the bridge program",
                proof.expected_program_address
            )));
        }

        let tx = self
            .oracle
            .transaction(&proof.tx_signature)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(proof.tx_signature.clone()))?;
        if tx.failed {
            warn!(signature = %proof.tx_signature, "Shield transaction failed on chain");
            return Err(VerifyError::ExternalTxReverted);
        }

        let ix = self
            .find_shield_instruction(&tx, &proof.expected_program_address)
            .ok_or_else(|| VerifyError::EventNotFound(format!("no shield instruction in {}", proof.tx_signature)))?;
        let payload = ShieldPayload::decode(&ix.data)?;

        let source = tx
            .instruction_account(ix, self.params.source_token_slot)
            .ok_or_else(|| VerifyError::MalformedReceipt("missing source token account".into()))?;
        let mint = self
            .oracle
            .token_account_mint(&source.pubkey)
            .await?
            .ok_or_else(|| VerifyError::EventNotFound(format!("token account {} not found", source.pubkey)))?;
        let mint_bytes = bs58::decode(&mint)
            .into_vec()
            .map_err(|e| VerifyError::MalformedReceipt(format!("mint {mint}: {e}")))?;
        debug!(mint = %mint, amount = payload.amount, "Shield instruction decoded");

        info!(signature = %proof.tx_signature, slot = tx.slot, "Shield transaction verified");
        Ok(DecodedReceipt {
            block_number: tx.slot,
            uniqueness_token: UniquenessToken::new(proof.tx_signature.as_bytes().to_vec()),
            events: vec![ShieldEvent {
                receiver: ReceiverDescriptor::new(payload.receiver),
                amount: payload.amount,
                external_token_id: ExternalTokenId::new(mint_bytes),
                one_time: false,
                uniqueness_token: None,
            }],
        })
    }
}

#[async_trait]
impl<O: SolanaOracle> ProofVerifier for SolanaProofVerifier<O> {
    fn name(&self) -> &str {
        "solana"
    }

    async fn verify_external(&self, proof: &ExternalProof) -> Result<DecodedReceipt> {
        match proof {
            ExternalProof::Solana(p) => self.verify(p).await,
            other => Err(VerifyError::UnknownNetwork(other.chain())),
        }
    }
}

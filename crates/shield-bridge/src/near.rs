//! NEAR-anchored verifiers
//!
//! Two shield paths end on the NEAR chain:
//!
//! - **Wasm**: a deposit to the NEAR vault contract. The transaction is read
//!   from redundant NEAR hosts, its block must be canonical and deep enough
//!   below the final block, and the vault's first log must read
//!   `<receiver> <token> <amount>`.
//! - **Aurora**: a deposit on the Aurora EVM. The receipt is fetched by
//!   transaction hash and its block checked like any EVM block. The receipts
//!   root must then equal the chunk receipts root of the NEAR block that
//!   executed the transaction.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shield_core::{
    evm_uniqueness_token, ExternalTokenId, Hash, IssuingAuroraRequest, IssuingWasmRequest, ReceiverDescriptor,
    UniquenessToken,
};
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::common::{DecodedReceipt, ExternalProof, ProofVerifier};
use crate::config::NearConfig;
use crate::error::{Result, VerifyError};
use crate::events::{extract_log_events, ShieldEvent, VaultEvent};
use crate::evm::confirmed_header;
use crate::network::{Network, NetworkParams};
use crate::oracle::{EvmOracle, NearOracle, NearTxStatus};

/// Prefix of NEAR external token ids
pub const NEAR_TOKEN_PREFIX: &str = "NAR";

/// Account the bridge queries transaction status as
pub const DEFAULT_SENDER_ACCOUNT: &str = "incognito";

/// Decode a base58 NEAR hash
fn decode_near_hash(s: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| VerifyError::InvalidRequest(format!("NEAR hash {s}: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| VerifyError::InvalidRequest(format!("NEAR hash {s} is {} bytes", bytes.len())))
}

/// External token id of a NEAR token account
pub fn near_token_id(token: &str) -> ExternalTokenId {
    let mut bytes = NEAR_TOKEN_PREFIX.as_bytes().to_vec();
    bytes.extend_from_slice(token.as_bytes());
    ExternalTokenId::new(bytes)
}

/// `<receiver> <token> <amount>` as logged by the vault
fn parse_shield_log(log: &str) -> Option<(&str, &str, u64)> {
    let mut parts = log.split(' ');
    let (receiver, token, amount) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || receiver.is_empty() || token.is_empty() {
        return None;
    }
    Some((receiver, token, amount.parse().ok()?))
}

// === Wasm ===

/// NEAR chain parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearParams {
    /// Vault contract account
    pub contract_id: String,
    pub confirmations: u64,
    /// Account passed to transaction status lookups
    pub sender_account: String,
}

impl From<&NearConfig> for NearParams {
    fn from(cfg: &NearConfig) -> Self {
        Self {
            contract_id: cfg.contract_id.clone(),
            confirmations: cfg.confirmations,
            sender_account: cfg.sender_account.clone(),
        }
    }
}

/// A shield transaction on NEAR
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmProof {
    /// Base58 transaction hash
    pub tx_hash: String,
    pub contract_id: String,
}

impl WasmProof {
    pub fn from_request(request: &IssuingWasmRequest, params: &NearParams) -> Result<Self> {
        request.validate_sanity()?;
        decode_near_hash(&request.tx_hash)?;
        Ok(Self {
            tx_hash: request.tx_hash.clone(),
            contract_id: params.contract_id.clone(),
        })
    }
}

/// Verifier for deposits to the NEAR vault contract
pub struct WasmProofVerifier<N> {
    oracle: N,
    params: NearParams,
    span: Span,
}

impl<N: NearOracle> WasmProofVerifier<N> {
    pub fn new(oracle: N, params: NearParams) -> Self {
        let span = info_span!("wasm_verifier", contract = %params.contract_id);
        Self { oracle, params, span }
    }

    /// Log inside `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn params(&self) -> &NearParams {
        &self.params
    }

    pub async fn verify(&self, proof: &WasmProof) -> Result<DecodedReceipt> {
        self.verify_inner(proof).instrument(self.span.clone()).await
    }

    async fn verify_inner(&self, proof: &WasmProof) -> Result<DecodedReceipt> {
        if proof.contract_id != self.params.contract_id {
            return Err(VerifyError::InvalidRequest(format!(
                "contract {} is not the NEAR vault",
                proof.contract_id
            )));
        }
        let hash = decode_near_hash(&proof.tx_hash)?;

        let status = self
            .oracle
            .tx_status(&proof.tx_hash, &self.params.sender_account)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(proof.tx_hash.clone()))?;
        if status.failed {
            warn!(tx = %proof.tx_hash, "Shield transaction failed on NEAR");
            return Err(VerifyError::ExternalTxReverted);
        }

        let mined = self
            .oracle
            .block_by_hash(&status.block_hash)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(status.block_hash.clone()))?;
        let canonical = self.oracle.block_at_height(mined.height).await?;
        if canonical.map(|b| b.hash).as_deref() != Some(mined.hash.as_str()) {
            warn!(block = %mined.hash, height = mined.height, "NEAR block is on a fork branch");
            return Err(VerifyError::ExternalChainForked(mined.hash));
        }

        let tip = self.oracle.final_block().await?;
        let required = self.params.confirmations;
        if tip.height < mined.height.saturating_add(required) {
            warn!(height = mined.height, tip = tip.height, required, "NEAR transaction not final enough");
            return Err(VerifyError::InsufficientConfirmations {
                block_number: mined.height,
                head: tip.height,
                required,
            });
        }

        let event = self.shield_event(&status)?;
        info!(tx = %proof.tx_hash, height = mined.height, amount = event.amount, "NEAR shield verified");
        Ok(DecodedReceipt {
            block_number: mined.height,
            uniqueness_token: UniquenessToken::new(hash.to_vec()),
            events: vec![event],
        })
    }

    /// The vault's shield log; any failed receipt voids the transaction
    fn shield_event(&self, status: &NearTxStatus) -> Result<ShieldEvent> {
        let mut found = None;
        for receipt in &status.receipts {
            if receipt.failed {
                warn!(executor = %receipt.executor_id, "Receipt of the shield transaction failed");
                return Err(VerifyError::ExternalTxReverted);
            }
            if found.is_some() || receipt.executor_id != self.params.contract_id {
                continue;
            }
            if let Some((receiver, token, amount)) = receipt.logs.first().and_then(|l| parse_shield_log(l)) {
                debug!(receiver, token, amount, "Shield log decoded");
                found = Some(ShieldEvent {
                    receiver: ReceiverDescriptor::new(receiver),
                    amount,
                    external_token_id: near_token_id(token),
                    one_time: false,
                    uniqueness_token: None,
                });
            }
        }
        found.ok_or_else(|| VerifyError::EventNotFound(format!("no shield log from {}", self.params.contract_id)))
    }
}

#[async_trait]
impl<N: NearOracle> ProofVerifier for WasmProofVerifier<N> {
    fn name(&self) -> &str {
        "near"
    }

    async fn verify_external(&self, proof: &ExternalProof) -> Result<DecodedReceipt> {
        match proof {
            ExternalProof::Wasm(p) => self.verify(p).await,
            other => Err(VerifyError::UnknownNetwork(other.chain())),
        }
    }
}

// === Aurora ===

/// An Aurora deposit named by its transaction hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuroraProof {
    pub tx_hash: Hash,
    pub required_confirmations: u64,
    pub contract_address: Address,
    pub event: VaultEvent,
}

impl AuroraProof {
    pub fn from_request(request: &IssuingAuroraRequest, params: &NetworkParams, event: VaultEvent) -> Result<Self> {
        request.validate_sanity()?;
        Ok(Self {
            tx_hash: request.tx_hash,
            required_confirmations: params.confirmations,
            contract_address: params.contract_address,
            event,
        })
    }
}

/// Verifier for Aurora deposits, anchored on the NEAR chain
pub struct AuroraProofVerifier<E, N> {
    evm: E,
    near: N,
    params: NetworkParams,
    sender_account: String,
    span: Span,
}

impl<E: EvmOracle, N: NearOracle> AuroraProofVerifier<E, N> {
    pub fn new(evm: E, near: N, params: NetworkParams) -> Self {
        Self {
            evm,
            near,
            params,
            sender_account: DEFAULT_SENDER_ACCOUNT.to_string(),
            span: info_span!("aurora_verifier"),
        }
    }

    pub fn with_sender_account(mut self, account: impl Into<String>) -> Self {
        self.sender_account = account.into();
        self
    }

    /// Log inside `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn verify(&self, proof: &AuroraProof) -> Result<DecodedReceipt> {
        self.verify_inner(proof).instrument(self.span.clone()).await
    }

    async fn verify_inner(&self, proof: &AuroraProof) -> Result<DecodedReceipt> {
        if self.params.network != Network::Aurora {
            return Err(VerifyError::UnknownNetwork(self.params.network.to_string()));
        }
        if proof.contract_address != self.params.contract_address {
            return Err(VerifyError::InvalidRequest(format!(
                "contract {} is not the aurora vault",
                proof.contract_address
            )));
        }

        let receipt = self
            .evm
            .transaction_receipt(proof.tx_hash)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(proof.tx_hash.to_hex()))?;
        let near_hex = receipt
            .near_tx_hash
            .as_deref()
            .ok_or_else(|| VerifyError::MalformedReceipt("receipt names no NEAR transaction".into()))?;
        if !receipt.success {
            return Err(VerifyError::ExternalTxReverted);
        }

        let required = proof.required_confirmations.max(self.params.confirmations);
        let header = confirmed_header(&self.evm, receipt.block_hash, required).await?;

        let near_hash = near_hex
            .parse::<B256>()
            .map_err(|e| VerifyError::MalformedReceipt(format!("NEAR transaction {near_hex}: {e}")))?;
        let near_tx = bs58::encode(near_hash.as_slice()).into_string();
        let status = self
            .near
            .tx_status(&near_tx, &self.sender_account)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(near_tx.clone()))?;
        let mined = self
            .near
            .block_by_hash(&status.block_hash)
            .await?
            .ok_or_else(|| VerifyError::ExternalChainForked(status.block_hash.clone()))?;

        let root = bs58::encode(header.receipts_root.as_bytes()).into_string();
        if mined.chunk_receipts_root != root {
            warn!(aurora = %root, near = %mined.chunk_receipts_root, "Receipts roots differ");
            return Err(VerifyError::InvalidInclusionProof(
                "receipts root does not match the NEAR chunk receipts root".into(),
            ));
        }
        debug!(near_tx = %near_tx, near_height = mined.height, "Receipts root anchored on NEAR");

        let events = extract_log_events(&receipt.logs, &proof.contract_address, proof.event, Network::Aurora)?;
        info!(tx = %proof.tx_hash, block = header.number, events = events.len(), "Aurora shield verified");
        Ok(DecodedReceipt {
            block_number: header.number,
            uniqueness_token: evm_uniqueness_token(&receipt.block_hash, receipt.tx_index),
            events,
        })
    }
}

#[async_trait]
impl<E: EvmOracle, N: NearOracle> ProofVerifier for AuroraProofVerifier<E, N> {
    fn name(&self) -> &str {
        "aurora"
    }

    async fn verify_external(&self, proof: &ExternalProof) -> Result<DecodedReceipt> {
        match proof {
            ExternalProof::Aurora(p) => self.verify(p).await,
            other => Err(VerifyError::UnknownNetwork(other.chain())),
        }
    }
}

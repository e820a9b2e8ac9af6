//! # Shielding Bridge
//!
//! Verifies that value was locked on an external chain and turns the verified
//! facts into beacon instructions.
//!
//! Two chain families are supported:
//!
//! - **Trie family** (EVM networks): a receipt inclusion proof is checked
//!   against the header's receipts root, after the header has been confirmed
//!   canonical and deep enough by redundant RPC hosts.
//! - **RPC-trust family** (Solana): the finalized transaction is read from a
//!   single trusted host and its shield instruction is decoded.
//! - **NEAR-anchored** (NEAR, Aurora): the transaction is looked up by hash.
//!   NEAR deposits are read from the vault's log. Aurora receipts are tied to
//!   the NEAR block that executed them through the receipts root.
//!
//! ## Flow
//!
//! ```text
//!   ExternalProof ──► ProofVerifier ──► DecodedReceipt ──► ShieldInstructionBuilder ──► Instruction
//!                          │
//!               EvmOracle / SolanaOracle / NearOracle
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod evm;
pub mod near;
pub mod network;
pub mod oracle;
pub mod receipt;
pub mod shield;
pub mod solana;

pub use config::*;
pub use error::*;
pub use events::{ShieldEvent, VaultEvent};
pub use evm::{EvmProof, EvmProofVerifier};
pub use near::{AuroraProof, AuroraProofVerifier, NearParams, WasmProof, WasmProofVerifier};
pub use network::{Network, NetworkParams};
pub use oracle::*;
pub use shield::*;
pub use solana::{SolanaParams, SolanaProof, SolanaProofVerifier};

pub mod common {
    //! Types shared by both verifier families

    use alloy_primitives::Address;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Serialize};
    use shield_core::{Hash, UniquenessToken};

    use crate::error::{Result, VerifyError};
    use crate::events::{ShieldEvent, VaultEvent};
    use crate::evm::EvmProof;
    use crate::near::{AuroraProof, WasmProof};
    use crate::network::Network;
    use crate::solana::SolanaProof;

    /// Verifier of one external chain
    #[async_trait]
    pub trait ProofVerifier: Send + Sync {
        /// Verifier name for logs
        fn name(&self) -> &str;

        /// Verify a proof of this verifier's family
        async fn verify_external(&self, proof: &ExternalProof) -> Result<DecodedReceipt>;
    }

    /// A proof tagged by chain family
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ExternalProof {
        Evm(EvmProof),
        Solana(SolanaProof),
        Aurora(AuroraProof),
        Wasm(WasmProof),
    }

    impl ExternalProof {
        /// Chain the proof comes from
        pub fn chain(&self) -> String {
            match self {
                Self::Evm(p) => p.network.to_string(),
                Self::Solana(_) => "solana".into(),
                Self::Aurora(_) => Network::Aurora.to_string(),
                Self::Wasm(_) => "near".into(),
            }
        }
    }

    /// Facts established by a successful verification
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct DecodedReceipt {
        /// Block number, or slot on the RPC-trust chain
        pub block_number: u64,
        /// Makes the external transaction mintable once
        pub uniqueness_token: UniquenessToken,
        /// Never empty
        pub events: Vec<ShieldEvent>,
    }

    /// Decode one base64 trie node
    pub fn decode_proof_node(s: &str) -> Result<Vec<u8>> {
        BASE64
            .decode(s)
            .map_err(|e| VerifyError::InvalidRequest(format!("proof node: {e}")))
    }

    fn default_event_name() -> String {
        VaultEvent::Deposit.name().to_string()
    }

    /// JSON form of a trie-family proof
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EvmProofWire {
        pub network: Network,
        pub block_hash: Hash,
        pub tx_index: u64,
        /// Base64 trie nodes
        pub proof_strs: Vec<String>,
        pub contract_address: Address,
        #[serde(default = "default_event_name")]
        pub event_name: String,
        /// Defaults to the network's confirmation depth
        #[serde(default)]
        pub confirmations: Option<u64>,
    }

    impl EvmProofWire {
        pub fn into_proof(self) -> Result<EvmProof> {
            let event = VaultEvent::parse(&self.event_name)
                .ok_or_else(|| VerifyError::InvalidRequest(format!("unknown event {}", self.event_name)))?;
            if self.proof_strs.is_empty() {
                return Err(VerifyError::InvalidRequest("proofs must not be empty".into()));
            }
            let proof_nodes = self
                .proof_strs
                .iter()
                .map(|s| decode_proof_node(s))
                .collect::<Result<Vec<_>>>()?;
            Ok(EvmProof {
                network: self.network,
                block_hash: self.block_hash,
                tx_index: self.tx_index,
                proof_nodes,
                required_confirmations: self
                    .confirmations
                    .unwrap_or_else(|| self.network.default_confirmations()),
                contract_address: self.contract_address,
                event,
            })
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::{DecodedReceipt, ExternalProof, ProofVerifier};
    pub use crate::error::{OracleError, Result, VerifyError};
    pub use crate::evm::{EvmProof, EvmProofVerifier};
    pub use crate::near::{AuroraProof, AuroraProofVerifier, WasmProof, WasmProofVerifier};
    pub use crate::network::{Network, NetworkParams};
    pub use crate::oracle::{EvmOracle, NearOracle, SolanaOracle};
    pub use crate::shield::ShieldInstructionBuilder;
    pub use crate::solana::{SolanaProof, SolanaProofVerifier};
}

#[cfg(test)]
mod tests {
    use super::common::*;
    use super::*;

    #[test]
    fn test_wire_proof_defaults() {
        let json = format!(
            r#"{{
                "network": "plg",
                "blockHash": "{}",
                "txIndex": 7,
                "proofStrs": ["AQID"],
                "contractAddress": "0x43d037a562099a4c2c95b1e2120cc43054450629"
            }}"#,
            "ab".repeat(32)
        );
        let wire: EvmProofWire = serde_json::from_str(&json).unwrap();
        let proof = wire.into_proof().unwrap();
        assert_eq!(proof.network, Network::Plg);
        assert_eq!(proof.required_confirmations, 128);
        assert_eq!(proof.event, VaultEvent::Deposit);
        assert_eq!(proof.proof_nodes, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_wire_proof_rejects_bad_input() {
        let base = EvmProofWire {
            network: Network::Eth,
            block_hash: shield_core::Hash::new([1; 32]),
            tx_index: 0,
            proof_strs: vec!["AQID".into()],
            contract_address: alloy_primitives::Address::ZERO,
            event_name: "Deposit".into(),
            confirmations: None,
        };

        let mut bad_event = base.clone();
        bad_event.event_name = "Withdraw".into();
        assert!(matches!(bad_event.into_proof(), Err(VerifyError::InvalidRequest(_))));

        let mut bad_node = base.clone();
        bad_node.proof_strs = vec!["not base64!".into()];
        assert!(matches!(bad_node.into_proof(), Err(VerifyError::InvalidRequest(_))));

        let mut empty = base;
        empty.proof_strs.clear();
        assert!(empty.into_proof().is_err());
    }
}

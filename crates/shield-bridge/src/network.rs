//! EVM network table
//!
//! Static facts about each supported EVM network: id, token prefix, whether
//! receipts carry a typed envelope byte, and its request/response kinds.
//! Aurora is listed for its token prefix and tags, but its deposits are
//! verified by [`crate::near::AuroraProofVerifier`].

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use shield_core::{constants, ExternalTokenId, MetaType};
use std::fmt;

/// Supported EVM networks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Eth,
    Bsc,
    Plg,
    Ftm,
    Aurora,
    Avax,
}

impl Network {
    pub const ALL: [Network; 6] = [Self::Eth, Self::Bsc, Self::Plg, Self::Ftm, Self::Aurora, Self::Avax];

    pub fn network_id(self) -> u8 {
        match self {
            Self::Eth => 1,
            Self::Bsc => 2,
            Self::Plg => 3,
            Self::Ftm => 4,
            Self::Aurora => 5,
            Self::Avax => 6,
        }
    }

    pub fn from_network_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.network_id() == id)
    }

    /// Prefix prepended to token addresses in external token ids
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Eth => "",
            Self::Bsc => "BSC",
            Self::Plg => "PLG",
            Self::Ftm => "FTM",
            Self::Aurora => "AURORA",
            Self::Avax => "AVAX",
        }
    }

    /// Whether receipt leaves may start with an EIP-2718 type byte
    pub fn strips_typed_receipt(self) -> bool {
        !matches!(self, Self::Bsc)
    }

    /// Whether deposits are proven with a receipt trie proof. Aurora
    /// deposits are looked up by transaction hash and anchored on NEAR.
    pub fn has_receipt_proofs(self) -> bool {
        !matches!(self, Self::Aurora)
    }

    pub fn default_confirmations(self) -> u64 {
        match self {
            Self::Eth | Self::Bsc => 15,
            Self::Plg => 128,
            Self::Ftm | Self::Aurora | Self::Avax => 5,
        }
    }

    pub fn request_meta(self) -> MetaType {
        match self {
            Self::Eth => MetaType::IssuingEthRequest,
            Self::Bsc => MetaType::IssuingBscRequest,
            Self::Plg => MetaType::IssuingPlgRequest,
            Self::Ftm => MetaType::IssuingFtmRequest,
            Self::Aurora => MetaType::IssuingAuroraRequest,
            Self::Avax => MetaType::IssuingAvaxRequest,
        }
    }

    pub fn response_meta(self) -> MetaType {
        match self {
            Self::Eth => MetaType::IssuingEthResponse,
            Self::Bsc => MetaType::IssuingBscResponse,
            Self::Plg => MetaType::IssuingPlgResponse,
            Self::Ftm => MetaType::IssuingFtmResponse,
            Self::Aurora => MetaType::IssuingAuroraResponse,
            Self::Avax => MetaType::IssuingAvaxResponse,
        }
    }

    /// Network served by a shielding request kind
    pub fn from_request_meta(meta: MetaType) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.request_meta() == meta)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Eth => "eth",
            Self::Bsc => "bsc",
            Self::Plg => "plg",
            Self::Ftm => "ftm",
            Self::Aurora => "aurora",
            Self::Avax => "avax",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.name().eq_ignore_ascii_case(s))
    }

    /// External token id of a token address on this network
    pub fn external_token_id(self, token: &Address) -> ExternalTokenId {
        let mut bytes = self.prefix().as_bytes().to_vec();
        bytes.extend_from_slice(token.as_slice());
        ExternalTokenId::new(bytes)
    }

    /// Whether an external token id denotes the network's native coin
    pub fn is_native_token(self, token: &ExternalTokenId) -> bool {
        token.as_bytes() == self.external_token_id(&Address::from(constants::NATIVE_TOKEN_ADDRESS)).as_bytes()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved verification parameters for one network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    /// Vault contract emitting shield events
    pub contract_address: Address,
    /// Minimum depth below the head
    pub confirmations: u64,
    pub strip_typed_receipt: bool,
}

impl NetworkParams {
    /// Parameters with the network's defaults
    pub fn new(network: Network, contract_address: Address) -> Self {
        Self {
            network,
            contract_address,
            confirmations: network.default_confirmations(),
            strip_typed_receipt: network.strips_typed_receipt(),
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }
}

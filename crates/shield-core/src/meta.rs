//! Metadata type tags
//!
//! Every request, response and instruction carries a numeric type tag. The set
//! below is closed: tags outside it still appear in instruction lists (other
//! subsystems share the same list) but never match a shielding family.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Known metadata kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum MetaType {
    // === Centralized issuance ===
    IssuingRequest,
    IssuingResponse,

    // === EVM bridges ===
    IssuingEthRequest,
    IssuingEthResponse,
    IssuingBscRequest,
    IssuingBscResponse,
    IssuingPlgRequest,
    IssuingPlgResponse,
    IssuingFtmRequest,
    IssuingFtmResponse,
    IssuingAuroraRequest,
    IssuingAuroraResponse,
    IssuingAvaxRequest,
    IssuingAvaxResponse,

    // === Wasm bridge ===
    IssuingNearRequest,
    IssuingNearResponse,

    // === RPC-trust bridge ===
    IssuingSolanaRequest,
    IssuingSolanaResponse,

    // === Exchange ===
    PdeTradeRequest,
    PdeTradeResponse,
    PdeWithdrawalRequest,
    PdeWithdrawalResponse,

    // === Portal ===
    PortalShieldingRequest,
    PortalShieldingResponse,
    PortalUnshieldRequest,
    PortalUnshieldResponse,
}

/// Transaction shape required for a metadata kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaInfo {
    /// Whether the transaction may spend inputs
    pub has_input: bool,
    /// Whether the transaction creates outputs
    pub has_output: bool,
}

impl MetaType {
    /// All known kinds
    pub const ALL: [MetaType; 26] = [
        Self::IssuingRequest,
        Self::IssuingResponse,
        Self::IssuingEthRequest,
        Self::IssuingEthResponse,
        Self::IssuingBscRequest,
        Self::IssuingBscResponse,
        Self::IssuingPlgRequest,
        Self::IssuingPlgResponse,
        Self::IssuingFtmRequest,
        Self::IssuingFtmResponse,
        Self::IssuingAuroraRequest,
        Self::IssuingAuroraResponse,
        Self::IssuingAvaxRequest,
        Self::IssuingAvaxResponse,
        Self::IssuingNearRequest,
        Self::IssuingNearResponse,
        Self::IssuingSolanaRequest,
        Self::IssuingSolanaResponse,
        Self::PdeTradeRequest,
        Self::PdeTradeResponse,
        Self::PdeWithdrawalRequest,
        Self::PdeWithdrawalResponse,
        Self::PortalShieldingRequest,
        Self::PortalShieldingResponse,
        Self::PortalUnshieldRequest,
        Self::PortalUnshieldResponse,
    ];

    pub fn as_u16(self) -> u16 {
        match self {
            Self::IssuingRequest => 24,
            Self::IssuingResponse => 25,
            Self::IssuingEthRequest => 80,
            Self::IssuingEthResponse => 81,
            Self::PdeTradeRequest => 91,
            Self::PdeTradeResponse => 92,
            Self::PdeWithdrawalRequest => 93,
            Self::PdeWithdrawalResponse => 94,
            Self::PortalShieldingRequest => 260,
            Self::PortalShieldingResponse => 261,
            Self::PortalUnshieldRequest => 262,
            Self::PortalUnshieldResponse => 263,
            Self::IssuingBscRequest => 270,
            Self::IssuingBscResponse => 271,
            Self::IssuingPlgRequest => 280,
            Self::IssuingPlgResponse => 281,
            Self::IssuingFtmRequest => 282,
            Self::IssuingFtmResponse => 283,
            Self::IssuingAuroraRequest => 284,
            Self::IssuingAuroraResponse => 285,
            Self::IssuingAvaxRequest => 286,
            Self::IssuingAvaxResponse => 287,
            Self::IssuingNearRequest => 288,
            Self::IssuingNearResponse => 289,
            Self::IssuingSolanaRequest => 290,
            Self::IssuingSolanaResponse => 291,
        }
    }

    pub fn from_u16(tag: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_u16() == tag)
    }

    /// Parse the decimal form used in the instruction wire tuple
    pub fn parse(s: &str) -> Result<Self> {
        let tag = s
            .parse::<u16>()
            .map_err(|_| CoreError::InvalidMetaType(s.to_string()))?;
        Self::from_u16(tag).ok_or(CoreError::UnknownMetaType(tag))
    }

    /// Response kinds mint value and are created by block producers
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::IssuingResponse
                | Self::IssuingEthResponse
                | Self::IssuingBscResponse
                | Self::IssuingPlgResponse
                | Self::IssuingFtmResponse
                | Self::IssuingAuroraResponse
                | Self::IssuingAvaxResponse
                | Self::IssuingNearResponse
                | Self::IssuingSolanaResponse
                | Self::PdeTradeResponse
                | Self::PdeWithdrawalResponse
                | Self::PortalShieldingResponse
                | Self::PortalUnshieldResponse
        )
    }

    /// Requests that carry an EVM receipt proof
    ///
    /// Aurora requests name a transaction hash instead; their receipt is
    /// cross-checked against the NEAR chain.
    pub fn is_evm_shield_request(self) -> bool {
        matches!(
            self,
            Self::IssuingEthRequest
                | Self::IssuingBscRequest
                | Self::IssuingPlgRequest
                | Self::IssuingFtmRequest
                | Self::IssuingAvaxRequest
        )
    }

    /// Shape a transaction of this kind must have
    pub fn info(self) -> MetaInfo {
        if self.is_response() {
            MetaInfo {
                has_input: false,
                has_output: true,
            }
        } else {
            MetaInfo {
                has_input: true,
                has_output: true,
            }
        }
    }
}

impl From<MetaType> for u16 {
    fn from(m: MetaType) -> u16 {
        m.as_u16()
    }
}

impl TryFrom<u16> for MetaType {
    type Error = CoreError;

    fn try_from(tag: u16) -> Result<Self> {
        Self::from_u16(tag).ok_or(CoreError::UnknownMetaType(tag))
    }
}

impl std::fmt::Display for MetaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

//! Response kinds and the instructions each may consume
//!
//! Every response kind answers one request family. Its strategy names the
//! request meta types and statuses it accepts, turns decoded content into the
//! mint it authorizes, and says whether claims must carry a uniqueness token.

use shield_core::{InstructionContent, InstructionStatus, MetaType, UniquenessToken};

use crate::mint::MintDescriptor;

/// Closed set of response families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Centralized issuance
    Issuing,
    /// EVM bridge shield; holds the request kind of the network
    IssuingEvm { request: MetaType },
    /// NEAR vault shield
    IssuingWasm,
    IssuingSolana,
    PdeTrade,
    PdeWithdrawal,
    PortalShielding,
    PortalUnshield,
}

const ACCEPTED: &[InstructionStatus] = &[InstructionStatus::Accepted];
const REFUND: &[InstructionStatus] = &[InstructionStatus::Refund];
const ACCEPTED_OR_REFUND: &[InstructionStatus] = &[InstructionStatus::Accepted, InstructionStatus::Refund];

impl ResponseKind {
    /// Kind answered by a response meta type
    pub fn from_response_meta(meta: MetaType) -> Option<Self> {
        use MetaType::*;
        let kind = match meta {
            IssuingResponse => Self::Issuing,
            IssuingEthResponse => Self::IssuingEvm { request: IssuingEthRequest },
            IssuingBscResponse => Self::IssuingEvm { request: IssuingBscRequest },
            IssuingPlgResponse => Self::IssuingEvm { request: IssuingPlgRequest },
            IssuingFtmResponse => Self::IssuingEvm { request: IssuingFtmRequest },
            IssuingAuroraResponse => Self::IssuingEvm {
                request: IssuingAuroraRequest,
            },
            IssuingAvaxResponse => Self::IssuingEvm { request: IssuingAvaxRequest },
            IssuingNearResponse => Self::IssuingWasm,
            IssuingSolanaResponse => Self::IssuingSolana,
            PdeTradeResponse => Self::PdeTrade,
            PdeWithdrawalResponse => Self::PdeWithdrawal,
            PortalShieldingResponse => Self::PortalShielding,
            PortalUnshieldResponse => Self::PortalUnshield,
            _ => return None,
        };
        Some(kind)
    }

    /// Request kind whose instructions this response consumes
    pub fn request_meta(self) -> MetaType {
        match self {
            Self::Issuing => MetaType::IssuingRequest,
            Self::IssuingEvm { request } => request,
            Self::IssuingWasm => MetaType::IssuingNearRequest,
            Self::IssuingSolana => MetaType::IssuingSolanaRequest,
            Self::PdeTrade => MetaType::PdeTradeRequest,
            Self::PdeWithdrawal => MetaType::PdeWithdrawalRequest,
            Self::PortalShielding => MetaType::PortalShieldingRequest,
            Self::PortalUnshield => MetaType::PortalUnshieldRequest,
        }
    }

    /// Whether an instruction tag belongs to this family
    pub fn accepts_meta(self, tag: u16) -> bool {
        self.request_meta().as_u16() == tag
    }

    pub fn accepted_statuses(self) -> &'static [InstructionStatus] {
        match self {
            Self::PdeTrade => ACCEPTED_OR_REFUND,
            Self::PortalUnshield => REFUND,
            _ => ACCEPTED,
        }
    }

    pub fn accepts_status(self, status: &str) -> bool {
        self.accepted_statuses().iter().any(|s| s.as_str() == status)
    }

    /// External deposits must name the deposit they mint for
    pub fn requires_uniqueness(self) -> bool {
        matches!(self, Self::IssuingEvm { .. } | Self::IssuingWasm | Self::IssuingSolana)
    }

    /// Mint authorized by decoded content, if any
    pub fn authorized_mint(self, content: &InstructionContent) -> Option<MintDescriptor> {
        match content {
            InstructionContent::Accepted(c) if self.accepted_statuses().contains(&InstructionStatus::Accepted) => {
                Some(MintDescriptor::new(c.receiver.clone(), c.token_id, c.amount))
            }
            InstructionContent::Refunded(c) if self.accepted_statuses().contains(&InstructionStatus::Refund) => {
                Some(MintDescriptor::new(c.receiver.clone(), c.token_id, c.amount))
            }
            _ => None,
        }
    }

    /// Uniqueness token recorded in content
    pub fn content_uniqueness(content: &InstructionContent) -> Option<&UniquenessToken> {
        match content {
            InstructionContent::Accepted(c) => c.uniqueness_token.as_ref(),
            _ => None,
        }
    }
}

//! # Shield Consensus
//!
//! Ensures every mint in a block is backed by exactly one beacon instruction.
//!
//! A block's instructions are loaded into an [`InstructionLedger`]. Each
//! response transaction is turned into a [`ResponseClaim`] and matched by the
//! [`MatchConsumeEngine`]; a match consumes the instruction so no second
//! response can use it.
//!
//! ## Flow
//!
//! ```text
//!   block ──► BlockValidator ──► ResponseClaim ──► MatchConsumeEngine ──► ledger bit set
//!                                                        │
//!                                          MintDescriptorValidator
//! ```

pub mod block;
pub mod engine;
pub mod error;
pub mod family;
pub mod ledger;
pub mod mint;

pub use block::BlockValidator;
pub use engine::MatchConsumeEngine;
pub use error::*;
pub use family::ResponseKind;
pub use ledger::{ConsumptionReport, InstructionLedger};
pub use mint::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::block::BlockValidator;
    pub use crate::engine::MatchConsumeEngine;
    pub use crate::error::{BlockError, MatchError};
    pub use crate::family::ResponseKind;
    pub use crate::ledger::InstructionLedger;
    pub use crate::mint::{MintDescriptor, MintDescriptorValidator, MintTransaction, ResponseClaim};
}

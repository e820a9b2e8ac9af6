//! # Shield Core
//!
//! Core data structures for the shielding bridge.
//!
//! This crate provides the values every other layer agrees on:
//! - `Instruction` - the beacon record `[metaType, shardID, status, content]`
//! - `InstructionCodec` - canonical encode/decode of instruction content
//! - `MetaType` - the closed set of request/response kinds
//! - request and response metadata with a shared `MetadataBase`
//!
//! ## Flow
//!
//! ```text
//!   request tx ──► proof verified ──► InstructionCodec::encode ──► Instruction
//!                                                                      │
//!   response tx ◄── matched & consumed ◄── InstructionCodec::decode ◄──┘
//! ```

pub mod codec;
pub mod error;
pub mod instruction;
pub mod meta;
pub mod metadata;
pub mod types;

pub use codec::*;
pub use error::*;
pub use instruction::*;
pub use meta::*;
pub use metadata::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{InstructionCodec, InstructionContent};
    pub use crate::error::{CoreError, Result};
    pub use crate::instruction::{Instruction, InstructionStatus};
    pub use crate::meta::MetaType;
    pub use crate::metadata::{MetadataBase, ResponseMetadata};
    pub use crate::types::*;
}

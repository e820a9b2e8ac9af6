//! EVM receipt decoding
//!
//! A receipt leaf is `rlp([status, cumulativeGasUsed, logsBloom, logs])`,
//! optionally preceded by an EIP-2718 type byte.

use alloy_primitives::{Address, Bytes, B256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};

use crate::error::{Result, VerifyError};

/// Type bytes of typed receipts (access list, dynamic fee, blob, set-code)
pub const TYPED_RECEIPT_TYPES: std::ops::RangeInclusive<u8> = 0x01..=0x04;

/// One log entry
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct EvmLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Receipt body in consensus encoding
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct RawReceipt {
    /// `[1]` on success, empty on failure, or a 32-byte pre-Byzantium state root
    pub status: Bytes,
    pub cumulative_gas_used: u64,
    pub logs_bloom: Bytes,
    pub logs: Vec<EvmLog>,
}

/// Outcome recorded in a receipt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
    /// Pre-Byzantium post-state root; carries no outcome
    PostState,
}

impl RawReceipt {
    pub fn status(&self) -> ReceiptStatus {
        match self.status.as_ref() {
            [1] => ReceiptStatus::Success,
            s if s.len() == 32 => ReceiptStatus::PostState,
            _ => ReceiptStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ReceiptStatus::Success
    }
}

/// Decode a receipt leaf, removing the type byte when `strip_typed` is set
pub fn decode_receipt(raw: &[u8], strip_typed: bool) -> Result<RawReceipt> {
    let Some(&first) = raw.first() else {
        return Err(VerifyError::MalformedReceipt("empty receipt".into()));
    };
    let mut body = if strip_typed && TYPED_RECEIPT_TYPES.contains(&first) {
        &raw[1..]
    } else {
        raw
    };

    let receipt = RawReceipt::decode(&mut body).map_err(|e| VerifyError::MalformedReceipt(e.to_string()))?;
    if !body.is_empty() {
        return Err(VerifyError::MalformedReceipt(format!("{} trailing bytes", body.len())));
    }
    Ok(receipt)
}

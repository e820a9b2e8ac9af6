//! Vault contract events
//!
//! `Deposit` credits a payment address; `Redeposit` credits a one-time
//! receiver and carries its own uniqueness token (`itx`). Amounts of the
//! native coin are emitted in wei and converted to nano units.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use serde::{Deserialize, Serialize};
use shield_core::{constants, ExternalTokenId, ReceiverDescriptor, UniquenessToken};
use std::fmt;

use crate::error::{Result, VerifyError};
use crate::network::Network;
use crate::receipt::{EvmLog, RawReceipt};

sol! {
    /// Emitted by the vault for a shield to a payment address
    event Deposit(address token, string incognitoAddress, uint256 amount);

    /// Emitted by the vault for a shield to a one-time receiver
    event Redeposit(address token, bytes redepositIncAddress, uint256 amount, bytes32 itx);
}

/// Which vault event a proof attests to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    Deposit,
    Redeposit,
}

impl VaultEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Redeposit => "Redeposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Deposit, Self::Redeposit].into_iter().find(|e| e.name() == s)
    }

    /// Keccak-256 of the canonical event signature
    pub fn topic(self) -> B256 {
        match self {
            Self::Deposit => Deposit::SIGNATURE_HASH,
            Self::Redeposit => Redeposit::SIGNATURE_HASH,
        }
    }
}

impl fmt::Display for VaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One shield credited by an external transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldEvent {
    pub receiver: ReceiverDescriptor,
    /// Amount in internal (nano) units
    pub amount: u64,
    pub external_token_id: ExternalTokenId,
    /// Receiver is a one-time address
    pub one_time: bool,
    /// Token replacing the transaction-level uniqueness token
    pub uniqueness_token: Option<UniquenessToken>,
}

impl ShieldEvent {
    /// Byte the receiver's shard is derived from. One-time receivers are
    /// base58 OTA receivers whose public key ends at byte 32.
    pub fn shard_byte(&self) -> Option<u8> {
        if self.one_time {
            let raw = bs58::decode(self.receiver.as_str()).into_vec().ok()?;
            return raw.get(OTA_PUBLIC_KEY_LEN - 1).copied();
        }
        self.receiver.as_str().as_bytes().last().copied()
    }
}

/// Length of the public key leading an OTA receiver
pub const OTA_PUBLIC_KEY_LEN: usize = 32;

/// Convert an event amount to internal units
pub fn to_internal_amount(token: &Address, amount: U256) -> Result<u64> {
    let amount = if token.as_slice() == constants::NATIVE_TOKEN_ADDRESS {
        amount / U256::from(constants::WEI_PER_NANO)
    } else {
        amount
    };
    u64::try_from(amount).map_err(|_| VerifyError::AmountOutOfRange(amount.to_string()))
}

fn decode_log<E: SolEvent>(log: &EvmLog) -> Result<E> {
    E::decode_raw_log(log.topics.iter().copied(), &log.data)
        .map_err(|e| VerifyError::EventNotFound(format!("{}: {e}", E::SIGNATURE)))
}

fn deposit_event(log: &EvmLog, network: Network) -> Result<ShieldEvent> {
    let event: Deposit = decode_log(log)?;
    if event.incognitoAddress.is_empty() {
        return Err(VerifyError::EventNotFound("Deposit with empty receiver".into()));
    }
    Ok(ShieldEvent {
        receiver: ReceiverDescriptor::new(event.incognitoAddress),
        amount: to_internal_amount(&event.token, event.amount)?,
        external_token_id: network.external_token_id(&event.token),
        one_time: false,
        uniqueness_token: None,
    })
}

fn redeposit_event(log: &EvmLog, network: Network) -> Result<ShieldEvent> {
    let event: Redeposit = decode_log(log)?;
    if event.redepositIncAddress.len() < OTA_PUBLIC_KEY_LEN {
        return Err(VerifyError::EventNotFound(format!(
            "Redeposit receiver of {} bytes",
            event.redepositIncAddress.len()
        )));
    }
    Ok(ShieldEvent {
        receiver: ReceiverDescriptor::new(bs58::encode(&event.redepositIncAddress).into_string()),
        amount: to_internal_amount(&event.token, event.amount)?,
        external_token_id: network.external_token_id(&event.token),
        one_time: true,
        uniqueness_token: Some(UniquenessToken::new(event.itx.to_vec())),
    })
}

/// Shield events of `kind` emitted by `contract` in a receipt.
///
/// `Deposit` yields the first matching log; `Redeposit` yields every one.
pub fn extract_events(
    receipt: &RawReceipt,
    contract: &Address,
    kind: VaultEvent,
    network: Network,
) -> Result<Vec<ShieldEvent>> {
    extract_log_events(&receipt.logs, contract, kind, network)
}

/// [`extract_events`] over bare logs
pub fn extract_log_events(
    logs: &[EvmLog],
    contract: &Address,
    kind: VaultEvent,
    network: Network,
) -> Result<Vec<ShieldEvent>> {
    let topic = kind.topic();
    let mut logs = logs
        .iter()
        .filter(|log| log.address == *contract && log.topics.first() == Some(&topic));
    let events = match kind {
        VaultEvent::Deposit => match logs.next() {
            Some(log) => vec![deposit_event(log, network)?],
            None => Vec::new(),
        },
        VaultEvent::Redeposit => logs.map(|log| redeposit_event(log, network)).collect::<Result<_>>()?,
    };
    if events.is_empty() {
        return Err(VerifyError::EventNotFound(format!("no {kind} log from {contract}")));
    }
    Ok(events)
}

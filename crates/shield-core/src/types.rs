//! Core type definitions shared by verifiers, the codec and the consensus engine

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{CoreError, Result};

/// Hash - 256-bit identifier for transactions and tokens
///
/// Serialized as a lowercase hex string so instruction content stays canonical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash {
    bytes: [u8; 32],
}

/// Identifier of a request or response transaction
pub type TxHash = Hash;

/// Identifier of an internal token
pub type TokenId = Hash;

impl Hash {
    /// Zero hash
    pub const ZERO: Self = Self { bytes: [0u8; 32] };

    /// Create a new Hash from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Create a Hash from content using BLAKE3
    pub fn from_content(content: &[u8]) -> Self {
        Self {
            bytes: *blake3::hash(content).as_bytes(),
        }
    }

    /// Create a Hash from a slice, which must be exactly 32 bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| CoreError::InvalidLength {
            expected: 32,
            got: slice.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_slice(&bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// ShardId - index of the shard a transaction or receiver belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub u8);

impl ShardId {
    /// Parse the decimal form used in the instruction wire tuple
    pub fn parse(s: &str) -> Result<Self> {
        s.parse::<u8>()
            .map(Self)
            .map_err(|_| CoreError::InvalidShard(s.to_string()))
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recipient of minted value: a payment address or a one-time (OTA) receiver string
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverDescriptor(String);

impl ReceiverDescriptor {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReceiverDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared random a response transaction publishes so the receiver can open a stealth coin
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StealthNonce([u8; 32]);

impl StealthNonce {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for StealthNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StealthNonce({})", &hex::encode(self.0)[..16])
    }
}

impl Serialize for StealthNonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for StealthNonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hash = Hash::deserialize(deserializer)?;
        Ok(Self(*hash.as_bytes()))
    }
}

/// Declares a variable-length byte newtype serialized as hex
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                hex::decode(s).map(Self).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// Token that makes one external deposit mintable only once (`block_hash || tx_index` on EVM chains)
    UniquenessToken
);

hex_bytes!(
    /// External token identifier: network prefix followed by the foreign token address
    ExternalTokenId
);

hex_bytes!(
    /// Signature carried by transaction metadata
    Signature
);

/// Protocol constants
pub mod constants {
    use super::Hash;

    /// Token id of the native privacy coin, which bridges never mint
    pub const PRV_TOKEN_ID: Hash = Hash::new([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 4,
    ]);

    /// Address used by EVM vault contracts for the chain's native coin
    pub const NATIVE_TOKEN_ADDRESS: [u8; 20] = [0u8; 20];

    /// Length of an un-prefixed external token address
    pub const EXTERNAL_TOKEN_ADDRESS_LEN: usize = 20;

    /// Divisor converting native wei amounts (10^18) to nano units (10^9)
    pub const WEI_PER_NANO: u64 = 1_000_000_000;

    /// Default number of shards
    pub const DEFAULT_NUM_SHARDS: u8 = 8;
}

//! Bridge configuration types
//!
//! Loaded from a TOML file with `SHIELD__`-prefixed environment overrides,
//! e.g. `SHIELD__NETWORKS__ETH__CONFIRMATIONS=30`.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use shield_core::constants::DEFAULT_NUM_SHARDS;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::near::DEFAULT_SENDER_ACCOUNT;
use crate::network::{Network, NetworkParams};

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        Self::Load(err.to_string())
    }
}

/// Complete bridge configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Number of shards receivers are spread over
    #[serde(default = "default_num_shards")]
    pub num_shards: u8,

    /// Per-network settings for the EVM bridges, keyed by network name
    #[serde(default)]
    pub networks: BTreeMap<String, EvmNetworkConfig>,

    /// RPC-trust bridge settings
    #[serde(default)]
    pub solana: SolanaConfig,

    /// NEAR vault settings, also used to anchor Aurora deposits
    #[serde(default)]
    pub near: NearConfig,

    /// Oracle client settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_num_shards() -> u8 {
    DEFAULT_NUM_SHARDS
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            num_shards: default_num_shards(),
            networks: BTreeMap::new(),
            solana: SolanaConfig::default(),
            near: NearConfig::default(),
            oracle: OracleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings for one EVM network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvmNetworkConfig {
    /// Redundant RPC hosts, queried in order
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Vault contract address (hex)
    pub contract_address: String,

    /// Overrides the network's default confirmation depth
    #[serde(default)]
    pub confirmations: Option<u64>,

    /// Overrides whether typed receipt envelopes are stripped
    #[serde(default)]
    pub strip_typed_receipt: Option<bool>,
}

/// RPC-trust chain settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// Single trusted RPC host
    #[serde(default = "default_solana_host")]
    pub host: String,

    /// Bridge program address (base58)
    #[serde(default)]
    pub program_address: String,

    /// Position of the designated bridge account in the shield instruction
    #[serde(default = "default_vault_account_slot")]
    pub vault_account_slot: usize,

    /// Position of the depositor's token account in the shield instruction
    #[serde(default = "default_source_token_slot")]
    pub source_token_slot: usize,
}

fn default_solana_host() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

fn default_vault_account_slot() -> usize {
    2
}

fn default_source_token_slot() -> usize {
    1
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            host: default_solana_host(),
            program_address: String::new(),
            vault_account_slot: default_vault_account_slot(),
            source_token_slot: default_source_token_slot(),
        }
    }
}

/// NEAR chain settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearConfig {
    /// Redundant RPC hosts, queried in order
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Vault contract account
    #[serde(default)]
    pub contract_id: String,

    /// Blocks required below the final block
    #[serde(default = "default_near_confirmations")]
    pub confirmations: u64,

    /// Account transaction status is queried as
    #[serde(default = "default_sender_account")]
    pub sender_account: String,
}

fn default_near_confirmations() -> u64 {
    5
}

fn default_sender_account() -> String {
    DEFAULT_SENDER_ACCOUNT.to_string()
}

impl Default for NearConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            contract_id: String::new(),
            confirmations: default_near_confirmations(),
            sender_account: default_sender_account(),
        }
    }
}

/// Oracle client settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BridgeConfig {
    /// Load a TOML file layered under environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SHIELD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML text without environment overrides
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_shards == 0 {
            return Err(ConfigError::Invalid("num_shards must be positive".into()));
        }
        for (name, net) in &self.networks {
            if Network::parse(name).is_none() {
                return Err(ConfigError::Invalid(format!("unknown network {name}")));
            }
            parse_address(&net.contract_address)
                .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
        }
        Ok(())
    }

    /// Verification parameters for a configured network
    pub fn network_params(&self, network: Network) -> Result<NetworkParams, ConfigError> {
        let net = self
            .networks
            .get(network.name())
            .ok_or_else(|| ConfigError::Invalid(format!("network {network} is not configured")))?;
        let address = parse_address(&net.contract_address)?;
        let mut params = NetworkParams::new(network, address);
        if let Some(confirmations) = net.confirmations {
            params.confirmations = confirmations;
        }
        if let Some(strip) = net.strip_typed_receipt {
            params.strip_typed_receipt = strip;
        }
        Ok(params)
    }

    /// Oracle hosts of a configured network
    pub fn hosts(&self, network: Network) -> Vec<String> {
        self.networks
            .get(network.name())
            .map(|n| n.hosts.clone())
            .unwrap_or_default()
    }
}

fn parse_address(s: &str) -> Result<Address, ConfigError> {
    s.parse::<Address>()
        .map_err(|e| ConfigError::Invalid(format!("contract address {s}: {e}")))
}

//! Shield CLI
//!
//! Verifies external deposit proofs against live oracles and decodes beacon
//! instructions.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use shield_bridge::common::{DecodedReceipt, EvmProofWire};
use shield_bridge::{
    AuroraProof, AuroraProofVerifier, BridgeConfig, EvmProofVerifier, JsonRpcEvmOracle, JsonRpcNearOracle,
    JsonRpcSolanaOracle, NearParams, Network, SolanaParams, SolanaProof, SolanaProofVerifier, VaultEvent,
    WasmProof, WasmProofVerifier,
};
use shield_core::{Hash, Instruction, InstructionCodec, InstructionContent, MetaType};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "shield")]
#[command(version)]
#[command(about = "Shielding bridge proof verifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "shield.toml", env = "SHIELD_CONFIG")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an EVM receipt proof
    VerifyEvm {
        /// Proof JSON file
        proof: PathBuf,
    },

    /// Verify a Solana shield transaction
    VerifySolana {
        /// Transaction signature (base58)
        signature: String,

        /// Program address; defaults to the configured one
        #[arg(long)]
        program: Option<String>,
    },

    /// Verify a deposit to the NEAR vault contract
    VerifyNear {
        /// Transaction hash (base58)
        tx_hash: String,
    },

    /// Verify an Aurora deposit against its NEAR execution
    VerifyAurora {
        /// Transaction hash (hex)
        tx_hash: String,
    },

    /// Decode a `[metaType, shardID, status, content]` instruction
    DecodeInstruction {
        /// Instruction as a JSON array of four strings
        instruction: String,
    },

    /// Print the effective configuration
    Config,
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
        }))
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    if path.exists() {
        BridgeConfig::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(BridgeConfig::default())
    }
}

fn receipt_json(receipt: &DecodedReceipt) -> serde_json::Value {
    let events: Vec<_> = receipt
        .events
        .iter()
        .map(|e| {
            json!({
                "receiver": e.receiver.as_str(),
                "amount": e.amount,
                "externalTokenId": e.external_token_id.to_hex(),
                "oneTime": e.one_time,
            })
        })
        .collect();
    json!({
        "blockNumber": receipt.block_number,
        "uniquenessToken": receipt.uniqueness_token.to_hex(),
        "events": events,
    })
}

fn content_json(content: &InstructionContent) -> anyhow::Result<serde_json::Value> {
    let value = match content {
        InstructionContent::Accepted(c) => serde_json::to_value(c)?,
        InstructionContent::Rejected(c) => serde_json::to_value(c)?,
        InstructionContent::Refunded(c) => serde_json::to_value(c)?,
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(cli.verbose, config.logging.json);

    match cli.command {
        Commands::VerifyEvm { proof } => {
            let raw = std::fs::read_to_string(&proof).with_context(|| format!("reading {}", proof.display()))?;
            let wire: EvmProofWire = serde_json::from_str(&raw)?;
            let proof = wire.into_proof()?;

            let params = config.network_params(proof.network)?;
            let oracle = JsonRpcEvmOracle::new(config.hosts(proof.network), config.oracle.timeout())?;
            tracing::info!(network = %proof.network, block = %proof.block_hash, index = proof.tx_index, "Verifying receipt proof");

            let receipt = EvmProofVerifier::new(oracle, params).verify(&proof).await?;
            println!("{}", serde_json::to_string_pretty(&receipt_json(&receipt))?);
        }

        Commands::VerifySolana { signature, program } => {
            let params = SolanaParams::from(&config.solana);
            let proof = SolanaProof {
                tx_signature: signature,
                expected_program_address: program.unwrap_or_else(|| params.program_address.clone()),
            };
            let oracle = JsonRpcSolanaOracle::new(config.solana.host.clone(), config.oracle.timeout())?;
            tracing::info!(signature = %proof.tx_signature, "Verifying shield transaction");

            let receipt = SolanaProofVerifier::new(oracle, params).verify(&proof).await?;
            println!("{}", serde_json::to_string_pretty(&receipt_json(&receipt))?);
        }

        Commands::VerifyNear { tx_hash } => {
            let params = NearParams::from(&config.near);
            let proof = WasmProof {
                tx_hash,
                contract_id: params.contract_id.clone(),
            };
            let oracle = JsonRpcNearOracle::new(config.near.hosts.clone(), config.oracle.timeout())?;
            tracing::info!(tx = %proof.tx_hash, "Verifying NEAR shield");

            let receipt = WasmProofVerifier::new(oracle, params).verify(&proof).await?;
            println!("{}", serde_json::to_string_pretty(&receipt_json(&receipt))?);
        }

        Commands::VerifyAurora { tx_hash } => {
            let params = config.network_params(Network::Aurora)?;
            let proof = AuroraProof {
                tx_hash: Hash::from_hex(&tx_hash)?,
                required_confirmations: params.confirmations,
                contract_address: params.contract_address,
                event: VaultEvent::Deposit,
            };
            let evm = JsonRpcEvmOracle::new(config.hosts(Network::Aurora), config.oracle.timeout())?;
            let near = JsonRpcNearOracle::new(config.near.hosts.clone(), config.oracle.timeout())?;
            tracing::info!(tx = %proof.tx_hash, "Verifying Aurora shield");

            let receipt = AuroraProofVerifier::new(evm, near, params)
                .with_sender_account(config.near.sender_account.clone())
                .verify(&proof)
                .await?;
            println!("{}", serde_json::to_string_pretty(&receipt_json(&receipt))?);
        }

        Commands::DecodeInstruction { instruction } => {
            let fields: Vec<String> = serde_json::from_str(&instruction).context("instruction must be a JSON array")?;
            let instruction = Instruction::from_string_slice(&fields)?;
            let content = InstructionCodec::from_instruction(&instruction)?;

            let meta = MetaType::from_u16(instruction.meta_type)
                .map(|m| m.to_string())
                .unwrap_or_else(|| instruction.meta_type.to_string());
            let out = json!({
                "metaType": meta,
                "shardId": instruction.shard_id.0,
                "status": instruction.status,
                "content": content_json(&content)?,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

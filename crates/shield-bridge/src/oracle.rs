//! # External Chain Oracles
//!
//! Read-only views of external chains. The verifiers only see the
//! [`EvmOracle`] and [`SolanaOracle`] traits; the JSON-RPC clients below are
//! the production implementations.
//!
//! `JsonRpcEvmOracle` and `JsonRpcNearOracle` hold redundant hosts and return
//! the first successful answer. A host that fails (transport, HTTP status or
//! RPC error) is logged and the next one is tried. `JsonRpcSolanaOracle` talks
//! to a single host.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use shield_core::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::receipt::EvmLog;

// === EVM ===

/// Header fields the trie verifier needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvmHeader {
    pub hash: Hash,
    pub number: u64,
    pub receipts_root: Hash,
}

/// A header together with its position relative to the canonical chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderStatus {
    pub header: EvmHeader,
    /// The canonical block at `header.number` has `header.hash`
    pub canonical: bool,
}

/// View of one EVM chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvmOracle: Send + Sync {
    /// Header by hash; `None` if the chain does not know the block
    async fn header_by_hash(&self, hash: Hash) -> Result<Option<HeaderStatus>, OracleError>;

    /// Current head block number
    async fn block_number(&self) -> Result<u64, OracleError>;

    /// Receipt of a mined transaction; `None` if unknown
    async fn transaction_receipt(&self, tx_hash: Hash) -> Result<Option<TransactionReceipt>, OracleError>;
}

/// A receipt as served by `eth_getTransactionReceipt`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub block_hash: Hash,
    pub tx_index: u64,
    pub success: bool,
    pub logs: Vec<EvmLog>,
    /// Hex hash of the NEAR transaction that executed it (Aurora only)
    pub near_tx_hash: Option<String>,
}

// === NEAR ===

/// Block header fields the NEAR checks need
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearBlock {
    /// Base58
    pub hash: String,
    pub height: u64,
    /// Base58
    pub chunk_receipts_root: String,
}

/// Outcome of one receipt produced by a NEAR transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearReceiptOutcome {
    pub executor_id: String,
    pub logs: Vec<String>,
    pub failed: bool,
}

/// Final status of a NEAR transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearTxStatus {
    pub failed: bool,
    /// Block holding the transaction (base58)
    pub block_hash: String,
    pub receipts: Vec<NearReceiptOutcome>,
}

/// View of the NEAR chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NearOracle: Send + Sync {
    /// Status of a transaction signed by `sender`; `None` if unknown
    async fn tx_status(&self, tx_hash: &str, sender: &str) -> Result<Option<NearTxStatus>, OracleError>;

    async fn block_by_hash(&self, hash: &str) -> Result<Option<NearBlock>, OracleError>;

    async fn block_at_height(&self, height: u64) -> Result<Option<NearBlock>, OracleError>;

    /// Latest final block
    async fn final_block(&self) -> Result<NearBlock, OracleError>;
}

// === Solana ===

/// One account referenced by a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolanaAccountMeta {
    /// Base58 public key
    pub pubkey: String,
    pub writable: bool,
    pub signer: bool,
}

/// One compiled instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolanaInstruction {
    pub program_id_index: usize,
    /// Indices into the transaction's account list
    pub accounts: Vec<usize>,
    pub data: Vec<u8>,
}

/// A finalized transaction as reported by the RPC host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolanaTransaction {
    pub signature: String,
    pub slot: u64,
    pub account_keys: Vec<SolanaAccountMeta>,
    pub instructions: Vec<SolanaInstruction>,
    /// The runtime reported an execution error
    pub failed: bool,
}

impl SolanaTransaction {
    /// Account passed to `instruction` at position `slot`
    pub fn instruction_account(&self, instruction: &SolanaInstruction, slot: usize) -> Option<&SolanaAccountMeta> {
        instruction
            .accounts
            .get(slot)
            .and_then(|&index| self.account_keys.get(index))
    }

    pub fn program_id(&self, instruction: &SolanaInstruction) -> Option<&str> {
        self.account_keys
            .get(instruction.program_id_index)
            .map(|a| a.pubkey.as_str())
    }
}

/// View of the RPC-trust chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolanaOracle: Send + Sync {
    /// Finalized transaction by signature; `None` if unknown
    async fn transaction(&self, signature: &str) -> Result<Option<SolanaTransaction>, OracleError>;

    /// Mint of a token account; `None` if the account does not exist
    async fn token_account_mint(&self, account: &str) -> Result<Option<String>, OracleError>;
}

// === JSON-RPC transport ===

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Sends one JSON-RPC call to one host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// The call's `result`, or `Value::Null` when the host returned none
    async fn call_host(&self, host: &str, method: &str, params: &Value) -> Result<Value, OracleError>;
}

/// JSON-RPC 2.0 over HTTP
pub struct HttpRpcClient {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call_host(&self, host: &str, method: &str, params: &Value) -> Result<Value, OracleError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(host, method, id, "RPC call");

        let response: RpcResponse = self
            .client
            .post(host)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(OracleError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}

/// Ordered host fail-over over an [`RpcClient`]
struct RpcTransport {
    client: Box<dyn RpcClient>,
    hosts: Vec<String>,
}

impl RpcTransport {
    fn new(hosts: Vec<String>, client: Box<dyn RpcClient>) -> Result<Self, OracleError> {
        if hosts.is_empty() {
            return Err(OracleError::NoHosts);
        }
        Ok(Self { client, hosts })
    }

    /// Call `method` on each host in turn; `Value::Null` for a null result
    async fn call(&self, method: &str, params: Value) -> Result<Value, OracleError> {
        let mut last = None;
        for host in &self.hosts {
            match self.client.call_host(host, method, &params).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(host = %host, method, error = %e, "Oracle host failed");
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) if self.hosts.len() == 1 => Err(e),
            Some(e) => Err(OracleError::AllHostsFailed {
                hosts: self.hosts.len(),
                last: e.to_string(),
            }),
            None => Err(OracleError::NoHosts),
        }
    }
}

fn invalid(msg: impl Into<String>) -> OracleError {
    OracleError::InvalidResponse(msg.into())
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(value: &Value) -> Result<u64, OracleError> {
    let s = value.as_str().ok_or_else(|| invalid("quantity is not a string"))?;
    let digits = s.strip_prefix("0x").ok_or_else(|| invalid(format!("quantity {s} lacks 0x")))?;
    u64::from_str_radix(digits, 16).map_err(|e| invalid(format!("quantity {s}: {e}")))
}

fn parse_hash_field(block: &Value, field: &str) -> Result<Hash, OracleError> {
    let s = block
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("block has no {field}")))?;
    Hash::from_hex(s).map_err(|e| invalid(format!("{field}: {e}")))
}

fn parse_header(block: &Value) -> Result<EvmHeader, OracleError> {
    let number = block.get("number").ok_or_else(|| invalid("block has no number"))?;
    Ok(EvmHeader {
        hash: parse_hash_field(block, "hash")?,
        number: parse_quantity(number)?,
        receipts_root: parse_hash_field(block, "receiptsRoot")?,
    })
}

fn parse_log(log: &Value) -> Result<EvmLog, OracleError> {
    let field = |name: &str| {
        log.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("log has no {name}")))
    };
    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("log has no topics"))?
        .iter()
        .map(|t| {
            t.as_str()
                .and_then(|t| t.parse::<B256>().ok())
                .ok_or_else(|| invalid(format!("bad topic {t}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EvmLog {
        address: field("address")?
            .parse::<Address>()
            .map_err(|e| invalid(format!("log address: {e}")))?,
        topics,
        data: field("data")?
            .parse::<Bytes>()
            .map_err(|e| invalid(format!("log data: {e}")))?,
    })
}

fn parse_receipt(receipt: &Value) -> Result<TransactionReceipt, OracleError> {
    let quantity = |name: &str| {
        receipt
            .get(name)
            .ok_or_else(|| invalid(format!("receipt has no {name}")))
            .and_then(parse_quantity)
    };
    let logs = receipt
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| logs.iter().map(parse_log).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();
    Ok(TransactionReceipt {
        block_hash: parse_hash_field(receipt, "blockHash")?,
        tx_index: quantity("transactionIndex")?,
        success: quantity("status")? == 1,
        logs,
        near_tx_hash: receipt
            .get("nearTransactionHash")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(str::to_string),
    })
}

// === JSON-RPC EVM oracle ===

/// EVM oracle backed by redundant JSON-RPC hosts
pub struct JsonRpcEvmOracle {
    transport: RpcTransport,
}

impl JsonRpcEvmOracle {
    pub fn new(hosts: Vec<String>, timeout: Duration) -> Result<Self, OracleError> {
        Self::with_client(hosts, HttpRpcClient::new(timeout)?)
    }

    /// Oracle over a caller-supplied client
    pub fn with_client(hosts: Vec<String>, client: impl RpcClient + 'static) -> Result<Self, OracleError> {
        Ok(Self {
            transport: RpcTransport::new(hosts, Box::new(client))?,
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.transport.hosts
    }
}

#[async_trait]
impl EvmOracle for JsonRpcEvmOracle {
    async fn header_by_hash(&self, hash: Hash) -> Result<Option<HeaderStatus>, OracleError> {
        let block = self
            .transport
            .call("eth_getBlockByHash", json!([format!("0x{}", hash.to_hex()), false]))
            .await?;
        if block.is_null() {
            return Ok(None);
        }
        let header = parse_header(&block)?;
        if header.hash != hash {
            return Err(invalid("host returned a different block"));
        }

        let by_number = self
            .transport
            .call("eth_getBlockByNumber", json!([format!("0x{:x}", header.number), false]))
            .await?;
        let canonical = if by_number.is_null() {
            false
        } else {
            parse_hash_field(&by_number, "hash")? == header.hash
        };

        Ok(Some(HeaderStatus { header, canonical }))
    }

    async fn block_number(&self) -> Result<u64, OracleError> {
        let head = self.transport.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&head)
    }

    async fn transaction_receipt(&self, tx_hash: Hash) -> Result<Option<TransactionReceipt>, OracleError> {
        let receipt = self
            .transport
            .call("eth_getTransactionReceipt", json!([format!("0x{}", tx_hash.to_hex())]))
            .await?;
        if receipt.is_null() {
            return Ok(None);
        }
        parse_receipt(&receipt).map(Some)
    }
}

// === JSON-RPC NEAR oracle ===

#[derive(Deserialize)]
struct RawNearTx {
    status: Value,
    transaction_outcome: RawNearTxOutcome,
    #[serde(default)]
    receipts_outcome: Vec<RawNearReceipt>,
}

#[derive(Deserialize)]
struct RawNearTxOutcome {
    block_hash: String,
}

#[derive(Deserialize)]
struct RawNearReceipt {
    outcome: RawNearOutcome,
}

#[derive(Deserialize)]
struct RawNearOutcome {
    executor_id: String,
    #[serde(default)]
    logs: Vec<String>,
    status: Value,
}

#[derive(Deserialize)]
struct RawNearBlock {
    header: RawNearHeader,
}

#[derive(Deserialize)]
struct RawNearHeader {
    hash: String,
    height: u64,
    chunk_receipts_root: String,
}

/// Execution statuses are `{"SuccessValue": ..}`, `{"SuccessReceiptId": ..}` or `{"Failure": ..}`
fn near_failed(status: &Value) -> bool {
    status.get("Failure").is_some()
}

impl From<RawNearTx> for NearTxStatus {
    fn from(raw: RawNearTx) -> Self {
        Self {
            failed: near_failed(&raw.status),
            block_hash: raw.transaction_outcome.block_hash,
            receipts: raw
                .receipts_outcome
                .into_iter()
                .map(|r| NearReceiptOutcome {
                    failed: near_failed(&r.outcome.status),
                    executor_id: r.outcome.executor_id,
                    logs: r.outcome.logs,
                })
                .collect(),
        }
    }
}

impl From<RawNearBlock> for NearBlock {
    fn from(raw: RawNearBlock) -> Self {
        Self {
            hash: raw.header.hash,
            height: raw.header.height,
            chunk_receipts_root: raw.header.chunk_receipts_root,
        }
    }
}

/// NEAR oracle backed by redundant JSON-RPC hosts
pub struct JsonRpcNearOracle {
    transport: RpcTransport,
}

impl JsonRpcNearOracle {
    pub fn new(hosts: Vec<String>, timeout: Duration) -> Result<Self, OracleError> {
        Self::with_client(hosts, HttpRpcClient::new(timeout)?)
    }

    /// Oracle over a caller-supplied client
    pub fn with_client(hosts: Vec<String>, client: impl RpcClient + 'static) -> Result<Self, OracleError> {
        Ok(Self {
            transport: RpcTransport::new(hosts, Box::new(client))?,
        })
    }

    async fn block(&self, params: Value) -> Result<Option<NearBlock>, OracleError> {
        let block = self.transport.call("block", params).await?;
        if block.is_null() {
            return Ok(None);
        }
        let raw: RawNearBlock = serde_json::from_value(block).map_err(|e| invalid(format!("block: {e}")))?;
        Ok(Some(raw.into()))
    }
}

#[async_trait]
impl NearOracle for JsonRpcNearOracle {
    async fn tx_status(&self, tx_hash: &str, sender: &str) -> Result<Option<NearTxStatus>, OracleError> {
        let tx = self.transport.call("tx", json!([tx_hash, sender])).await?;
        if tx.is_null() {
            return Ok(None);
        }
        let raw: RawNearTx = serde_json::from_value(tx).map_err(|e| invalid(format!("transaction: {e}")))?;
        Ok(Some(raw.into()))
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Option<NearBlock>, OracleError> {
        self.block(json!({ "block_id": hash })).await
    }

    async fn block_at_height(&self, height: u64) -> Result<Option<NearBlock>, OracleError> {
        self.block(json!({ "block_id": height })).await
    }

    async fn final_block(&self) -> Result<NearBlock, OracleError> {
        self.block(json!({ "finality": "final" }))
            .await?
            .ok_or_else(|| invalid("no final block"))
    }
}

// === JSON-RPC Solana oracle ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSolanaTransaction {
    slot: u64,
    meta: Option<RawTransactionMeta>,
    transaction: RawTransactionBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransactionMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    loaded_addresses: Option<RawLoadedAddresses>,
}

#[derive(Deserialize)]
struct RawLoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

#[derive(Deserialize)]
struct RawTransactionBody {
    signatures: Vec<String>,
    message: RawMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    account_keys: Vec<String>,
    header: RawMessageHeader,
    instructions: Vec<RawInstruction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessageHeader {
    num_required_signatures: usize,
    num_readonly_signed_accounts: usize,
    num_readonly_unsigned_accounts: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstruction {
    program_id_index: usize,
    accounts: Vec<usize>,
    data: String,
}

impl RawSolanaTransaction {
    fn into_transaction(self) -> Result<SolanaTransaction, OracleError> {
        let message = self.transaction.message;
        let header = message.header;
        let static_count = message.account_keys.len();
        let signed = header.num_required_signatures;
        if signed > static_count
            || header.num_readonly_signed_accounts > signed
            || header.num_readonly_unsigned_accounts > static_count - signed
        {
            return Err(invalid("message header does not fit account keys"));
        }
        let writable_signed = signed - header.num_readonly_signed_accounts;
        let writable_unsigned = static_count - header.num_readonly_unsigned_accounts;

        let mut account_keys: Vec<SolanaAccountMeta> = message
            .account_keys
            .into_iter()
            .enumerate()
            .map(|(i, pubkey)| SolanaAccountMeta {
                pubkey,
                writable: if i < signed { i < writable_signed } else { i < writable_unsigned },
                signer: i < signed,
            })
            .collect();

        let (failed, loaded) = match self.meta {
            Some(meta) => (meta.err.is_some_and(|e| !e.is_null()), meta.loaded_addresses),
            None => (false, None),
        };
        if let Some(loaded) = loaded {
            let lookup = |writable: bool| {
                move |pubkey: String| SolanaAccountMeta {
                    pubkey,
                    writable,
                    signer: false,
                }
            };
            account_keys.extend(loaded.writable.into_iter().map(lookup(true)));
            account_keys.extend(loaded.readonly.into_iter().map(lookup(false)));
        }

        let instructions = message
            .instructions
            .into_iter()
            .map(|ix| {
                let data = bs58::decode(&ix.data)
                    .into_vec()
                    .map_err(|e| invalid(format!("instruction data: {e}")))?;
                Ok(SolanaInstruction {
                    program_id_index: ix.program_id_index,
                    accounts: ix.accounts,
                    data,
                })
            })
            .collect::<Result<Vec<_>, OracleError>>()?;

        let signature = self
            .transaction
            .signatures
            .into_iter()
            .next()
            .ok_or_else(|| invalid("transaction has no signature"))?;

        Ok(SolanaTransaction {
            signature,
            slot: self.slot,
            account_keys,
            instructions,
            failed,
        })
    }
}

/// Solana oracle backed by a single trusted JSON-RPC host
pub struct JsonRpcSolanaOracle {
    transport: RpcTransport,
}

impl JsonRpcSolanaOracle {
    pub fn new(host: String, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            transport: RpcTransport::new(vec![host], Box::new(HttpRpcClient::new(timeout)?))?,
        })
    }
}

#[async_trait]
impl SolanaOracle for JsonRpcSolanaOracle {
    async fn transaction(&self, signature: &str) -> Result<Option<SolanaTransaction>, OracleError> {
        let params = json!([
            signature,
            {
                "encoding": "json",
                "commitment": "finalized",
                "maxSupportedTransactionVersion": 0,
            }
        ]);
        let result = self.transport.call("getTransaction", params).await?;
        if result.is_null() {
            return Ok(None);
        }
        let raw: RawSolanaTransaction =
            serde_json::from_value(result).map_err(|e| invalid(format!("getTransaction: {e}")))?;
        raw.into_transaction().map(Some)
    }

    async fn token_account_mint(&self, account: &str) -> Result<Option<String>, OracleError> {
        let params = json!([account, { "encoding": "jsonParsed", "commitment": "finalized" }]);
        let result = self.transport.call("getAccountInfo", params).await?;
        let value = match result.get("value") {
            Some(v) if !v.is_null() => v,
            _ => return Ok(None),
        };
        value
            .pointer("/data/parsed/info/mint")
            .and_then(Value::as_str)
            .map(|mint| Some(mint.to_string()))
            .ok_or_else(|| invalid(format!("account {account} is not a token account")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Value {
        json!({
            "slot": 1234,
            "meta": { "err": null, "loadedAddresses": { "writable": ["LoadedW"], "readonly": ["LoadedR"] } },
            "transaction": {
                "signatures": ["5igSig"],
                "message": {
                    "accountKeys": ["Payer", "SourceToken", "Vault", "TokenProgram", "Bridge"],
                    "header": {
                        "numRequiredSignatures": 1,
                        "numReadonlySignedAccounts": 0,
                        "numReadonlyUnsignedAccounts": 2
                    },
                    "instructions": [
                        { "programIdIndex": 4, "accounts": [0, 1, 2, 3], "data": bs58::encode([7u8, 1, 2]).into_string() }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x1b4")).unwrap(), 436);
        assert!(parse_quantity(&json!("1b4")).is_err());
        assert!(parse_quantity(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_header() {
        let block = json!({
            "hash": format!("0x{}", "ab".repeat(32)),
            "number": "0x10",
            "receiptsRoot": format!("0x{}", "cd".repeat(32)),
        });
        let header = parse_header(&block).unwrap();
        assert_eq!(header.number, 16);
        assert_eq!(header.hash, Hash::new([0xab; 32]));
        assert_eq!(header.receipts_root, Hash::new([0xcd; 32]));

        assert!(parse_header(&json!({ "number": "0x10" })).is_err());
    }

    #[test]
    fn test_solana_account_writability() {
        let raw: RawSolanaTransaction = serde_json::from_value(sample_transaction()).unwrap();
        let tx = raw.into_transaction().unwrap();

        assert_eq!(tx.signature, "5igSig");
        assert_eq!(tx.slot, 1234);
        assert!(!tx.failed);

        let flags: Vec<(bool, bool)> = tx.account_keys.iter().map(|a| (a.writable, a.signer)).collect();
        assert_eq!(
            flags,
            vec![
                (true, true),
                (true, false),
                (true, false),
                (false, false),
                (false, false),
                (true, false),
                (false, false),
            ]
        );

        let ix = &tx.instructions[0];
        assert_eq!(ix.data, vec![7, 1, 2]);
        assert_eq!(tx.program_id(ix), Some("Bridge"));
        assert_eq!(tx.instruction_account(ix, 2).map(|a| a.pubkey.as_str()), Some("Vault"));
        assert!(tx.instruction_account(ix, 9).is_none());
    }

    #[test]
    fn test_solana_failed_transaction() {
        let mut value = sample_transaction();
        value["meta"]["err"] = json!({ "InstructionError": [0, "Custom"] });
        let raw: RawSolanaTransaction = serde_json::from_value(value).unwrap();
        assert!(raw.into_transaction().unwrap().failed);
    }

    #[test]
    fn test_solana_bad_header_rejected() {
        let mut value = sample_transaction();
        value["transaction"]["message"]["header"]["numRequiredSignatures"] = json!(9);
        let raw: RawSolanaTransaction = serde_json::from_value(value).unwrap();
        assert!(matches!(raw.into_transaction(), Err(OracleError::InvalidResponse(_))));
    }

    #[test]
    fn test_transport_requires_hosts() {
        assert!(matches!(
            JsonRpcEvmOracle::new(Vec::new(), Duration::from_secs(1)),
            Err(OracleError::NoHosts)
        ));
    }

    fn block_json(hash: Hash, number: &str) -> Value {
        json!({
            "hash": format!("0x{}", hash.to_hex()),
            "number": number,
            "receiptsRoot": format!("0x{}", "cd".repeat(32)),
        })
    }

    #[tokio::test]
    async fn test_fail_over_to_next_host() {
        let mut client = MockRpcClient::new();
        client
            .expect_call_host()
            .withf(|host, method, _| host.to_string() == "http://a" && method.to_string() == "eth_blockNumber")
            .times(1)
            .returning(|_, _, _| Err(OracleError::Transport("connection refused".into())));
        client
            .expect_call_host()
            .withf(|host, method, _| host.to_string() == "http://b" && method.to_string() == "eth_blockNumber")
            .times(1)
            .returning(|_, _, _| Ok(json!("0x2a")));

        let oracle = JsonRpcEvmOracle::with_client(vec!["http://a".into(), "http://b".into()], client).unwrap();
        assert_eq!(oracle.block_number().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_all_hosts_failing() {
        let mut client = MockRpcClient::new();
        client
            .expect_call_host()
            .times(2)
            .returning(|_, _, _| Err(OracleError::Transport("timed out".into())));

        let oracle = JsonRpcEvmOracle::with_client(vec!["http://a".into(), "http://b".into()], client).unwrap();
        let err = oracle.block_number().await.unwrap_err();
        assert!(matches!(err, OracleError::AllHostsFailed { hosts: 2, .. }));
    }

    #[tokio::test]
    async fn test_header_canonical_check() {
        let wanted = Hash::new([0xab; 32]);
        let mut client = MockRpcClient::new();
        client
            .expect_call_host()
            .withf(|_, method, _| method.to_string() == "eth_getBlockByHash")
            .returning(move |_, _, _| Ok(block_json(wanted, "0x10")));
        client
            .expect_call_host()
            .withf(|_, method, params| method.to_string() == "eth_getBlockByNumber" && params[0] == json!("0x10"))
            .returning(move |_, _, _| Ok(block_json(Hash::new([0x01; 32]), "0x10")));

        let oracle = JsonRpcEvmOracle::with_client(vec!["http://a".into()], client).unwrap();
        let status = oracle.header_by_hash(wanted).await.unwrap().unwrap();
        assert_eq!(status.header.number, 16);
        assert!(!status.canonical);
    }

    #[test]
    fn test_parse_aurora_receipt() {
        let receipt = json!({
            "blockHash": format!("0x{}", "ab".repeat(32)),
            "transactionIndex": "0x3",
            "status": "0x1",
            "nearTransactionHash": format!("0x{}", "0c".repeat(32)),
            "logs": [{
                "address": format!("0x{}", "43".repeat(20)),
                "topics": [format!("0x{}", "01".repeat(32))],
                "data": "0x0102",
            }],
        });
        let parsed = parse_receipt(&receipt).unwrap();
        assert_eq!(parsed.block_hash, Hash::new([0xab; 32]));
        assert_eq!(parsed.tx_index, 3);
        assert!(parsed.success);
        assert_eq!(parsed.logs.len(), 1);
        assert_eq!(&parsed.logs[0].data[..], &[1u8, 2]);
        assert!(parsed.near_tx_hash.is_some());

        let mut failed = receipt.clone();
        failed["status"] = json!("0x0");
        failed["nearTransactionHash"] = json!("");
        let parsed = parse_receipt(&failed).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.near_tx_hash, None);

        let mut bad = receipt;
        bad["logs"][0]["topics"] = json!(["nope"]);
        assert!(parse_receipt(&bad).is_err());
    }

    #[tokio::test]
    async fn test_near_tx_status() {
        let mut client = MockRpcClient::new();
        client
            .expect_call_host()
            .withf(|_, method, params| method.to_string() == "tx" && params[1] == json!("incognito"))
            .returning(|_, _, _| {
                Ok(json!({
                    "status": { "SuccessValue": "" },
                    "transaction_outcome": { "block_hash": "BlockA" },
                    "receipts_outcome": [
                        { "outcome": { "executor_id": "vault.near", "logs": ["12Rx wrap.near 10"], "status": { "SuccessValue": "" } } },
                        { "outcome": { "executor_id": "wrap.near", "logs": [], "status": { "Failure": { "ActionError": {} } } } }
                    ]
                }))
            });
        client
            .expect_call_host()
            .withf(|_, method, params| method.to_string() == "block" && params["finality"] == json!("final"))
            .returning(|_, _, _| {
                Ok(json!({ "header": { "hash": "BlockF", "height": 120, "chunk_receipts_root": "Root" } }))
            });

        let oracle = JsonRpcNearOracle::with_client(vec!["http://near".into()], client).unwrap();
        let status = oracle.tx_status("TxHash", "incognito").await.unwrap().unwrap();
        assert!(!status.failed);
        assert_eq!(status.block_hash, "BlockA");
        assert_eq!(status.receipts[0].logs, vec!["12Rx wrap.near 10".to_string()]);
        assert!(status.receipts[1].failed);

        let tip = oracle.final_block().await.unwrap();
        assert_eq!(tip.height, 120);
    }

    #[tokio::test]
    async fn test_header_for_other_block_rejected() {
        let mut client = MockRpcClient::new();
        client
            .expect_call_host()
            .withf(|_, method, _| method.to_string() == "eth_getBlockByHash")
            .returning(|_, _, _| Ok(block_json(Hash::new([0xee; 32]), "0x10")));

        let oracle = JsonRpcEvmOracle::with_client(vec!["http://a".into()], client).unwrap();
        assert!(matches!(
            oracle.header_by_hash(Hash::new([0xab; 32])).await,
            Err(OracleError::InvalidResponse(_))
        ));
    }
}

//! Campaign contract gateway — JSON-RPC client for contract reads and the
//! wallet-bridge transaction submitter.
//!
//! Read failures surface as [`EngineError::Rpc`] and become an "unknown"
//! snapshot upstream; they are never retried in a tight loop.  Submission
//! failures surface as [`EngineError::Wallet`] with no retry at all.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::{EngineError, Result};

// ─────────────────────────────────────────────────────────
// Boundary contracts
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub total_deposited_wei: u128,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Read-only view of the campaign contract.
#[allow(async_fn_in_trait)]
pub trait CampaignReader {
    async fn get_project_info(&self, project_id: u64) -> Result<ProjectInfo>;
    async fn get_donor_amount(&self, project_id: u64, donor: &str) -> Result<u128>;
    async fn get_project_deposits(&self, project_id: u64) -> Result<Vec<u64>>;
}

/// The value-transfer side of the wallet collaborator.
#[allow(async_fn_in_trait)]
pub trait WalletSubmitter {
    async fn deposit_eth(&self, project_id: u64, value_wei: u128) -> Result<TxReceipt>;
}

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// ─────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────

/// Talks JSON-RPC 2.0 to the configured contract gateway, and to the wallet
/// bridge when one is configured.
pub struct JsonRpcGateway {
    client: Client,
    rpc_url: String,
    wallet_bridge_url: Option<String>,
    contract_address: String,
    chain_id: u64,
}

impl JsonRpcGateway {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            rpc_url: config.rpc_url.clone(),
            wallet_bridge_url: config.wallet_bridge_url.clone(),
            contract_address: config.contract_address.clone(),
            chain_id: config.chain_id,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.wallet_bridge_url.is_some()
    }

    async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Rpc(format!("{method}: gateway returned {status}")));
        }

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(EngineError::Rpc(format!(
                "{method}: {} {}",
                err.code, err.message
            )));
        }
        body.result
            .ok_or_else(|| EngineError::Rpc(format!("{method}: empty result")))
    }

    fn params(&self, project_id: u64) -> Value {
        json!({
            "contract": self.contract_address,
            "chainId": self.chain_id,
            "projectId": project_id,
        })
    }
}

impl CampaignReader for JsonRpcGateway {
    async fn get_project_info(&self, project_id: u64) -> Result<ProjectInfo> {
        let result = self
            .call(&self.rpc_url, "getProjectInfo", self.params(project_id))
            .await?;
        decode_project_info(&result)
    }

    async fn get_donor_amount(&self, project_id: u64, donor: &str) -> Result<u128> {
        let mut params = self.params(project_id);
        params["donor"] = json!(donor);
        let result = self.call(&self.rpc_url, "getDonorAmount", params).await?;
        parse_wei(&result)
    }

    async fn get_project_deposits(&self, project_id: u64) -> Result<Vec<u64>> {
        let result = self
            .call(&self.rpc_url, "getProjectDeposits", self.params(project_id))
            .await?;
        decode_deposit_ids(&result)
    }
}

impl WalletSubmitter for JsonRpcGateway {
    async fn deposit_eth(&self, project_id: u64, value_wei: u128) -> Result<TxReceipt> {
        let url = self.wallet_bridge_url.as_deref().ok_or_else(|| {
            EngineError::Precondition("no wallet bridge configured".to_string())
        })?;

        let mut params = self.params(project_id);
        params["valueWei"] = json!(value_wei.to_string());

        // Rejections and reverts come back as RPC errors; re-tag them so the
        // caller sees a submission failure, not a read failure.
        let result = self
            .call(url, "depositETH", params)
            .await
            .map_err(|e| match e {
                EngineError::Rpc(msg) => EngineError::Wallet(msg),
                other => other,
            })?;
        decode_receipt(&result)
    }
}

// ─────────────────────────────────────────────────────────
// Result decoding
// ─────────────────────────────────────────────────────────

/// Pick a tuple member out of a result that may be an array (ABI tuple) or a
/// keyed object, depending on the gateway.
fn field<'a>(value: &'a Value, index: usize, keys: &[&str]) -> Option<&'a Value> {
    if let Some(array) = value.as_array() {
        return array.get(index);
    }
    keys.iter().find_map(|k| value.get(k))
}

fn field_str(value: &Value, index: usize, keys: &[&str]) -> Option<String> {
    field(value, index, keys)
        .and_then(|v| v.as_str())
        .map(String::from)
}

fn decode_project_info(value: &Value) -> Result<ProjectInfo> {
    let name = field_str(value, 0, &["name"])
        .ok_or_else(|| EngineError::Rpc(format!("project info without a name: {value}")))?;
    let total = field(value, 1, &["totalDeposited", "totalDepositedWei", "total"])
        .ok_or_else(|| EngineError::Rpc(format!("project info without a total: {value}")))?;
    let owner = field_str(value, 2, &["owner"])
        .ok_or_else(|| EngineError::Rpc(format!("project info without an owner: {value}")))?;

    Ok(ProjectInfo {
        name,
        total_deposited_wei: parse_wei(total)?,
        owner,
    })
}

fn decode_deposit_ids(value: &Value) -> Result<Vec<u64>> {
    let array = value
        .as_array()
        .or_else(|| value.get("deposits").and_then(|v| v.as_array()))
        .ok_or_else(|| EngineError::Rpc(format!("unexpected deposits shape: {value}")))?;
    array.iter().map(parse_u64).collect()
}

fn decode_receipt(value: &Value) -> Result<TxReceipt> {
    let tx_hash = field_str(value, 0, &["txHash", "transactionHash", "hash"])
        .ok_or_else(|| EngineError::Wallet(format!("receipt without a tx hash: {value}")))?;

    let bytes = hex::decode(tx_hash.trim_start_matches("0x"))
        .map_err(|_| EngineError::Wallet(format!("malformed tx hash: {tx_hash}")))?;
    if bytes.len() != 32 {
        return Err(EngineError::Wallet(format!("malformed tx hash: {tx_hash}")));
    }

    let block_number = field(value, 1, &["blockNumber"]).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| parse_quantity(s).ok()))
    });

    Ok(TxReceipt {
        tx_hash,
        block_number,
    })
}

/// Accept a wei quantity as a `0x…` hex string, a decimal string, or a bare
/// JSON number.
pub fn parse_wei(value: &Value) -> Result<u128> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u128::from_str_radix(hex_part, 16)
                    .map_err(|_| EngineError::Rpc(format!("bad hex quantity: {s}")))
            } else {
                s.parse()
                    .map_err(|_| EngineError::Rpc(format!("bad decimal quantity: {s}")))
            }
        }
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| EngineError::Rpc(format!("bad numeric quantity: {n}"))),
        _ => Err(EngineError::Rpc(format!("unexpected quantity: {value}"))),
    }
}

fn parse_u64(value: &Value) -> Result<u64> {
    let wei = parse_wei(value)?;
    u64::try_from(wei).map_err(|_| EngineError::Rpc(format!("value out of range: {value}")))
}

fn parse_quantity(s: &str) -> Result<u64> {
    parse_u64(&Value::String(s.to_string()))
}

/// Wei to ETH by the exact 18-decimal shift (the display direction of
/// `amounts::to_wei`).
pub fn wei_to_eth(wei: u128) -> Result<Decimal> {
    let signed =
        i128::try_from(wei).map_err(|_| EngineError::Rpc("wei amount out of range".to_string()))?;
    Decimal::try_from_i128_with_scale(signed, 18)
        .map_err(|e| EngineError::Rpc(format!("wei amount out of range: {e}")))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

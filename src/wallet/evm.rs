//! EVM JSON-RPC Wallet
//!
//! Submits native transfers through `eth_sendTransaction` from an account
//! unlocked on the RPC node (devnets, Hardhat/Anvil, a managed signer
//! proxy) and polls receipts until the requested confirmation depth.

use anyhow::Context;
use async_trait::async_trait;
use ethereum_types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{OnChainWallet, TxReceipt};
use crate::config::ChainConfig;
use crate::error::{WalletError, WalletResult};

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Subset of a transaction receipt used for confirmation tracking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

pub struct EvmRpcWallet {
    client: Client,
    rpc_url: String,
    from_address: String,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    next_id: AtomicU64,
}

impl EvmRpcWallet {
    /// Creates a wallet for one configured chain.
    ///
    /// # Arguments
    ///
    /// * `config` - Chain configuration (RPC URL, funding account, polling)
    ///
    /// # Returns
    ///
    /// * `Ok(EvmRpcWallet)` - Successfully created wallet
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(config: &ChainConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            from_address: config.from_address.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            confirmation_timeout: Duration::from_millis(config.confirmation_timeout_ms),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<serde_json::Value>) -> WalletResult<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| WalletError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = response.error {
            return Err(WalletError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }

    async fn required<T: DeserializeOwned>(&self, method: &str, params: Vec<serde_json::Value>) -> WalletResult<T> {
        self.call(method, params)
            .await?
            .ok_or_else(|| WalletError::InvalidResponse(format!("{} returned no result", method)))
    }

    /// Gets the current block number.
    pub async fn block_number(&self) -> WalletResult<u64> {
        let block_hex: String = self.required("eth_blockNumber", vec![]).await?;
        parse_quantity(&block_hex)
    }
}

#[async_trait]
impl OnChainWallet for EvmRpcWallet {
    async fn chain_id(&self) -> WalletResult<u64> {
        let chain_hex: String = self.required("eth_chainId", vec![]).await?;
        parse_quantity(&chain_hex)
    }

    async fn send_transaction(&self, to: &str, value: U256) -> WalletResult<String> {
        let tx = serde_json::json!({
            "from": self.from_address,
            "to": to,
            "value": format!("0x{:x}", value),
        });
        let tx_hash: String = self.required("eth_sendTransaction", vec![tx]).await?;
        info!("Submitted transaction {} from {} to {}", tx_hash, self.from_address, to);
        Ok(tx_hash)
    }

    async fn wait_for_confirmations(&self, tx_hash: &str, confirmations: u64) -> WalletResult<TxReceipt> {
        let started = Instant::now();
        let wanted = confirmations.max(1);

        loop {
            let receipt: Option<RpcReceipt> = self
                .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
                .await?;

            if let Some(receipt) = receipt {
                if receipt.status.as_deref() == Some("0x0") {
                    return Err(WalletError::Reverted(receipt.transaction_hash));
                }
                if let Some(block_hex) = receipt.block_number.as_deref() {
                    let mined_at = parse_quantity(block_hex)?;
                    let head = self.block_number().await?;
                    let depth = head.saturating_sub(mined_at) + 1;
                    debug!("Transaction {} has {} of {} confirmations", tx_hash, depth, wanted);
                    if depth >= wanted {
                        return Ok(TxReceipt {
                            transaction_hash: receipt.transaction_hash,
                            block_number: mined_at,
                            confirmations: depth,
                        });
                    }
                }
            }

            if started.elapsed() >= self.confirmation_timeout {
                return Err(WalletError::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Parses a `0x`-prefixed hex quantity.
fn parse_quantity(value: &str) -> WalletResult<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .map_err(|e| WalletError::InvalidResponse(format!("bad hex quantity '{}': {}", value, e)))
}

//! On-chain wallet interface
//!
//! The deposit leg moves native funds into a channel's on-chain address.
//! Signing and submission belong to an external wallet; [`evm`] provides a
//! JSON-RPC implementation backed by an unlocked node account.

pub mod evm;

use async_trait::async_trait;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::WalletResult;

pub use evm::EvmRpcWallet;

/// Receipt of a transaction that reached the requested confirmation depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub confirmations: u64,
}

/// Signer able to submit native-asset transfers on one chain.
#[async_trait]
pub trait OnChainWallet: Send + Sync {
    /// Chain the wallet is currently connected to.
    async fn chain_id(&self) -> WalletResult<u64>;

    /// Submits a native-asset transfer and returns its transaction hash.
    async fn send_transaction(&self, to: &str, value: U256) -> WalletResult<String>;

    /// Waits until `tx_hash` has at least `confirmations` confirmations.
    async fn wait_for_confirmations(&self, tx_hash: &str, confirmations: u64) -> WalletResult<TxReceipt>;
}

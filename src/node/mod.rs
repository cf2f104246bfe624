//! Channel Network Node Interface
//!
//! The payment-channel node (channel storage, routing, signing, disputes) is
//! an external collaborator. This module defines the capability set the
//! bridge consumes from it, the wire types those capabilities exchange, and
//! a REST implementation in [`http`].
//!
//! Supports:
//! - Connection setup and local identity discovery
//! - Channel lookup by address or by participants + chain
//! - Deposit reconciliation, hashlock transfers, resolution and withdrawals
//! - Channel setup and delegated cross-chain transfers
//! - A stream of "conditional transfer created" events

pub mod http;
pub mod webhook;

use async_trait::async_trait;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::crypto::{LockHash, PreImage};
use crate::error::{NodeError, NodeResult};

pub use http::HttpNodeClient;

/// Event name the node emits when a conditional transfer lands in a channel.
pub const CONDITIONAL_TRANSFER_CREATED: &str = "CONDITIONAL_TRANSFER_CREATED";

// ============================================================================
// CONNECTION TYPES
// ============================================================================

/// Parameters for establishing the node connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Node endpoint (REST base URL or embedded node locator)
    pub endpoint: String,
    /// Chain IDs the node should serve
    pub supported_chains: Vec<u64>,
    /// Public identifier of the routing counterparty
    pub router_identifier: String,
}

/// Local configuration returned by the node once connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Local identity on the channel network
    pub public_identifier: String,
    /// On-chain address of the node's channel signer
    pub signer_address: String,
    /// Index of this identity on the node
    #[serde(default)]
    pub index: u32,
}

// ============================================================================
// CHANNEL STATE
// ============================================================================

/// Chain context of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkContext {
    pub chain_id: u64,
    #[serde(default)]
    pub channel_factory_address: Option<String>,
    #[serde(default)]
    pub transfer_registry_address: Option<String>,
}

/// Off-chain balance of one asset: `to[i]` owns `amount[i]` (base units, decimal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub to: Vec<String>,
    pub amount: Vec<String>,
}

/// Bilateral channel between the local identity and the counterparty on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    /// On-chain address of the channel (jointly owned)
    pub channel_address: String,
    #[serde(default)]
    pub alice_identifier: String,
    #[serde(default)]
    pub bob_identifier: String,
    pub network_context: NetworkContext,
    #[serde(default)]
    pub asset_ids: Vec<String>,
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub nonce: u64,
}

impl ChannelState {
    pub fn chain_id(&self) -> u64 {
        self.network_context.chain_id
    }

    /// Off-chain balance for `asset_id`, if the channel holds that asset.
    pub fn balance(&self, asset_id: &str) -> Option<&Balance> {
        self.asset_ids
            .iter()
            .position(|a| a.eq_ignore_ascii_case(asset_id))
            .and_then(|i| self.balances.get(i))
    }

    /// Total off-chain balance for `asset_id` across both participants.
    pub fn total_balance(&self, asset_id: &str) -> U256 {
        self.balance(asset_id)
            .map(|b| {
                b.amount
                    .iter()
                    .filter_map(|a| U256::from_dec_str(a).ok())
                    .fold(U256::zero(), |acc, a| acc.saturating_add(a))
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// TRANSFER TYPES
// ============================================================================

/// Hashlock-conditional transfer request.
#[derive(Debug, Clone)]
pub struct HashlockTransferRequest {
    /// Channel the transfer is created in (sender side)
    pub channel_address: String,
    /// Chain the recipient's channel lives on
    pub recipient_chain_id: u64,
    pub asset_id: String,
    /// Amount in base units
    pub amount: U256,
    /// Recipient public identifier
    pub recipient: String,
    pub lock_hash: LockHash,
    /// Lock expiry, "0" for none
    pub expiry: String,
    /// Channel-level dispute timeout in seconds
    pub timeout: u64,
    pub meta: serde_json::Value,
}

/// Node acknowledgement of a created or resolved transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub channel_address: String,
    pub transfer_id: String,
    #[serde(default)]
    pub routing_id: Option<String>,
}

/// Withdrawal request from the off-chain balance to an on-chain address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub channel_address: String,
    pub asset_id: String,
    pub amount: U256,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResult {
    pub channel_address: String,
    pub transfer_id: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Acknowledgement carrying only the affected channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel_address: String,
}

/// Multi-chain move performed entirely by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainTransferRequest {
    pub amount: U256,
    pub from_chain_id: u64,
    pub from_asset_id: String,
    pub to_chain_id: u64,
    pub to_asset_id: String,
    pub withdrawal_address: Option<String>,
}

// ============================================================================
// EVENTS
// ============================================================================

/// Transfer descriptor carried by a transfer-created event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDescriptor {
    pub transfer_id: String,
    #[serde(default)]
    pub initiator: Option<String>,
    #[serde(default)]
    pub responder: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub transfer_state: Option<HashlockState>,
}

impl TransferDescriptor {
    /// Lock hash of a hashlock transfer, `None` if absent or malformed.
    pub fn lock_hash(&self) -> Option<LockHash> {
        self.transfer_state
            .as_ref()
            .and_then(|s| s.lock_hash.as_deref())
            .and_then(|h| LockHash::from_hex(h).ok())
    }
}

/// Condition state of a hashlock transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashlockState {
    #[serde(default)]
    pub lock_hash: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

/// Payload of a "conditional transfer created" notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCreatedEvent {
    /// Channel the transfer landed in
    pub channel_address: String,
    pub transfer: TransferDescriptor,
    #[serde(default)]
    pub condition_type: Option<String>,
}

// ============================================================================
// NODE CLIENT
// ============================================================================

/// Off-chain channel operations offered by the channel network node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Establishes the connection and returns the local configuration.
    async fn connect(&self, request: &ConnectRequest) -> NodeResult<NodeConfig>;

    /// Releases the connection. No-op by default.
    async fn disconnect(&self) -> NodeResult<()> {
        Ok(())
    }

    async fn get_channel(&self, channel_address: &str) -> NodeResult<ChannelState>;

    async fn get_channel_by_participants(
        &self,
        public_identifier: &str,
        counterparty: &str,
        chain_id: u64,
    ) -> NodeResult<ChannelState>;

    /// Credits funds confirmed on-chain at the channel address to the off-chain balance.
    async fn reconcile_deposit(&self, channel_address: &str, asset_id: &str) -> NodeResult<ChannelResult>;

    async fn create_conditional_transfer(&self, request: &HashlockTransferRequest) -> NodeResult<TransferResult>;

    /// Resolves a hashlock transfer by revealing its pre-image.
    async fn resolve_transfer(
        &self,
        channel_address: &str,
        transfer_id: &str,
        pre_image: &PreImage,
    ) -> NodeResult<TransferResult>;

    async fn withdraw(&self, request: &WithdrawRequest) -> NodeResult<WithdrawResult>;

    async fn setup_channel(&self, counterparty: &str, chain_id: u64, timeout: u64) -> NodeResult<ChannelResult>;

    /// Deposit, route and withdraw in one node-side operation.
    ///
    /// Clients that cannot perform this return `NodeError::Unsupported`.
    async fn cross_chain_transfer(&self, _request: &CrossChainTransferRequest) -> NodeResult<serde_json::Value> {
        Err(NodeError::Unsupported("cross_chain_transfer"))
    }

    /// Subscribes to transfer-created events.
    ///
    /// The receiver buffers every event published after this call returns.
    fn subscribe_transfer_created(&self) -> broadcast::Receiver<TransferCreatedEvent>;
}

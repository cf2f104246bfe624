//! Error types
//!
//! [`BridgeError`] is the taxonomy surfaced by every pipeline stage. Each
//! variant carries the underlying reason so callers can tell which leg of a
//! transfer failed. [`NodeError`] and [`WalletError`] describe failures of
//! the external collaborators and are folded into a `BridgeError` by the
//! stage that called them.

use thiserror::Error;

/// Pipeline stage a [`BridgeError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    ChannelLookup,
    ChannelSetup,
    Deposit,
    Reconciliation,
    TransferCreation,
    EventWait,
    TransferResolution,
    Withdrawal,
    CrossChainTransfer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::ChannelLookup => "channel-lookup",
            Stage::ChannelSetup => "channel-setup",
            Stage::Deposit => "deposit",
            Stage::Reconciliation => "reconciliation",
            Stage::TransferCreation => "transfer-creation",
            Stage::EventWait => "event-wait",
            Stage::TransferResolution => "transfer-resolution",
            Stage::Withdrawal => "withdrawal",
            Stage::CrossChainTransfer => "cross-chain-transfer",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Not connected to channel node: {0}")]
    NotConnected(String),

    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Sender and receiver are both on chain {chain_id}")]
    SameChainRoute { chain_id: u64 },

    #[error("Channel lookup failed ({target}): {reason}")]
    ChannelLookupFailed { target: String, reason: String },

    #[error("Channel setup failed on chain {chain_id}: {reason}")]
    ChannelSetupFailed { chain_id: u64, reason: String },

    #[error("On-chain deposit to {channel_address} failed: {reason}")]
    OnChainDepositFailed { channel_address: String, reason: String },

    #[error("Reconciling deposit for {channel_address} failed: {reason}")]
    ReconciliationFailed { channel_address: String, reason: String },

    #[error("Creating conditional transfer on {channel_address} failed: {reason}")]
    TransferCreationFailed { channel_address: String, reason: String },

    #[error("Resolving transfer on {channel_address} failed: {reason}")]
    TransferResolutionFailed { channel_address: String, reason: String },

    #[error("Withdrawal from {channel_address} failed: {reason}")]
    WithdrawalFailed { channel_address: String, reason: String },

    #[error("Wallet is on chain {actual}, expected chain {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Timed out after {waited_ms}ms during {stage}")]
    Timeout { stage: Stage, waited_ms: u64 },

    #[error("Cross-chain transfer failed: {0}")]
    CrossChainTransferFailed(String),
}

impl BridgeError {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            BridgeError::NotConnected(_)
            | BridgeError::InvalidAmount { .. }
            | BridgeError::InvalidAddress { .. }
            | BridgeError::SameChainRoute { .. } => Stage::Validation,
            BridgeError::ChannelLookupFailed { .. } => Stage::ChannelLookup,
            BridgeError::ChannelSetupFailed { .. } => Stage::ChannelSetup,
            BridgeError::OnChainDepositFailed { .. } | BridgeError::ChainMismatch { .. } => {
                Stage::Deposit
            }
            BridgeError::ReconciliationFailed { .. } => Stage::Reconciliation,
            BridgeError::TransferCreationFailed { .. } => Stage::TransferCreation,
            BridgeError::TransferResolutionFailed { .. } => Stage::TransferResolution,
            BridgeError::WithdrawalFailed { .. } => Stage::Withdrawal,
            BridgeError::Timeout { stage, .. } => *stage,
            BridgeError::CrossChainTransferFailed(_) => Stage::CrossChainTransfer,
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure reported by (or while talking to) the channel network node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("node client is not connected")]
    NotConnected,

    #[error("node request failed: {0}")]
    Transport(String),

    #[error("node rejected request: {0}")]
    Rejected(String),

    #[error("unexpected node response: {0}")]
    InvalidResponse(String),

    #[error("operation '{0}' is not supported by this node client")]
    Unsupported(&'static str),
}

impl From<reqwest::Error> for NodeError {
    fn from(e: reqwest::Error) -> Self {
        NodeError::Transport(e.to_string())
    }
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Failure of the on-chain wallet/signer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("RPC request failed: {0}")]
    Transport(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("transaction {tx_hash} not confirmed after {waited_ms}ms")]
    ConfirmationTimeout { tx_hash: String, waited_ms: u64 },

    #[error("unexpected RPC response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        WalletError::Transport(e.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

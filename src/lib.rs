//! Channel bridge library
//!
//! Moves value between payment channels on two settlement chains that share
//! a routing counterparty: on-chain deposit, hashlock-conditional transfer,
//! resolution with the locally held pre-image, on-chain withdrawal.

pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod node;
pub mod service;
pub mod session;
pub mod validation;
pub mod wallet;

// Re-export public types for convenience
pub use config::{BridgeConfig, ChainConfig, TransferSettings};
pub use crypto::{LockHash, PreImage};
pub use error::{BridgeError, BridgeResult, NodeError, Stage, WalletError};
pub use events::{TransferEventBus, TransferSubscription};
pub use node::{ChannelState, HttpNodeClient, NodeClient, NodeConfig, TransferCreatedEvent};
pub use service::{
    ChannelResolver, DepositCoordinator, HashlockTransferCoordinator, Orchestrator, OrchestratorBuilder,
    PipelinePhase, PipelineTracker, SendReceipt, TransferOutcome, WithdrawalCoordinator,
};
pub use session::Session;
pub use validation::{TransferParams, ValidatedParams};
pub use wallet::{EvmRpcWallet, OnChainWallet, TxReceipt};

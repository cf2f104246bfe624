//! Transfer pipeline services
//!
//! Channel resolution, the three pipeline stages (deposit, hashlock
//! transfer, withdrawal), phase tracking and the orchestrator that chains
//! them into one `send`.

pub mod channel;
pub mod deposit;
pub mod orchestrator;
pub mod tracker;
pub mod transfer;
pub mod withdraw;

// Re-export for convenience
pub use channel::ChannelResolver;
pub use deposit::DepositCoordinator;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, SendReceipt};
pub use tracker::{NoopObserver, PhaseObserver, PipelinePhase, PipelineTracker};
pub use transfer::{HashlockTransferCoordinator, TransferOutcome};
pub use withdraw::WithdrawalCoordinator;

//! Transfer Orchestration
//!
//! End-to-end `send`: deposit on the source chain, hashlock transfer to the
//! destination channel, withdrawal on the destination chain. Stages run in
//! strict sequence and the first failure aborts the pipeline. Nothing is
//! rolled back: a confirmed deposit or a created transfer stays where it is
//! and is reported in the logs.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::channel::ChannelResolver;
use super::deposit::DepositCoordinator;
use super::tracker::{PipelinePhase, PipelineTracker};
use super::transfer::{HashlockTransferCoordinator, TransferOutcome};
use super::withdraw::WithdrawalCoordinator;
use crate::config::TransferSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::node::{ChannelState, CrossChainTransferRequest};
use crate::session::Session;
use crate::validation::{check_address, check_amount, check_route, TransferParams};
use crate::wallet::OnChainWallet;

/// Summary of a completed `send`.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Every phase the pipeline went through, `Idle` to `Done`
    pub phases: Vec<PipelinePhase>,
    /// Source channel after the deposit
    pub deposit_channel: ChannelState,
    pub transfer: TransferOutcome,
    /// Destination channel after the withdrawal
    pub withdrawal_channel: ChannelState,
}

pub struct Orchestrator {
    session: Arc<Session>,
    deposits: DepositCoordinator,
    transfers: HashlockTransferCoordinator,
    withdrawals: WithdrawalCoordinator,
}

impl Orchestrator {
    pub fn new(
        session: Arc<Session>,
        deposits: DepositCoordinator,
        transfers: HashlockTransferCoordinator,
        withdrawals: WithdrawalCoordinator,
    ) -> Self {
        Self {
            session,
            deposits,
            transfers,
            withdrawals,
        }
    }

    /// Moves `value` of `sender_asset_id` from `sender_chain_id` to `receiver_address` on `receiver_chain_id`.
    ///
    /// # Arguments
    ///
    /// * `sender_chain_id` - Chain the funds are deposited on
    /// * `sender_asset_id` - Asset deposited, transferred and withdrawn
    /// * `receiver_chain_id` - Chain the funds are withdrawn on
    /// * `receiver_address` - On-chain recipient of the withdrawal
    /// * `value` - Human-readable amount, e.g. "1.0"
    ///
    /// # Returns
    ///
    /// * `Ok(SendReceipt)` - All three legs completed
    /// * `Err(BridgeError)` - First failing stage, unchanged
    pub async fn send(
        &self,
        sender_chain_id: u64,
        sender_asset_id: &str,
        receiver_chain_id: u64,
        receiver_address: &str,
        value: &str,
    ) -> BridgeResult<SendReceipt> {
        let tracker = PipelineTracker::new();
        let result = self
            .run_send(
                &tracker,
                sender_chain_id,
                sender_asset_id,
                receiver_chain_id,
                receiver_address,
                value,
            )
            .await;

        if let Err(e) = &result {
            tracker.fail(e.to_string());
            error!("Send aborted during {}: {}", e.stage(), e);
        }
        result
    }

    async fn run_send(
        &self,
        tracker: &PipelineTracker,
        sender_chain_id: u64,
        sender_asset_id: &str,
        receiver_chain_id: u64,
        receiver_address: &str,
        value: &str,
    ) -> BridgeResult<SendReceipt> {
        tracker.advance(PipelinePhase::Validating);
        let validated = self
            .session
            .validate(&TransferParams {
                value: Some(value.to_string()),
                from_chain_id: Some(sender_chain_id),
                from_asset_id: Some(sender_asset_id.to_string()),
                to_chain_id: Some(receiver_chain_id),
                to_asset_id: Some(sender_asset_id.to_string()),
                withdrawal_address: Some(receiver_address.to_string()),
            })
            .await?;
        let amount = check_amount(validated.amount.unwrap_or_default())?;
        check_address(receiver_address)?;
        check_route(sender_chain_id, receiver_chain_id)?;

        tracker.advance(PipelinePhase::Depositing);
        let deposit_channel = self
            .deposits
            .deposit_amount(sender_chain_id, sender_asset_id, amount, tracker)
            .await?;

        tracker.advance(PipelinePhase::CreatingTransfer);
        let transfer = match self
            .transfers
            .transfer_amount(sender_chain_id, sender_asset_id, amount, receiver_chain_id, tracker)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "{} wei deposited into {} stays in the channel after the transfer failed",
                    amount, deposit_channel.channel_address
                );
                return Err(e);
            }
        };

        tracker.advance(PipelinePhase::Withdrawing);
        let withdrawal_channel = match self
            .withdrawals
            .withdraw_amount(receiver_chain_id, sender_asset_id, receiver_address, amount)
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                error!(
                    "Transfer {} resolved into {} but the withdrawal failed; balance stays off-chain",
                    transfer.transfer_id, transfer.receiver_channel.channel_address
                );
                return Err(e);
            }
        };

        tracker.advance(PipelinePhase::Done);
        info!(
            "Send complete: {} wei from chain {} to {} on chain {}",
            amount, sender_chain_id, receiver_address, receiver_chain_id
        );

        Ok(SendReceipt {
            phases: tracker.history(),
            deposit_channel,
            transfer,
            withdrawal_channel,
        })
    }

    /// Delegates the whole deposit, route and withdraw sequence to the node.
    ///
    /// # Returns
    ///
    /// * `Ok(serde_json::Value)` - Node result, passed through
    /// * `Err(BridgeError)` - Validation error or `CrossChainTransferFailed`
    pub async fn cross_transfer(
        &self,
        value: &str,
        from_chain_id: u64,
        from_asset_id: &str,
        to_chain_id: u64,
        to_asset_id: &str,
        withdrawal_address: Option<&str>,
    ) -> BridgeResult<serde_json::Value> {
        let validated = self
            .session
            .validate(&TransferParams {
                value: Some(value.to_string()),
                from_chain_id: Some(from_chain_id),
                from_asset_id: Some(from_asset_id.to_string()),
                to_chain_id: Some(to_chain_id),
                to_asset_id: Some(to_asset_id.to_string()),
                withdrawal_address: withdrawal_address.map(str::to_string),
            })
            .await?;
        let amount = check_amount(validated.amount.unwrap_or_default())?;

        let request = CrossChainTransferRequest {
            amount,
            from_chain_id,
            from_asset_id: from_asset_id.to_string(),
            to_chain_id,
            to_asset_id: to_asset_id.to_string(),
            withdrawal_address: validated.withdrawal_address,
        };

        info!(
            "Delegating cross-chain transfer of {} wei: chain {} -> chain {}",
            amount, from_chain_id, to_chain_id
        );
        self.session
            .node()
            .cross_chain_transfer(&request)
            .await
            .map_err(|e| BridgeError::CrossChainTransferFailed(e.to_string()))
    }
}

/// Builds the orchestrator and its stages around one session.
pub struct OrchestratorBuilder {
    session: Arc<Session>,
    channel_timeout: u64,
    min_confirmations: u64,
    transfer_timeout: u64,
    event_timeout: Option<Duration>,
}

impl OrchestratorBuilder {
    pub fn new(session: Arc<Session>) -> Self {
        let defaults = TransferSettings::default();
        Self::with_settings(session, &defaults)
    }

    pub fn with_settings(session: Arc<Session>, settings: &TransferSettings) -> Self {
        Self {
            session,
            channel_timeout: settings.channel_timeout,
            min_confirmations: settings.min_confirmations,
            transfer_timeout: settings.transfer_timeout,
            event_timeout: settings.event_timeout(),
        }
    }

    pub fn event_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn build(self, wallet: Arc<dyn OnChainWallet>) -> Orchestrator {
        let channels = Arc::new(ChannelResolver::new(self.session.clone(), self.channel_timeout));
        Orchestrator::new(
            self.session.clone(),
            DepositCoordinator::new(self.session.clone(), channels.clone(), wallet, self.min_confirmations),
            HashlockTransferCoordinator::new(
                self.session.clone(),
                channels.clone(),
                self.transfer_timeout,
                self.event_timeout,
            ),
            WithdrawalCoordinator::new(self.session, channels),
        )
    }
}

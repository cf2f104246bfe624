//! Deposit Coordination
//!
//! Funds the local channel on the source chain: on-chain transfer to the
//! channel address, confirmation wait, then reconciliation of the
//! confirmed balance into the off-chain ledger. The steps run strictly in
//! that order; reconciling first would credit an unconfirmed deposit.

use ethereum_types::U256;
use std::sync::Arc;
use tracing::{error, info};

use super::channel::ChannelResolver;
use super::tracker::{NoopObserver, PhaseObserver, PipelinePhase};
use crate::error::{BridgeError, BridgeResult};
use crate::node::ChannelState;
use crate::session::Session;
use crate::validation::{check_amount, TransferParams};
use crate::wallet::OnChainWallet;

pub struct DepositCoordinator {
    session: Arc<Session>,
    channels: Arc<ChannelResolver>,
    wallet: Arc<dyn OnChainWallet>,
    min_confirmations: u64,
}

impl DepositCoordinator {
    pub fn new(
        session: Arc<Session>,
        channels: Arc<ChannelResolver>,
        wallet: Arc<dyn OnChainWallet>,
        min_confirmations: u64,
    ) -> Self {
        Self {
            session,
            channels,
            wallet,
            min_confirmations: min_confirmations.max(1),
        }
    }

    /// Deposits `value` (decimal, 18 decimals) into the channel on `chain_id`.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - Chain of the channel to fund
    /// * `asset_id` - Asset to reconcile on the node
    /// * `value` - Human-readable amount, e.g. "1.0"
    ///
    /// # Returns
    ///
    /// * `Ok(ChannelState)` - Channel state after reconciliation
    /// * `Err(BridgeError)` - First failing step
    pub async fn deposit(&self, chain_id: u64, asset_id: &str, value: &str) -> BridgeResult<ChannelState> {
        let validated = self
            .session
            .validate(&TransferParams {
                value: Some(value.to_string()),
                from_chain_id: Some(chain_id),
                from_asset_id: Some(asset_id.to_string()),
                ..Default::default()
            })
            .await?;
        let amount = check_amount(validated.amount.unwrap_or_default())?;
        self.deposit_amount(chain_id, asset_id, amount, &NoopObserver).await
    }

    /// Deposits `amount` base units, reporting phases to `observer`.
    pub async fn deposit_amount(
        &self,
        chain_id: u64,
        asset_id: &str,
        amount: U256,
        observer: &dyn PhaseObserver,
    ) -> BridgeResult<ChannelState> {
        self.session.require_identity().await?;
        check_amount(amount)?;

        let channel = self.channels.resolve(chain_id).await?;
        let channel_address = channel.channel_address.clone();

        let wallet_chain = self
            .wallet
            .chain_id()
            .await
            .map_err(|e| BridgeError::OnChainDepositFailed {
                channel_address: channel_address.clone(),
                reason: e.to_string(),
            })?;
        if wallet_chain != chain_id {
            return Err(BridgeError::ChainMismatch {
                expected: chain_id,
                actual: wallet_chain,
            });
        }

        info!("Depositing {} wei into channel {} on chain {}", amount, channel_address, chain_id);
        let tx_hash = self
            .wallet
            .send_transaction(&channel_address, amount)
            .await
            .map_err(|e| BridgeError::OnChainDepositFailed {
                channel_address: channel_address.clone(),
                reason: e.to_string(),
            })?;

        let receipt = self
            .wallet
            .wait_for_confirmations(&tx_hash, self.min_confirmations)
            .await
            .map_err(|e| BridgeError::OnChainDepositFailed {
                channel_address: channel_address.clone(),
                reason: e.to_string(),
            })?;
        info!(
            "Deposit {} confirmed in block {} ({} confirmations)",
            receipt.transaction_hash, receipt.block_number, receipt.confirmations
        );

        observer.on_phase(PipelinePhase::Reconciling);
        if let Err(e) = self.session.node().reconcile_deposit(&channel_address, asset_id).await {
            error!(
                "Deposit {} is confirmed on-chain but not reconciled into channel {}: {}",
                tx_hash, channel_address, e
            );
            return Err(BridgeError::ReconciliationFailed {
                channel_address,
                reason: e.to_string(),
            });
        }

        self.channels.refresh(&channel_address).await
    }
}

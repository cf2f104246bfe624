//! Withdrawal Coordination
//!
//! Moves an off-chain channel balance to an on-chain address on the
//! channel's chain.

use ethereum_types::U256;
use std::sync::Arc;
use tracing::info;

use super::channel::ChannelResolver;
use crate::error::{BridgeError, BridgeResult};
use crate::node::{ChannelState, WithdrawRequest};
use crate::session::Session;
use crate::validation::{check_address, check_amount, TransferParams};

pub struct WithdrawalCoordinator {
    session: Arc<Session>,
    channels: Arc<ChannelResolver>,
}

impl WithdrawalCoordinator {
    pub fn new(session: Arc<Session>, channels: Arc<ChannelResolver>) -> Self {
        Self { session, channels }
    }

    /// Withdraws `value` (decimal, 18 decimals) of `asset_id` to `recipient`.
    ///
    /// The recipient is validated before any node call.
    ///
    /// # Returns
    ///
    /// * `Ok(ChannelState)` - Channel state after the withdrawal
    /// * `Err(BridgeError)` - Validation, lookup or `WithdrawalFailed`
    pub async fn withdraw(
        &self,
        chain_id: u64,
        asset_id: &str,
        recipient: &str,
        value: &str,
    ) -> BridgeResult<ChannelState> {
        let validated = self
            .session
            .validate(&TransferParams {
                value: Some(value.to_string()),
                to_chain_id: Some(chain_id),
                to_asset_id: Some(asset_id.to_string()),
                withdrawal_address: Some(recipient.to_string()),
                ..Default::default()
            })
            .await?;
        let amount = check_amount(validated.amount.unwrap_or_default())?;
        self.withdraw_amount(chain_id, asset_id, recipient, amount).await
    }

    /// Withdraws `amount` base units of `asset_id` to `recipient`.
    pub async fn withdraw_amount(
        &self,
        chain_id: u64,
        asset_id: &str,
        recipient: &str,
        amount: U256,
    ) -> BridgeResult<ChannelState> {
        self.session.require_identity().await?;
        check_address(recipient)?;
        check_amount(amount)?;

        let channel = self.channels.resolve(chain_id).await?;
        let request = WithdrawRequest {
            channel_address: channel.channel_address.clone(),
            asset_id: asset_id.to_string(),
            amount,
            recipient: recipient.to_string(),
        };

        let result = self
            .session
            .node()
            .withdraw(&request)
            .await
            .map_err(|e| BridgeError::WithdrawalFailed {
                channel_address: channel.channel_address.clone(),
                reason: e.to_string(),
            })?;
        info!(
            "Withdrew {} wei of {} from {} to {} (transfer {}, tx {})",
            amount,
            asset_id,
            channel.channel_address,
            recipient,
            result.transfer_id,
            result.transaction_hash.as_deref().unwrap_or("pending")
        );

        self.channels.refresh(&channel.channel_address).await
    }
}

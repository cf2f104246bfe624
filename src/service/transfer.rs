//! Hashlock Transfer Coordination
//!
//! Moves an off-chain balance from the sender channel to the receiver
//! channel through the routing counterparty:
//!
//! 1. Generate a fresh pre-image and its lock hash
//! 2. Arm a subscription on the receiver channel
//! 3. Create the hashlock transfer on the sender channel
//! 4. Wait for the routed transfer to appear on the receiver channel
//! 5. Resolve it with the pre-image
//!
//! The pre-image never leaves this module except in the resolve call.

use ethereum_types::U256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::channel::ChannelResolver;
use super::tracker::{NoopObserver, PhaseObserver, PipelinePhase};
use crate::crypto::PreImage;
use crate::error::{BridgeError, BridgeResult, Stage};
use crate::events::{SubscriptionError, TransferSubscription};
use crate::node::{ChannelState, HashlockTransferRequest};
use crate::session::Session;
use crate::validation::{check_amount, check_route, TransferParams};

/// Lock expiry sent with every transfer; "0" disables timed expiry.
const NO_EXPIRY: &str = "0";

/// Result of a resolved hashlock transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub sender_channel: ChannelState,
    pub receiver_channel: ChannelState,
    /// Transfer ID on the receiver channel
    pub transfer_id: String,
}

pub struct HashlockTransferCoordinator {
    session: Arc<Session>,
    channels: Arc<ChannelResolver>,
    /// Channel-level dispute timeout in seconds
    transfer_timeout: u64,
    /// Bound on the created-event wait, `None` waits forever
    event_timeout: Option<Duration>,
}

impl HashlockTransferCoordinator {
    pub fn new(
        session: Arc<Session>,
        channels: Arc<ChannelResolver>,
        transfer_timeout: u64,
        event_timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            channels,
            transfer_timeout,
            event_timeout,
        }
    }

    /// Transfers `value` (decimal, 18 decimals) from `sender_chain_id` to `receiver_chain_id`.
    ///
    /// # Arguments
    ///
    /// * `sender_chain_id` - Chain of the channel the funds leave
    /// * `asset_id` - Asset to transfer
    /// * `value` - Human-readable amount, e.g. "0.5"
    /// * `receiver_chain_id` - Chain of the channel the funds arrive in
    ///
    /// # Returns
    ///
    /// * `Ok(TransferOutcome)` - Refreshed channels and the resolved transfer ID
    /// * `Err(BridgeError)` - First failing step
    pub async fn transfer(
        &self,
        sender_chain_id: u64,
        asset_id: &str,
        value: &str,
        receiver_chain_id: u64,
    ) -> BridgeResult<TransferOutcome> {
        let validated = self
            .session
            .validate(&TransferParams {
                value: Some(value.to_string()),
                from_chain_id: Some(sender_chain_id),
                from_asset_id: Some(asset_id.to_string()),
                to_chain_id: Some(receiver_chain_id),
                ..Default::default()
            })
            .await?;
        let amount = check_amount(validated.amount.unwrap_or_default())?;
        self.transfer_amount(sender_chain_id, asset_id, amount, receiver_chain_id, &NoopObserver)
            .await
    }

    /// Transfers `amount` base units, reporting phases to `observer`.
    pub async fn transfer_amount(
        &self,
        sender_chain_id: u64,
        asset_id: &str,
        amount: U256,
        receiver_chain_id: u64,
        observer: &dyn PhaseObserver,
    ) -> BridgeResult<TransferOutcome> {
        let identity = self.session.require_identity().await?;
        check_amount(amount)?;
        check_route(sender_chain_id, receiver_chain_id)?;

        let pre_image = PreImage::random();
        let lock_hash = pre_image.lock_hash();

        let sender = self.channels.resolve(sender_chain_id).await?;
        let receiver = self.channels.resolve(receiver_chain_id).await?;

        let node = self.session.node();
        let subscription = TransferSubscription::new(receiver.channel_address.clone(), node.subscribe_transfer_created())
            .with_lock_hash(lock_hash);

        let request = HashlockTransferRequest {
            channel_address: sender.channel_address.clone(),
            recipient_chain_id: receiver_chain_id,
            asset_id: asset_id.to_string(),
            amount,
            recipient: identity,
            lock_hash,
            expiry: NO_EXPIRY.to_string(),
            timeout: self.transfer_timeout,
            meta: serde_json::json!({}),
        };

        info!(
            "Creating hashlock transfer: {} wei of {} from {} (chain {}) to {} (chain {}), lock {}",
            amount,
            asset_id,
            sender.channel_address,
            sender_chain_id,
            receiver.channel_address,
            receiver_chain_id,
            lock_hash
        );
        let created = node
            .create_conditional_transfer(&request)
            .await
            .map_err(|e| BridgeError::TransferCreationFailed {
                channel_address: sender.channel_address.clone(),
                reason: e.to_string(),
            })?;
        info!("Created transfer {} on {}", created.transfer_id, created.channel_address);

        observer.on_phase(PipelinePhase::AwaitingEvent);
        let event = match subscription.first_match(self.event_timeout).await {
            Ok(event) => event,
            Err(e) => {
                error!(
                    "Transfer {} created on {} but never observed on {}; funds stay locked under {}",
                    created.transfer_id, sender.channel_address, receiver.channel_address, lock_hash
                );
                return Err(match e {
                    SubscriptionError::TimedOut(waited) => BridgeError::Timeout {
                        stage: Stage::EventWait,
                        waited_ms: waited.as_millis() as u64,
                    },
                    SubscriptionError::Closed => BridgeError::TransferResolutionFailed {
                        channel_address: receiver.channel_address.clone(),
                        reason: e.to_string(),
                    },
                });
            }
        };
        let transfer_id = event.transfer.transfer_id;
        info!("Transfer {} arrived on {}", transfer_id, receiver.channel_address);

        observer.on_phase(PipelinePhase::Resolving);
        if let Err(e) = node
            .resolve_transfer(&receiver.channel_address, &transfer_id, &pre_image)
            .await
        {
            error!(
                "Transfer {} on {} was not resolved; it stays locked under {} and the secret is discarded",
                transfer_id, receiver.channel_address, lock_hash
            );
            return Err(BridgeError::TransferResolutionFailed {
                channel_address: receiver.channel_address.clone(),
                reason: e.to_string(),
            });
        }
        drop(pre_image);
        info!("Resolved transfer {} on {}", transfer_id, receiver.channel_address);

        let sender_channel = self.channels.refresh(&sender.channel_address).await?;
        let receiver_channel = self.channels.refresh(&receiver.channel_address).await?;

        Ok(TransferOutcome {
            sender_channel,
            receiver_channel,
            transfer_id,
        })
    }
}

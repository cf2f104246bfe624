//! Channel Resolution
//!
//! Finds the channel between the local identity and the routing
//! counterparty on a given chain. Channel state is always fetched fresh
//! from the node. Channel setup lives here too but is only used outside
//! the transfer path.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::node::ChannelState;
use crate::session::Session;

pub struct ChannelResolver {
    session: Arc<Session>,
    /// Dispute timeout in seconds for newly set up channels
    channel_timeout: u64,
}

impl ChannelResolver {
    pub fn new(session: Arc<Session>, channel_timeout: u64) -> Self {
        Self {
            session,
            channel_timeout,
        }
    }

    /// Looks up the channel with the counterparty on `chain_id`.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - Settlement chain of the channel
    ///
    /// # Returns
    ///
    /// * `Ok(ChannelState)` - Current channel state
    /// * `Err(BridgeError)` - `NotConnected`, or `ChannelLookupFailed` when the node has no such channel
    pub async fn resolve(&self, chain_id: u64) -> BridgeResult<ChannelState> {
        let identity = self.session.require_identity().await?;
        let counterparty = self.session.counterparty();

        self.session
            .node()
            .get_channel_by_participants(&identity, counterparty, chain_id)
            .await
            .map_err(|e| BridgeError::ChannelLookupFailed {
                target: format!("chain {}", chain_id),
                reason: e.to_string(),
            })
    }

    /// Re-fetches a channel by its address.
    pub async fn refresh(&self, channel_address: &str) -> BridgeResult<ChannelState> {
        self.session.require_identity().await?;
        self.session
            .node()
            .get_channel(channel_address)
            .await
            .map_err(|e| BridgeError::ChannelLookupFailed {
                target: channel_address.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sets up a channel with the counterparty on `chain_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Address of the new channel
    /// * `Err(BridgeError)` - `NotConnected` or `ChannelSetupFailed`
    pub async fn setup_channel(&self, chain_id: u64) -> BridgeResult<String> {
        self.session.require_identity().await?;
        let result = self
            .session
            .node()
            .setup_channel(self.session.counterparty(), chain_id, self.channel_timeout)
            .await
            .map_err(|e| BridgeError::ChannelSetupFailed {
                chain_id,
                reason: e.to_string(),
            })?;

        info!("Set up channel {} on chain {}", result.channel_address, chain_id);
        Ok(result.channel_address)
    }

    /// Makes sure a channel exists on every chain in `chain_ids`.
    ///
    /// Chains are handled one after another. A chain whose lookup fails gets
    /// a channel set up and is then resolved again. Per-chain failures are
    /// logged and returned; they never abort the batch.
    ///
    /// # Returns
    ///
    /// * One `(chain_id, result)` pair per input chain, in input order
    pub async fn ensure_channels(&self, chain_ids: &[u64]) -> Vec<(u64, BridgeResult<ChannelState>)> {
        let mut results = Vec::with_capacity(chain_ids.len());

        for &chain_id in chain_ids {
            let result = match self.resolve(chain_id).await {
                Ok(channel) => Ok(channel),
                Err(BridgeError::ChannelLookupFailed { reason, .. }) => {
                    info!("No channel on chain {} ({}), setting one up", chain_id, reason);
                    match self.setup_channel(chain_id).await {
                        Ok(_) => self.resolve(chain_id).await,
                        Err(e) => Err(e),
                    }
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                warn!("Channel check for chain {} failed: {}", chain_id, e);
            }
            results.push((chain_id, result));
        }

        results
    }
}

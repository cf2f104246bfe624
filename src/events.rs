//! Transfer event delivery
//!
//! The node announces every conditional transfer that lands in one of the
//! local channels. [`TransferEventBus`] fans those notifications out to any
//! number of waiters; [`TransferSubscription`] is a one-shot waiter for the
//! first event on a single channel.
//!
//! A subscription buffers every event published after it was created, so it
//! must be armed before the request that triggers the event is sent.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::crypto::LockHash;
use crate::node::TransferCreatedEvent;

/// Default number of undelivered events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Broadcast bus for transfer-created events.
#[derive(Debug, Clone)]
pub struct TransferEventBus {
    sender: broadcast::Sender<TransferCreatedEvent>,
}

impl TransferEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every live subscriber.
    ///
    /// # Returns
    ///
    /// * Number of subscribers that received the event (0 if nobody is waiting)
    pub fn publish(&self, event: TransferCreatedEvent) -> usize {
        debug!(
            "Publishing transfer-created event: channel={}, transfer_id={}",
            event.channel_address, event.transfer.transfer_id
        );
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferCreatedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TransferEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("transfer event stream closed")]
    Closed,

    #[error("no matching transfer event within {0:?}")]
    TimedOut(Duration),
}

/// One-shot subscription for the first transfer-created event on a channel.
///
/// With a lock hash set, only events whose hashlock state carries that lock
/// match; events without a lock hash are skipped as well. Dropping the
/// subscription (after a match, on timeout or on any failure) unsubscribes it.
pub struct TransferSubscription {
    channel_address: String,
    lock_hash: Option<LockHash>,
    receiver: broadcast::Receiver<TransferCreatedEvent>,
}

impl TransferSubscription {
    /// Arms a subscription filtered to `channel_address`.
    ///
    /// # Arguments
    ///
    /// * `channel_address` - Channel whose events are of interest (compared case-insensitively)
    /// * `receiver` - Receiver obtained from the node before the triggering request
    pub fn new(channel_address: impl Into<String>, receiver: broadcast::Receiver<TransferCreatedEvent>) -> Self {
        Self {
            channel_address: channel_address.into(),
            lock_hash: None,
            receiver,
        }
    }

    /// Restricts matches to transfers locked under `lock_hash`.
    pub fn with_lock_hash(mut self, lock_hash: LockHash) -> Self {
        self.lock_hash = Some(lock_hash);
        self
    }

    fn matches(&self, event: &TransferCreatedEvent) -> bool {
        if !event.channel_address.eq_ignore_ascii_case(&self.channel_address) {
            return false;
        }
        match self.lock_hash {
            Some(expected) => event.transfer.lock_hash() == Some(expected),
            None => true,
        }
    }

    pub fn channel_address(&self) -> &str {
        &self.channel_address
    }

    /// Waits for the first event on the subscribed channel.
    ///
    /// Events for other channels or other locks are skipped. If the receiver
    /// fell behind, the dropped events are logged and the wait continues.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound for the wait, `None` waits indefinitely
    ///
    /// # Returns
    ///
    /// * `Ok(TransferCreatedEvent)` - First matching event
    /// * `Err(SubscriptionError)` - Stream closed or timeout elapsed
    pub async fn first_match(self, timeout: Option<Duration>) -> Result<TransferCreatedEvent, SubscriptionError> {
        let mut subscription = self;

        let wait = async move {
            loop {
                match subscription.receiver.recv().await {
                    Ok(event) if subscription.matches(&event) => return Ok(event),
                    Ok(event) => {
                        debug!(
                            "Ignoring transfer {} on channel {} (waiting on {})",
                            event.transfer.transfer_id, event.channel_address, subscription.channel_address
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Transfer event subscriber for {} lagged, {} events dropped",
                            subscription.channel_address, skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| SubscriptionError::TimedOut(limit))?,
            None => wait.await,
        }
    }
}

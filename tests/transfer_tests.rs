//! Unit tests for the hashlock transfer coordinator

use channel_bridge::crypto::PreImage;
use channel_bridge::error::{BridgeError, Stage};
use channel_bridge::service::{ChannelResolver, HashlockTransferCoordinator};
use ethereum_types::U256;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    channel_address_for, connected_session, ether, MockNode, DUMMY_ASSET_ID, DUMMY_PUBLIC_IDENTIFIER,
    DUMMY_RECEIVER_CHAIN_ID, DUMMY_SENDER_CHAIN_ID, DUMMY_TRANSFER_ID,
};

async fn coordinator(node: Arc<MockNode>, event_timeout: Option<Duration>) -> HashlockTransferCoordinator {
    let session = connected_session(node).await;
    let channels = Arc::new(ChannelResolver::new(session.clone(), 172_800));
    HashlockTransferCoordinator::new(session, channels, 86_400, event_timeout)
}

/// What is tested: the routed transfer "tx-42" is resolved exactly once with the generated secret
/// Why: The event fires inside the create call; a subscription armed afterwards would miss it
#[tokio::test]
async fn test_transfer_resolves_routed_transfer_once() {
    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let outcome = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap();

    assert_eq!(outcome.transfer_id, DUMMY_TRANSFER_ID);
    assert_eq!(outcome.sender_channel.channel_address, channel_address_for(DUMMY_SENDER_CHAIN_ID));
    assert_eq!(outcome.receiver_channel.channel_address, channel_address_for(DUMMY_RECEIVER_CHAIN_ID));

    let calls = node.resolve_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].transfer_id, DUMMY_TRANSFER_ID);
    assert_eq!(calls[0].channel_address, channel_address_for(DUMMY_RECEIVER_CHAIN_ID));

    // The revealed secret hashes to the lock used at creation time
    let created = node.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    let revealed = PreImage::from_hex(&calls[0].pre_image_hex).unwrap();
    assert!(revealed.unlocks(&created[0].lock_hash));
}

/// What is tested: the create request carries the hashlock parameters
/// Why: Recipient, expiry and timeout define who can claim the transfer and for how long
#[tokio::test]
async fn test_transfer_create_request_fields() {
    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap();

    let created = node.created.lock().unwrap().clone();
    let request = &created[0];
    assert_eq!(request.channel_address, channel_address_for(DUMMY_SENDER_CHAIN_ID));
    assert_eq!(request.recipient, DUMMY_PUBLIC_IDENTIFIER);
    assert_eq!(request.recipient_chain_id, DUMMY_RECEIVER_CHAIN_ID);
    assert_eq!(request.amount, ether(1) / U256::from(2u64));
    assert_eq!(request.asset_id, DUMMY_ASSET_ID);
    assert_eq!(request.expiry, "0");
    assert_eq!(request.timeout, 86_400);
    assert_eq!(request.meta, serde_json::json!({}));
}

/// What is tested: every transfer uses a fresh secret
/// Why: A reused secret lets anyone who saw the first resolve claim the second transfer
#[tokio::test]
async fn test_transfer_uses_fresh_secret_each_time() {
    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    for _ in 0..2 {
        transfers
            .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.1", DUMMY_RECEIVER_CHAIN_ID)
            .await
            .unwrap();
    }

    let created = node.created.lock().unwrap().clone();
    assert_ne!(created[0].lock_hash, created[1].lock_hash);
    let calls = node.resolve_calls.lock().unwrap().clone();
    assert_ne!(calls[0].pre_image_hex, calls[1].pre_image_hex);
}

/// What is tested: the node's resolver accepts only the secret of the transfer being resolved
/// Why: hash(secret) == lock is the whole security property of the transfer
#[tokio::test]
async fn test_resolver_rejects_other_secrets() {
    use channel_bridge::node::NodeClient;

    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;
    transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap();
    let receiver_channel = channel_address_for(DUMMY_RECEIVER_CHAIN_ID);

    for wrong in [PreImage::from_bytes([0x42; 32]), PreImage::random()] {
        let result = node.resolve_transfer(&receiver_channel, DUMMY_TRANSFER_ID, &wrong).await;
        assert!(result.is_err());
    }

    // The right secret does not unlock a transfer announced under another lock
    let revealed = node.resolve_calls.lock().unwrap()[0].pre_image_hex.clone();
    let secret = PreImage::from_hex(&revealed).unwrap();
    node.publish_locked(DUMMY_RECEIVER_CHAIN_ID, "tx-other", Some(PreImage::random().lock_hash()));
    assert!(node.resolve_transfer(&receiver_channel, "tx-other", &secret).await.is_err());
    assert!(node.resolve_transfer(&receiver_channel, DUMMY_TRANSFER_ID, &secret).await.is_ok());
}

/// What is tested: a create error fails with TransferCreationFailed and resolves nothing
/// Why: No event will ever arrive for a transfer that was never created
#[tokio::test]
async fn test_transfer_create_failure() {
    let node = Arc::new(MockNode::new());
    node.fail_create.store(true, Ordering::SeqCst);
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let err = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::TransferCreationFailed { .. }));
    assert!(node.resolve_calls.lock().unwrap().is_empty());
    assert_eq!(node.events.subscriber_count(), 0);
}

/// What is tested: a transfer that is never routed times out in the event-wait stage
/// Why: The wait is bounded by the configured event timeout
#[tokio::test]
async fn test_transfer_event_wait_times_out() {
    let node = Arc::new(MockNode::new());
    node.emit_on_create.store(false, Ordering::SeqCst);
    let transfers = coordinator(node.clone(), Some(Duration::from_millis(50))).await;

    let err = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Timeout { stage: Stage::EventWait, .. }));
    assert_eq!(err.stage(), Stage::EventWait);
    assert!(node.resolve_calls.lock().unwrap().is_empty());
    assert_eq!(node.events.subscriber_count(), 0);
}

/// What is tested: an event published later (not inside create) is still picked up
/// Why: Routing through the counterparty takes time; the wait must outlast the create call
#[tokio::test]
async fn test_transfer_waits_for_delayed_event() {
    let node = Arc::new(MockNode::new());
    node.emit_on_create.store(false, Ordering::SeqCst);
    let transfers = coordinator(node.clone(), None).await;

    let publisher = node.clone();
    tokio::spawn(async move {
        while publisher.created.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Unrelated channel first, then the receiver channel
        publisher.publish_for_chain(DUMMY_SENDER_CHAIN_ID, "tx-unrelated");
        publisher.publish_for_chain(DUMMY_RECEIVER_CHAIN_ID, "tx-late");
    });

    let outcome = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap();

    assert_eq!(outcome.transfer_id, "tx-late");
    assert_eq!(node.resolve_calls.lock().unwrap().len(), 1);
}

/// What is tested: a zero amount is rejected before any node call
/// Why: Validation precedes secret generation and channel lookup
#[tokio::test]
async fn test_transfer_rejects_zero_amount() {
    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let err = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::InvalidAmount { .. }));
    assert_eq!(node.create_count.load(Ordering::SeqCst), 0);
}

/// What is tested: an inbound transfer under a different lock on the receiver channel is not resolved
/// Why: Revealing the secret against someone else's transfer fails and strands the routed one
#[tokio::test]
async fn test_transfer_ignores_foreign_lock() {
    let node = Arc::new(MockNode::new());
    node.emit_on_create.store(false, Ordering::SeqCst);
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let publisher = node.clone();
    tokio::spawn(async move {
        while publisher.created.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let foreign = PreImage::random().lock_hash();
        publisher.publish_locked(DUMMY_RECEIVER_CHAIN_ID, "tx-foreign", Some(foreign));
        publisher.publish_locked(DUMMY_RECEIVER_CHAIN_ID, "tx-unlocked", None);
        publisher.publish_for_chain(DUMMY_RECEIVER_CHAIN_ID, "tx-routed");
    });

    let outcome = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap();

    assert_eq!(outcome.transfer_id, "tx-routed");
    let calls = node.resolve_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].transfer_id, "tx-routed");
}

/// What is tested: a route with the same sender and receiver chain is rejected before any node call
/// Why: Both ends are the same channel, so the transfer's own creation event would be resolved
#[tokio::test]
async fn test_transfer_rejects_same_chain_route() {
    let node = Arc::new(MockNode::new());
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let err = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_SENDER_CHAIN_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::SameChainRoute { chain_id } if chain_id == DUMMY_SENDER_CHAIN_ID));
    assert_eq!(err.stage(), Stage::Validation);
    assert_eq!(node.create_count.load(Ordering::SeqCst), 0);
}

/// What is tested: a failed resolve surfaces TransferResolutionFailed for the receiver channel
/// Why: The routed transfer stays locked and the caller must learn which channel holds it
#[tokio::test]
async fn test_transfer_resolve_failure() {
    let node = Arc::new(MockNode::new());
    node.fail_resolve.store(true, Ordering::SeqCst);
    let transfers = coordinator(node.clone(), Some(Duration::from_secs(5))).await;

    let err = transfers
        .transfer(DUMMY_SENDER_CHAIN_ID, DUMMY_ASSET_ID, "0.5", DUMMY_RECEIVER_CHAIN_ID)
        .await
        .unwrap_err();

    match err {
        BridgeError::TransferResolutionFailed { channel_address, .. } => {
            assert_eq!(channel_address, channel_address_for(DUMMY_RECEIVER_CHAIN_ID));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(node.resolve_calls.lock().unwrap().len(), 1);
    assert_eq!(node.events.subscriber_count(), 0);
}

//! Shared test helpers for channel bridge tests
//!
//! Constants, configuration builders and in-memory doubles for the node
//! client and the on-chain wallet.

#![allow(dead_code)]

use async_trait::async_trait;
use channel_bridge::crypto::{LockHash, PreImage};
use channel_bridge::error::{NodeError, NodeResult, WalletError, WalletResult};
use channel_bridge::events::TransferEventBus;
use channel_bridge::node::{
    Balance, ChannelResult, ChannelState, ConnectRequest, CrossChainTransferRequest, HashlockTransferRequest, NetworkContext, NodeClient,
    HashlockState, NodeConfig, TransferCreatedEvent, TransferDescriptor, TransferResult, WithdrawRequest, WithdrawResult,
};
use channel_bridge::session::Session;
use channel_bridge::wallet::{OnChainWallet, TxReceipt};
use ethereum_types::U256;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

// ============================================================================
// CONSTANTS
// ============================================================================

// --------------------------------- IDs ----------------------------------

/// Dummy local public identifier
pub const DUMMY_PUBLIC_IDENTIFIER: &str = "vector5ArRsL26avPNyfvJd2qMAppsEVQD8XvjRSTdmhcm6WoNcJ3ugz";

/// Dummy routing counterparty identifier
pub const DUMMY_COUNTERPARTY: &str = "vector8Uz1BdpA9hV5uTm6QUv5jj1PsUyCH8m8ciA94voCzsxVmrBRor";

/// Dummy signer address (EVM format, 40 hex characters)
pub const DUMMY_SIGNER_ADDR: &str = "0x0000000000000000000000000000000000000001";

/// Transfer ID the mock node announces for routed transfers
pub const DUMMY_TRANSFER_ID: &str = "tx-42";

// -------------------------------- CHAINS --------------------------------

pub const DUMMY_SENDER_CHAIN_ID: u64 = 1;
pub const DUMMY_RECEIVER_CHAIN_ID: u64 = 2;

/// Native asset id ("ETH")
pub const DUMMY_ASSET_ID: &str = "0x0000000000000000000000000000000000000000";

// -------------------------------- USERS ---------------------------------

/// Dummy withdrawal recipient (EVM format, 40 hex characters)
pub const DUMMY_RECIPIENT_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// Dummy RPC account (EVM format, 40 hex characters)
pub const DUMMY_FROM_ADDR: &str = "0x0000000000000000000000000000000000000007";

/// Dummy transaction hash
pub const DUMMY_TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

// ============================================================================
// BUILDERS
// ============================================================================

/// Channel address the mock node uses for `chain_id`.
pub fn channel_address_for(chain_id: u64) -> String {
    format!("0x{:040x}", 0xc0 + chain_id)
}

/// Empty channel between the dummy identity and counterparty on `chain_id`.
pub fn channel_for(chain_id: u64) -> ChannelState {
    ChannelState {
        channel_address: channel_address_for(chain_id),
        alice_identifier: DUMMY_COUNTERPARTY.to_string(),
        bob_identifier: DUMMY_PUBLIC_IDENTIFIER.to_string(),
        network_context: NetworkContext {
            chain_id,
            channel_factory_address: None,
            transfer_registry_address: None,
        },
        asset_ids: vec![],
        balances: vec![],
        nonce: 1,
    }
}

pub fn dummy_node_config() -> NodeConfig {
    NodeConfig {
        public_identifier: DUMMY_PUBLIC_IDENTIFIER.to_string(),
        signer_address: DUMMY_SIGNER_ADDR.to_string(),
        index: 0,
    }
}

/// `value` ether in wei.
pub fn ether(value: u64) -> U256 {
    U256::from(value) * U256::exp10(18)
}

/// Minimal valid configuration TOML with two chains.
pub fn config_toml() -> String {
    format!(
        r#"
[node]
url = "http://127.0.0.1:8001"

[router]
counterparty = "{}"

[[chain]]
name = "chain-a"
chain_id = {}
rpc_url = "http://127.0.0.1:8545"
from_address = "{}"

[[chain]]
name = "chain-b"
chain_id = {}
rpc_url = "http://127.0.0.1:8546"
from_address = "{}"
"#,
        DUMMY_COUNTERPARTY, DUMMY_SENDER_CHAIN_ID, DUMMY_FROM_ADDR, DUMMY_RECEIVER_CHAIN_ID, DUMMY_FROM_ADDR
    )
}

/// Session over `node`, not yet connected.
pub fn session_with(node: Arc<MockNode>) -> Arc<Session> {
    let node: Arc<dyn NodeClient> = node;
    Arc::new(Session::new(
        node,
        "mock://node",
        vec![DUMMY_SENDER_CHAIN_ID, DUMMY_RECEIVER_CHAIN_ID],
        DUMMY_COUNTERPARTY,
    ))
}

/// Connected session over `node`.
pub async fn connected_session(node: Arc<MockNode>) -> Arc<Session> {
    let session = session_with(node);
    session.connect().await.unwrap();
    session
}

// ============================================================================
// MOCK NODE
// ============================================================================

/// Arguments of one `resolve_transfer` call.
#[derive(Debug, Clone)]
pub struct ResolveCall {
    pub channel_address: String,
    pub transfer_id: String,
    pub pre_image_hex: String,
}

/// In-memory channel node.
///
/// Channels exist for the sender and receiver chains. Creating a transfer
/// publishes the routed transfer event on the receiver channel before the
/// create call returns. Every published transfer carries a lock hash, and
/// resolving checks `sha256(pre_image)` against the lock of that transfer only.
pub struct MockNode {
    pub events: TransferEventBus,
    channels: Mutex<HashMap<u64, ChannelState>>,
    /// Funds sent on-chain to a channel address and not yet reconciled
    onchain: Mutex<HashMap<String, U256>>,
    /// Lock hash per announced transfer id
    lock_hashes: Mutex<HashMap<String, LockHash>>,
    pub resolve_calls: Mutex<Vec<ResolveCall>>,
    pub created: Mutex<Vec<HashlockTransferRequest>>,
    pub withdrawals: Mutex<Vec<WithdrawRequest>>,
    pub setup_chains: Mutex<Vec<u64>>,
    pub cross_requests: Mutex<Vec<CrossChainTransferRequest>>,
    /// Result returned by `cross_chain_transfer`; unsupported while unset
    pub cross_result: Mutex<Option<serde_json::Value>>,

    pub connect_count: AtomicUsize,
    pub reconcile_count: AtomicUsize,
    pub create_count: AtomicUsize,
    pub withdraw_count: AtomicUsize,

    pub fail_connect: AtomicBool,
    pub fail_reconcile: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_resolve: AtomicBool,
    pub fail_withdraw: AtomicBool,
    /// Publish the routed transfer event inside `create_conditional_transfer`
    pub emit_on_create: AtomicBool,
    /// Chains on which `setup_channel` is refused
    pub refuse_setup: Mutex<HashSet<u64>>,
}

impl MockNode {
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(DUMMY_SENDER_CHAIN_ID, channel_for(DUMMY_SENDER_CHAIN_ID));
        channels.insert(DUMMY_RECEIVER_CHAIN_ID, channel_for(DUMMY_RECEIVER_CHAIN_ID));
        Self::with_channels(channels)
    }

    /// Node without any channels.
    pub fn empty() -> Self {
        Self::with_channels(HashMap::new())
    }

    fn with_channels(channels: HashMap<u64, ChannelState>) -> Self {
        Self {
            events: TransferEventBus::default(),
            channels: Mutex::new(channels),
            onchain: Mutex::new(HashMap::new()),
            lock_hashes: Mutex::new(HashMap::new()),
            resolve_calls: Mutex::new(vec![]),
            created: Mutex::new(vec![]),
            withdrawals: Mutex::new(vec![]),
            setup_chains: Mutex::new(vec![]),
            cross_requests: Mutex::new(vec![]),
            cross_result: Mutex::new(None),
            connect_count: AtomicUsize::new(0),
            reconcile_count: AtomicUsize::new(0),
            create_count: AtomicUsize::new(0),
            withdraw_count: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            fail_reconcile: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            fail_withdraw: AtomicBool::new(false),
            emit_on_create: AtomicBool::new(true),
            refuse_setup: Mutex::new(HashSet::new()),
        }
    }

    /// Records an on-chain transfer to `to` (called by [`MockWallet`]).
    pub fn credit_onchain(&self, to: &str, value: U256) {
        let mut onchain = self.onchain.lock().unwrap();
        let entry = onchain.entry(to.to_lowercase()).or_insert_with(U256::zero);
        *entry = *entry + value;
    }

    pub fn remove_channel(&self, chain_id: u64) {
        self.channels.lock().unwrap().remove(&chain_id);
    }

    pub fn channel(&self, chain_id: u64) -> Option<ChannelState> {
        self.channels.lock().unwrap().get(&chain_id).cloned()
    }

    /// Announces `transfer_id` on `chain_id` under the lock of the latest created transfer.
    pub fn publish_for_chain(&self, chain_id: u64, transfer_id: &str) {
        let lock_hash = self.created.lock().unwrap().last().map(|r| r.lock_hash);
        self.publish_locked(chain_id, transfer_id, lock_hash);
    }

    /// Announces `transfer_id` on `chain_id` under `lock_hash`.
    pub fn publish_locked(&self, chain_id: u64, transfer_id: &str, lock_hash: Option<LockHash>) {
        if let Some(lock) = lock_hash {
            self.lock_hashes.lock().unwrap().insert(transfer_id.to_string(), lock);
        }
        self.events.publish(TransferCreatedEvent {
            channel_address: channel_address_for(chain_id),
            transfer: TransferDescriptor {
                transfer_id: transfer_id.to_string(),
                initiator: Some(DUMMY_COUNTERPARTY.to_string()),
                responder: Some(DUMMY_PUBLIC_IDENTIFIER.to_string()),
                chain_id: Some(chain_id),
                meta: None,
                transfer_state: Some(HashlockState {
                    lock_hash: lock_hash.map(|l| l.to_hex()),
                    expiry: Some("0".to_string()),
                }),
            },
            condition_type: Some("HashlockTransfer".to_string()),
        });
    }

    fn channel_by_address(&self, channel_address: &str) -> Option<ChannelState> {
        self.channels
            .lock()
            .unwrap()
            .values()
            .find(|c| c.channel_address.eq_ignore_ascii_case(channel_address))
            .cloned()
    }

    fn adjust_balance(&self, channel_address: &str, asset_id: &str, credit: U256, debit: U256) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels
            .values_mut()
            .find(|c| c.channel_address.eq_ignore_ascii_case(channel_address))
        {
            let index = match channel.asset_ids.iter().position(|a| a.eq_ignore_ascii_case(asset_id)) {
                Some(i) => i,
                None => {
                    channel.asset_ids.push(asset_id.to_string());
                    channel.balances.push(Balance {
                        to: vec![DUMMY_COUNTERPARTY.to_string(), DUMMY_SIGNER_ADDR.to_string()],
                        amount: vec!["0".to_string(), "0".to_string()],
                    });
                    channel.asset_ids.len() - 1
                }
            };
            let own = &mut channel.balances[index].amount[1];
            let current = U256::from_dec_str(own).unwrap();
            *own = (current + credit).saturating_sub(debit).to_string();
            channel.nonce += 1;
        }
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn connect(&self, _request: &ConnectRequest) -> NodeResult<NodeConfig> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(NodeError::Transport("connection refused".to_string()));
        }
        Ok(dummy_node_config())
    }

    async fn get_channel(&self, channel_address: &str) -> NodeResult<ChannelState> {
        self.channel_by_address(channel_address)
            .ok_or_else(|| NodeError::Rejected(format!("Channel not found: {}", channel_address)))
    }

    async fn get_channel_by_participants(
        &self,
        public_identifier: &str,
        counterparty: &str,
        chain_id: u64,
    ) -> NodeResult<ChannelState> {
        if public_identifier != DUMMY_PUBLIC_IDENTIFIER || counterparty != DUMMY_COUNTERPARTY {
            return Err(NodeError::Rejected("unknown participants".to_string()));
        }
        self.channel(chain_id)
            .ok_or_else(|| NodeError::Rejected(format!("Channel not found on chain {}", chain_id)))
    }

    async fn reconcile_deposit(&self, channel_address: &str, asset_id: &str) -> NodeResult<ChannelResult> {
        self.reconcile_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconcile.load(Ordering::SeqCst) {
            return Err(NodeError::Rejected("reconcile failed".to_string()));
        }
        let pending = self
            .onchain
            .lock()
            .unwrap()
            .remove(&channel_address.to_lowercase())
            .unwrap_or_default();
        self.adjust_balance(channel_address, asset_id, pending, U256::zero());
        Ok(ChannelResult {
            channel_address: channel_address.to_string(),
        })
    }

    async fn create_conditional_transfer(&self, request: &HashlockTransferRequest) -> NodeResult<TransferResult> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(NodeError::Rejected("insufficient collateral".to_string()));
        }
        self.created.lock().unwrap().push(request.clone());
        self.adjust_balance(&request.channel_address, &request.asset_id, U256::zero(), request.amount);

        if self.emit_on_create.load(Ordering::SeqCst) {
            self.publish_for_chain(request.recipient_chain_id, DUMMY_TRANSFER_ID);
        }

        Ok(TransferResult {
            channel_address: request.channel_address.clone(),
            transfer_id: "tx-sender-side".to_string(),
            routing_id: None,
        })
    }

    async fn resolve_transfer(
        &self,
        channel_address: &str,
        transfer_id: &str,
        pre_image: &PreImage,
    ) -> NodeResult<TransferResult> {
        self.resolve_calls.lock().unwrap().push(ResolveCall {
            channel_address: channel_address.to_string(),
            transfer_id: transfer_id.to_string(),
            pre_image_hex: pre_image.expose_hex(),
        });
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(NodeError::Transport("node went away".to_string()));
        }

        let matching = self
            .lock_hashes
            .lock()
            .unwrap()
            .get(transfer_id)
            .map_or(false, |lock| pre_image.unlocks(lock));
        if !matching {
            return Err(NodeError::Rejected("pre-image does not match lock hash".to_string()));
        }

        let amount = self
            .created
            .lock()
            .unwrap()
            .last()
            .map(|r| (r.asset_id.clone(), r.amount));
        if let Some((asset_id, amount)) = amount {
            self.adjust_balance(channel_address, &asset_id, amount, U256::zero());
        }

        Ok(TransferResult {
            channel_address: channel_address.to_string(),
            transfer_id: transfer_id.to_string(),
            routing_id: None,
        })
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> NodeResult<WithdrawResult> {
        self.withdraw_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_withdraw.load(Ordering::SeqCst) {
            return Err(NodeError::Rejected("withdrawal refused".to_string()));
        }
        self.withdrawals.lock().unwrap().push(request.clone());
        self.adjust_balance(&request.channel_address, &request.asset_id, U256::zero(), request.amount);
        Ok(WithdrawResult {
            channel_address: request.channel_address.clone(),
            transfer_id: "withdraw-1".to_string(),
            transaction_hash: Some(DUMMY_TX_HASH.to_string()),
        })
    }

    async fn setup_channel(&self, counterparty: &str, chain_id: u64, _timeout: u64) -> NodeResult<ChannelResult> {
        self.setup_chains.lock().unwrap().push(chain_id);
        if counterparty != DUMMY_COUNTERPARTY || self.refuse_setup.lock().unwrap().contains(&chain_id) {
            return Err(NodeError::Rejected(format!("setup refused on chain {}", chain_id)));
        }
        let channel = channel_for(chain_id);
        let channel_address = channel.channel_address.clone();
        self.channels.lock().unwrap().insert(chain_id, channel);
        Ok(ChannelResult { channel_address })
    }

    async fn cross_chain_transfer(&self, request: &CrossChainTransferRequest) -> NodeResult<serde_json::Value> {
        let result = self
            .cross_result
            .lock()
            .unwrap()
            .clone()
            .ok_or(NodeError::Unsupported("cross_chain_transfer"))?;
        self.cross_requests.lock().unwrap().push(request.clone());
        Ok(result)
    }

    fn subscribe_transfer_created(&self) -> broadcast::Receiver<TransferCreatedEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// MOCK WALLET
// ============================================================================

/// Wallet whose transactions confirm immediately.
///
/// Sent value is credited on the mock node so reconciliation can pick it up.
pub struct MockWallet {
    chain_id: u64,
    node: Option<Arc<MockNode>>,
    pub sent: Mutex<Vec<(String, U256)>>,
    pub fail_send: AtomicBool,
    pub revert: AtomicBool,
}

impl MockWallet {
    pub fn new(chain_id: u64, node: Option<Arc<MockNode>>) -> Self {
        Self {
            chain_id,
            node,
            sent: Mutex::new(vec![]),
            fail_send: AtomicBool::new(false),
            revert: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl OnChainWallet for MockWallet {
    async fn chain_id(&self) -> WalletResult<u64> {
        Ok(self.chain_id)
    }

    async fn send_transaction(&self, to: &str, value: U256) -> WalletResult<String> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(WalletError::Rpc {
                code: -32000,
                message: "insufficient funds".to_string(),
            });
        }
        self.sent.lock().unwrap().push((to.to_string(), value));
        if let Some(node) = &self.node {
            node.credit_onchain(to, value);
        }
        Ok(DUMMY_TX_HASH.to_string())
    }

    async fn wait_for_confirmations(&self, tx_hash: &str, confirmations: u64) -> WalletResult<TxReceipt> {
        if self.revert.load(Ordering::SeqCst) {
            return Err(WalletError::Reverted(tx_hash.to_string()));
        }
        Ok(TxReceipt {
            transaction_hash: tx_hash.to_string(),
            block_number: 100,
            confirmations,
        })
    }
}

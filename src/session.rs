//! Node connection session
//!
//! A [`Session`] owns the node client, the routing counterparty and the
//! local configuration returned by the node. It is constructed once per
//! process, connected once, and shared by every pipeline stage as an
//! `Arc<Session>`.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::node::{ConnectRequest, NodeClient, NodeConfig};
use crate::validation::{self, TransferParams, ValidatedParams};

pub struct Session {
    node: Arc<dyn NodeClient>,
    endpoint: String,
    supported_chains: Vec<u64>,
    counterparty: String,
    local: RwLock<Option<NodeConfig>>,
}

impl Session {
    /// Creates an unconnected session.
    ///
    /// # Arguments
    ///
    /// * `node` - Node client used by every stage
    /// * `endpoint` - Node endpoint passed on connect
    /// * `supported_chains` - Chain IDs the node should serve
    /// * `counterparty` - Public identifier of the routing counterparty
    pub fn new(
        node: Arc<dyn NodeClient>,
        endpoint: impl Into<String>,
        supported_chains: Vec<u64>,
        counterparty: impl Into<String>,
    ) -> Self {
        Self {
            node,
            endpoint: endpoint.into(),
            supported_chains,
            counterparty: counterparty.into(),
            local: RwLock::new(None),
        }
    }

    /// Creates an unconnected session from the loaded configuration.
    pub fn from_config(node: Arc<dyn NodeClient>, config: &BridgeConfig) -> Self {
        Self::new(
            node,
            config.node.url.clone(),
            config.supported_chain_ids(),
            config.router.counterparty.clone(),
        )
    }

    /// Connects to the node if not already connected.
    ///
    /// Concurrent callers serialise on the session lock, so the node sees at
    /// most one successful connect per session.
    ///
    /// # Returns
    ///
    /// * `Ok(NodeConfig)` - Local configuration (cached after the first call)
    /// * `Err(BridgeError::NotConnected)` - Node refused or was unreachable
    pub async fn connect(&self) -> BridgeResult<NodeConfig> {
        let mut local = self.local.write().await;
        if let Some(existing) = local.as_ref() {
            return Ok(existing.clone());
        }

        let request = ConnectRequest {
            endpoint: self.endpoint.clone(),
            supported_chains: self.supported_chains.clone(),
            router_identifier: self.counterparty.clone(),
        };
        let config = self
            .node
            .connect(&request)
            .await
            .map_err(|e| BridgeError::NotConnected(e.to_string()))?;

        info!(
            "Connected to channel node: identifier={}, signer={}",
            config.public_identifier, config.signer_address
        );
        *local = Some(config.clone());
        Ok(config)
    }

    /// Drops the cached configuration and disconnects the node client.
    pub async fn teardown(&self) {
        let mut local = self.local.write().await;
        if local.take().is_none() {
            return;
        }
        if let Err(e) = self.node.disconnect().await {
            warn!("Failed to disconnect from channel node: {}", e);
        }
        info!("Channel node session closed");
    }

    /// Snapshot of the local configuration, `None` before `connect`.
    pub async fn local_config(&self) -> Option<NodeConfig> {
        self.local.read().await.clone()
    }

    /// Local public identifier, or `NotConnected`.
    pub async fn require_identity(&self) -> BridgeResult<String> {
        match self.local.read().await.as_ref() {
            Some(config) if !config.public_identifier.trim().is_empty() => Ok(config.public_identifier.clone()),
            Some(_) => Err(BridgeError::NotConnected("local public identifier missing".to_string())),
            None => Err(BridgeError::NotConnected(
                "node connection has not been established".to_string(),
            )),
        }
    }

    /// Validates transfer parameters against this session's connection state.
    pub async fn validate(&self, params: &TransferParams) -> BridgeResult<ValidatedParams> {
        let local = self.local.read().await;
        validation::validate(local.as_ref(), params)
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.node
    }

    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }
}

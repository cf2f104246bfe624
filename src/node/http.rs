//! Channel Node REST Client
//!
//! HTTP client for a channel network server node. Successful responses are
//! bare JSON bodies; failures carry a JSON object with a `message` field.
//! Transfer-created events are delivered by the node to a webhook (see
//! [`super::webhook`]) and fanned out through the client's event bus.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use super::{
    ChannelResult, ChannelState, ConnectRequest, HashlockTransferRequest, NodeClient, NodeConfig, TransferCreatedEvent,
    TransferResult, WithdrawRequest, WithdrawResult, CONDITIONAL_TRANSFER_CREATED,
};
use crate::crypto::PreImage;
use crate::error::{NodeError, NodeResult};
use crate::events::TransferEventBus;

/// Hashlock transfer definition name registered on the node.
const HASHLOCK_TRANSFER: &str = "HashlockTransfer";

/// Error body returned by the node on non-2xx responses.
#[derive(Debug, Deserialize)]
struct NodeErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventSubscription<'a> {
    public_identifier: &'a str,
    events: HashMap<&'a str, &'a str>,
}

pub struct HttpNodeClient {
    client: Client,
    base_url: String,
    /// Public URL the node posts events to; no subscription when unset
    webhook_url: Option<String>,
    identifier: RwLock<Option<String>>,
    events: TransferEventBus,
}

impl HttpNodeClient {
    /// Creates a client for a server node.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Node REST base URL, e.g. "http://127.0.0.1:8001"
    /// * `webhook_url` - Public base URL of the local webhook receiver
    ///
    /// # Returns
    ///
    /// * `Ok(HttpNodeClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(base_url: impl Into<String>, webhook_url: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            webhook_url: webhook_url.map(|u| u.trim_end_matches('/').to_string()),
            identifier: RwLock::new(None),
            events: TransferEventBus::default(),
        })
    }

    /// Event bus the webhook receiver publishes into.
    pub fn event_bus(&self) -> TransferEventBus {
        self.events.clone()
    }

    async fn identifier(&self) -> NodeResult<String> {
        self.identifier.read().await.clone().ok_or(NodeError::NotConnected)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> NodeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        decode(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> NodeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        decode(path, response).await
    }

    async fn subscribe_webhook(&self, identifier: &str, webhook_url: &str) -> NodeResult<()> {
        let target = format!("{}/webhooks/conditional-transfer-created", webhook_url);
        let mut events = HashMap::new();
        events.insert(CONDITIONAL_TRANSFER_CREATED, target.as_str());
        let _: serde_json::Value = self
            .post(
                "/event/subscribe",
                &EventSubscription {
                    public_identifier: identifier,
                    events,
                },
            )
            .await?;
        info!("Subscribed {} events to {}", CONDITIONAL_TRANSFER_CREATED, target);
        Ok(())
    }
}

/// Maps a node response to `T`, or to `Rejected` with the node's message.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> NodeResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<NodeErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| format!("{} returned HTTP {}", path, status));
        return Err(NodeError::Rejected(message));
    }

    serde_json::from_str(&body).map_err(|e| NodeError::InvalidResponse(format!("{}: {}", path, e)))
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn connect(&self, request: &ConnectRequest) -> NodeResult<NodeConfig> {
        let configs: Vec<NodeConfig> = self.get("/config").await?;
        let config = configs
            .into_iter()
            .min_by_key(|c| c.index)
            .ok_or_else(|| NodeError::InvalidResponse("node has no configured identities".to_string()))?;

        debug!(
            "Node at {} serves identifier {} (router {}, chains {:?})",
            request.endpoint, config.public_identifier, request.router_identifier, request.supported_chains
        );

        if let Some(webhook_url) = &self.webhook_url {
            self.subscribe_webhook(&config.public_identifier, webhook_url).await?;
        }

        *self.identifier.write().await = Some(config.public_identifier.clone());
        Ok(config)
    }

    async fn disconnect(&self) -> NodeResult<()> {
        *self.identifier.write().await = None;
        Ok(())
    }

    async fn get_channel(&self, channel_address: &str) -> NodeResult<ChannelState> {
        let id = self.identifier().await?;
        self.get(&format!("/{}/channels/{}", id, channel_address)).await
    }

    async fn get_channel_by_participants(
        &self,
        public_identifier: &str,
        counterparty: &str,
        chain_id: u64,
    ) -> NodeResult<ChannelState> {
        self.get(&format!(
            "/{}/channels/counterparty/{}/chain-id/{}",
            public_identifier, counterparty, chain_id
        ))
        .await
    }

    async fn reconcile_deposit(&self, channel_address: &str, asset_id: &str) -> NodeResult<ChannelResult> {
        let id = self.identifier().await?;
        self.post(
            "/deposit",
            &json!({
                "publicIdentifier": id,
                "channelAddress": channel_address,
                "assetId": asset_id,
            }),
        )
        .await
    }

    async fn create_conditional_transfer(&self, request: &HashlockTransferRequest) -> NodeResult<TransferResult> {
        let id = self.identifier().await?;
        self.post(
            "/transfers/create",
            &json!({
                "publicIdentifier": id,
                "type": HASHLOCK_TRANSFER,
                "channelAddress": request.channel_address,
                "amount": request.amount.to_string(),
                "assetId": request.asset_id,
                "recipient": request.recipient,
                "recipientChainId": request.recipient_chain_id,
                "details": {
                    "lockHash": request.lock_hash.to_hex(),
                    "expiry": request.expiry,
                },
                "timeout": request.timeout.to_string(),
                "meta": request.meta,
            }),
        )
        .await
    }

    async fn resolve_transfer(
        &self,
        channel_address: &str,
        transfer_id: &str,
        pre_image: &PreImage,
    ) -> NodeResult<TransferResult> {
        let id = self.identifier().await?;
        self.post(
            "/transfers/resolve",
            &json!({
                "publicIdentifier": id,
                "channelAddress": channel_address,
                "transferId": transfer_id,
                "transferResolver": { "preImage": pre_image.expose_hex() },
            }),
        )
        .await
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> NodeResult<WithdrawResult> {
        let id = self.identifier().await?;
        self.post(
            "/withdraw",
            &json!({
                "publicIdentifier": id,
                "channelAddress": request.channel_address,
                "amount": request.amount.to_string(),
                "assetId": request.asset_id,
                "recipient": request.recipient,
            }),
        )
        .await
    }

    async fn setup_channel(&self, counterparty: &str, chain_id: u64, timeout: u64) -> NodeResult<ChannelResult> {
        let id = self.identifier().await?;
        self.post(
            "/setup",
            &json!({
                "publicIdentifier": id,
                "counterpartyIdentifier": counterparty,
                "chainId": chain_id,
                "timeout": timeout.to_string(),
            }),
        )
        .await
    }

    fn subscribe_transfer_created(&self) -> broadcast::Receiver<TransferCreatedEvent> {
        self.events.subscribe()
    }
}

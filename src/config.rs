//! Configuration Management Module
//!
//! Loads the bridge configuration: channel node connection, routing
//! counterparty, transfer tuning and the settlement chains the local
//! wallet can deposit on.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::validation::is_valid_address;

/// Default confirmations to wait for before reconciling a deposit.
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 1;
/// Default hashlock transfer timeout in seconds (one day).
pub const DEFAULT_TRANSFER_TIMEOUT: u64 = 86_400;
/// Default channel dispute timeout in seconds (two days).
pub const DEFAULT_CHANNEL_TIMEOUT: u64 = 172_800;
/// Default wait for the transfer-created event in milliseconds (ten minutes).
pub const DEFAULT_EVENT_TIMEOUT_MS: u64 = 600_000;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
///
/// This structure holds configuration for:
/// - Channel node connection and webhook delivery
/// - Routing counterparty
/// - Transfer timeouts and confirmation depth
/// - Settlement chains (one or more `[[chain]]` tables)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub node: NodeEndpointConfig,
    pub router: RouterConfig,
    #[serde(default)]
    pub transfer: TransferSettings,
    /// Settlement chains (use [[chain]] in TOML for multiple)
    #[serde(rename = "chain", default)]
    pub chains: Vec<ChainConfig>,
}

/// Channel node connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEndpointConfig {
    /// Node REST base URL (e.g., "http://127.0.0.1:8001")
    pub url: String,
    /// Public URL the node posts transfer events to; event delivery is disabled when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Bind host for the local webhook receiver
    #[serde(default = "default_webhook_host")]
    pub webhook_host: String,
    /// Bind port for the local webhook receiver
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Public identifier of the routing counterparty shared by all channels
    pub counterparty: String,
}

/// Transfer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,
    /// Hashlock transfer timeout in seconds
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: u64,
    /// Dispute timeout for newly set up channels in seconds
    #[serde(default = "default_channel_timeout")]
    pub channel_timeout: u64,
    /// Wait for the transfer-created event in milliseconds, 0 waits forever
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
}

impl TransferSettings {
    /// Event wait bound, `None` when unbounded.
    pub fn event_timeout(&self) -> Option<Duration> {
        (self.event_timeout_ms > 0).then(|| Duration::from_millis(self.event_timeout_ms))
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
            event_timeout_ms: DEFAULT_EVENT_TIMEOUT_MS,
        }
    }
}

/// Configuration for an EVM-compatible settlement chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// Chain ID (e.g., 1337 for a local devnet)
    pub chain_id: u64,
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Unlocked account on the RPC node that funds deposits
    pub from_address: String,
    /// Receipt polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting for confirmations after this many milliseconds
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

fn default_webhook_host() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_port() -> u16 {
    4455
}

fn default_min_confirmations() -> u64 {
    DEFAULT_MIN_CONFIRMATIONS
}

fn default_transfer_timeout() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT
}

fn default_channel_timeout() -> u64 {
    DEFAULT_CHANNEL_TIMEOUT
}

fn default_event_timeout_ms() -> u64 {
    DEFAULT_EVENT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_confirmation_timeout_ms() -> u64 {
    300_000
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Uses the provided path, else `BRIDGE_CONFIG_PATH`, else
    /// `config/bridge.toml`. The loaded configuration is validated.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file
    ///
    /// # Returns
    ///
    /// * `Ok(BridgeConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparsable or invalid
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("BRIDGE_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/bridge.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/bridge.template.toml config/bridge.toml\n\
                Then edit config/bridge.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration using the default path resolution.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - Node URL and router counterparty are set
    /// - At least one chain is configured, chain IDs are non-zero and unique
    /// - Every `from_address` is a well-formed address
    /// - At least one confirmation is required
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node.url.trim().is_empty() {
            return Err(anyhow::anyhow!("Configuration error: node.url must be set"));
        }
        if self.router.counterparty.trim().is_empty() {
            return Err(anyhow::anyhow!("Configuration error: router.counterparty must be set"));
        }
        if self.transfer.min_confirmations == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: transfer.min_confirmations must be at least 1"
            ));
        }
        if self.chains.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: At least one [[chain]] must be configured"
            ));
        }

        for (i, chain) in self.chains.iter().enumerate() {
            if chain.chain_id == 0 {
                return Err(anyhow::anyhow!(
                    "Configuration error: chain '{}' has chain ID 0",
                    chain.name
                ));
            }
            if self.chains[..i].iter().any(|c| c.chain_id == chain.chain_id) {
                return Err(anyhow::anyhow!(
                    "Configuration error: chain ID {} is configured more than once",
                    chain.chain_id
                ));
            }
            if !is_valid_address(&chain.from_address) {
                return Err(anyhow::anyhow!(
                    "Configuration error: chain '{}' has invalid from_address '{}'",
                    chain.name,
                    chain.from_address
                ));
            }
        }

        Ok(())
    }

    pub fn supported_chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(|c| c.chain_id).collect()
    }

    pub fn chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

//! Channel Bridge CLI
//!
//! Connects to a channel network server node and moves funds between
//! channels on different chains.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin channel-bridge -- --config config/bridge.toml send \
//!     --from-chain 1337 --to-chain 1338 --amount 0.1 --to 0x...
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! BRIDGE_CONFIG_PATH=config/bridge.toml cargo run --bin channel-bridge -- setup-channels
//! ```

use anyhow::{Context, Result};
use channel_bridge::{
    config::BridgeConfig,
    node::{webhook::bind_webhook_server, HttpNodeClient, NodeClient},
    service::{ChannelResolver, OrchestratorBuilder},
    session::Session,
    validation::format_units,
    wallet::{EvmRpcWallet, OnChainWallet},
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

/// Zero address, the native asset id on EVM chains.
const NATIVE_ASSET: &str = "0x0000000000000000000000000000000000000000";

#[derive(Parser, Debug)]
#[command(name = "channel-bridge")]
#[command(about = "Cross-chain transfers over payment channels sharing a routing counterparty")]
struct Args {
    /// Path to configuration file (default: config/bridge.toml or BRIDGE_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deposit on the source chain, route through the counterparty, withdraw on the destination chain
    Send {
        #[arg(long)]
        from_chain: u64,
        #[arg(long)]
        to_chain: u64,
        /// Amount in whole units, e.g. "0.5"
        #[arg(long)]
        amount: String,
        /// On-chain recipient on the destination chain
        #[arg(long)]
        to: String,
        #[arg(long, default_value = NATIVE_ASSET)]
        asset: String,
    },
    /// Delegate the whole transfer to the node (requires a node that offers cross-chain transfers; the REST node does not)
    CrossTransfer {
        #[arg(long)]
        from_chain: u64,
        #[arg(long)]
        to_chain: u64,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = NATIVE_ASSET)]
        from_asset: String,
        #[arg(long, default_value = NATIVE_ASSET)]
        to_asset: String,
    },
    /// Make sure a channel with the counterparty exists on every configured chain
    SetupChannels,
    /// Show the channel with the counterparty on a chain
    Channel {
        #[arg(long)]
        chain: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let config = BridgeConfig::load_from_path(args.config.as_deref())?;
    info!("Configuration loaded: node {}, {} chain(s)", config.node.url, config.chains.len());

    let client = Arc::new(HttpNodeClient::new(config.node.url.clone(), config.node.webhook_url.clone())?);

    // Bound before connecting: connect registers the webhook URL with the node
    let webhook = match config.node.webhook_url {
        Some(_) => Some(bind_webhook_server(
            client.event_bus(),
            &config.node.webhook_host,
            config.node.webhook_port,
        )?),
        None => None,
    };

    let node: Arc<dyn NodeClient> = client;
    let session = Arc::new(Session::from_config(node, &config));
    session.connect().await.context("Failed to connect to channel node")?;

    let command = run(args.command, &config, session.clone());
    let result = match webhook {
        Some((_, server)) => tokio::select! {
            result = command => result,
            _ = server => Err(anyhow::anyhow!("Transfer event webhook stopped")),
        },
        None => command.await,
    };
    session.teardown().await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(command: Command, config: &BridgeConfig, session: Arc<Session>) -> Result<()> {
    match command {
        Command::Send {
            from_chain,
            to_chain,
            amount,
            to,
            asset,
        } => {
            let chain = config
                .chain_by_id(from_chain)
                .with_context(|| format!("Chain {} is not configured", from_chain))?;
            let evm_wallet = EvmRpcWallet::new(chain)?;
            info!("Funding deposits on {} from {}", chain.name, evm_wallet.from_address());
            let wallet: Arc<dyn OnChainWallet> = Arc::new(evm_wallet);
            let orchestrator = OrchestratorBuilder::with_settings(session, &config.transfer).build(wallet);

            let receipt = orchestrator.send(from_chain, &asset, to_chain, &to, &amount).await?;
            info!(
                "Sent {} from chain {} to {} on chain {} (transfer {})",
                amount, from_chain, to, to_chain, receipt.transfer.transfer_id
            );
            println!("{}", receipt.transfer.transfer_id);
        }
        Command::CrossTransfer {
            from_chain,
            to_chain,
            amount,
            to,
            from_asset,
            to_asset,
        } => {
            let chain = config
                .chain_by_id(from_chain)
                .with_context(|| format!("Chain {} is not configured", from_chain))?;
            let wallet: Arc<dyn OnChainWallet> = Arc::new(EvmRpcWallet::new(chain)?);
            let orchestrator = OrchestratorBuilder::with_settings(session, &config.transfer).build(wallet);

            let result = orchestrator
                .cross_transfer(&amount, from_chain, &from_asset, to_chain, &to_asset, to.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::SetupChannels => {
            let resolver = ChannelResolver::new(session, config.transfer.channel_timeout);
            let mut failed = 0;
            for (chain_id, result) in resolver.ensure_channels(&config.supported_chain_ids()).await {
                match result {
                    Ok(channel) => println!("chain {}: {}", chain_id, channel.channel_address),
                    Err(e) => {
                        failed += 1;
                        println!("chain {}: {}", chain_id, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} chain(s) without a channel", failed);
            }
        }
        Command::Channel { chain } => {
            let resolver = ChannelResolver::new(session, config.transfer.channel_timeout);
            let channel = resolver.resolve(chain).await?;
            println!("channel: {}", channel.channel_address);
            println!("chain:   {}", channel.chain_id());
            for asset_id in &channel.asset_ids {
                println!(
                    "asset {}: {}",
                    asset_id,
                    format_units(channel.total_balance(asset_id), 18)
                );
            }
        }
    }
    Ok(())
}

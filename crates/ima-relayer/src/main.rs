use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ima_relayer::config::RelayerConfig;
use ima_relayer::discovery::{find_chain_index_by_name, NodeSelector, TopologyCache};
use ima_relayer::relay::TransferErrorTracker;

#[derive(Parser)]
#[command(name = "relayer")]
#[command(about = "Chain discovery and transfer bookkeeping tools for the IMA relayer")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/relayer.toml")]
    pub config: String,

    /// Log level (overrides the configuration file)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the chains currently known to the discovery cache
    Chains,
    /// Pick a random node URL for a chain
    PickUrl {
        /// Chain name
        #[arg(long)]
        chain: String,
    },
    /// Show relayer status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = RelayerConfig::load_layered(&cli.config)?;
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.global.log_level.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ima_relayer={0},relayer={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loaded configuration from: {}", cli.config);

    match cli.command {
        Commands::Chains => show_chains(&config),
        Commands::PickUrl { chain } => pick_url(&config, &chain),
        Commands::Status => show_status(&config),
    }
}

fn discovery_cache(config: &RelayerConfig) -> TopologyCache {
    let cache = TopologyCache::from_config(&config.discovery);
    if cache.source_description().is_none() {
        warn!("No network browser path configured, discovery cache stays empty");
    }
    cache
}

fn show_chains(config: &RelayerConfig) -> anyhow::Result<()> {
    let mut cache = discovery_cache(config);
    let chains = cache.cached_chains();
    info!("Have {} chain(s) in discovery cache", chains.len());

    let summary: Vec<_> = chains
        .iter()
        .map(|chain| {
            json!({
                "name": chain.name,
                "chainId": chain.chain_id,
                "nodes": chain.node_count(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn pick_url(config: &RelayerConfig, chain_name: &str) -> anyhow::Result<()> {
    let mut cache = discovery_cache(config);
    let chains = cache.cached_chains();
    if chains.is_empty() {
        bail!("No chains in discovery cache yet, try again later");
    }

    let index = find_chain_index_by_name(&chains, chain_name)
        .ok_or_else(|| anyhow!("Chain {} is not in discovery cache", chain_name))?;
    let url = NodeSelector::new().pick_random_url(&chains[index])?;
    info!("Picked {} for chain {}", url, chain_name);
    println!("{}", url);
    Ok(())
}

fn show_status(config: &RelayerConfig) -> anyhow::Result<()> {
    let mut cache = discovery_cache(config);
    let outcome = cache.refresh_outcome();
    let tracker = TransferErrorTracker::with_progressive_events_scan(
        config.transfers.progressive_events_scan,
    );

    let status = json!({
        "discoverySource": cache.source_description(),
        "refresh": outcome.label(),
        "updatedAt": cache.updated_at(),
        "chains": cache.snapshot().map_or(0, |snapshot| snapshot.chains.len()),
        "progressiveEventsScan": tracker.progressive_events_scan(),
        "openErrorCategories": tracker.last_error_categories(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);

    #[cfg(feature = "metrics")]
    if config.metrics.enabled {
        use prometheus::Encoder;

        let metrics = ima_relayer::metrics::RelayerMetrics::new()?;
        metrics.observe_transfers(tracker.events());
        metrics.record_refresh(&outcome);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&metrics.registry().gather(), &mut buffer)?;
        println!("{}", String::from_utf8(buffer)?);
    }

    Ok(())
}

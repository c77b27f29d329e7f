//! Swapline server binary

use std::path::PathBuf;

use anyhow::Context;
use chain_client::{ChainFixture, InMemoryChain};
use clap::Parser;
use swapline_api::{start_server, AppState};
use swapline_core::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "swapline", version, about = "Swap aggregation and routing engine")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: PathBuf,

    /// JSON chain fixture with the initial pools and balances
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Directory receiving `<chain_id>.json` deployment records
    #[arg(long, default_value = "deployments")]
    deployments: PathBuf,

    /// Overrides `api.port` from the config
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swapline=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let fixture = match &args.fixture {
        Some(path) => ChainFixture::load(path)
            .with_context(|| format!("loading fixture {}", path.display()))?,
        None => ChainFixture::default(),
    };

    tracing::info!(
        chain_id = %config.chain.chain_id,
        pools = fixture.pools.len(),
        "Starting Swapline"
    );

    let chain = InMemoryChain::from_fixture(fixture).await;
    let state = AppState::from_config(&config, chain)?;

    let record = state.router().deployment_record(state.chain()).await?;
    let path = record
        .save(&args.deployments)
        .context("saving deployment record")?;
    tracing::info!(path = %path.display(), "Deployment recorded");

    if let Some(port) = args.port {
        config.api.port = port;
    }
    start_server(state, &config.api).await?;
    Ok(())
}

//! story-media server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use story_media::config::Config;
use story_media::job::JobRegistry;
use story_media::server::{self, AppState};
use story_media::upstream::OperationClient;

/// Job status service for story media generation.
#[derive(Debug, Parser)]
#[command(name = "story-media", version, about)]
struct Args {
    /// Path to a config file (default: ~/.config/story-media/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the config file.
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overriding the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Upstream model identifier, overriding the config file.
    #[arg(long)]
    model: Option<String>,

    /// Upstream API base URL, overriding the config file.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(model) = args.model {
        config.upstream.model = Some(model);
    }
    if let Some(base_url) = args.base_url {
        config.upstream.base_url = Some(base_url);
    }

    // Credentials are checked here, before any job can be created.
    let client = Arc::new(OperationClient::from_config(&config)?);
    let registry = Arc::new(
        JobRegistry::new(config.max_concurrent_jobs()).with_retention(config.job_retention()),
    );
    let budget = config.server_budget()?;

    log::info!(
        "model={} poll interval={:?} deadline={:?} max jobs={}",
        client.model(),
        budget.interval,
        budget.deadline,
        config.max_concurrent_jobs()
    );

    let state = AppState::new(client, registry, budget);

    let host = args.host.unwrap_or_else(|| config.host().to_string());
    let port = args.port.unwrap_or_else(|| config.port());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    server::serve(addr, state).await?;
    Ok(())
}

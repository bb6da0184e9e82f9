mod cli;

use clap::Parser;
use cli::Cli;
use dashforge::config;
use dashforge::state::CacheIndex;
use dashforge::watch::FileWatcher;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        match cli.verbose {
            0 => "dashforge=info,tower_http=info".to_string(),
            1 => "dashforge=debug,dashforge_media=debug,dashforge_demux=debug,tower_http=debug".to_string(),
            _ => "dashforge=trace,dashforge_media=trace,dashforge_demux=trace,tower_http=trace".to_string(),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .init();

    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: config::Config) -> anyhow::Result<()> {
    let cache_index = Arc::new(CacheIndex::new(config.video_dir.clone(), config.cache_dir.clone()));
    cache_index.reconcile();

    let mut watcher = FileWatcher::new(config.watch.clone(), cache_index.clone());
    watcher.start().await?;

    dashforge::server::start_server(config, cache_index).await
}

mod display;
mod feed;
mod mode;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use display::DisplayGrid;
use feed::FeedConfig;
use swarm_relay_common::config::Config;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("fetch failed: {0}")]
    Fetch(reqwest::Error),
    #[error("server returned HTTP {0}")]
    HttpStatus(u16),
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        relay = config.relay.url,
        agents = config.fleet.num_agents,
        snapshot_poll_ms = config.viewer.snapshot_poll_ms,
        mode_poll_secs = config.viewer.mode_poll_secs,
        "starting swarm-relay viewer"
    );

    // No global request timeout: the stream connection is long-lived.
    // Snapshot and status requests set per-request timeouts instead.
    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.viewer.fetch_timeout_ms))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let roster = config.roster();
    let grid = Arc::new(DisplayGrid::new(&roster));
    let (mode_tx, mode_rx) = watch::channel(false);

    tokio::spawn(mode::run_mode_watcher(
        client.clone(),
        config.relay.url.clone(),
        Duration::from_secs(config.viewer.mode_poll_secs.max(1)),
        Duration::from_millis(config.viewer.fetch_timeout_ms),
        mode_tx,
    ));

    let feed_config = FeedConfig {
        base_url: config.relay.url.clone(),
        snapshot_poll: Duration::from_millis(config.viewer.snapshot_poll_ms.max(1)),
        fetch_timeout: Duration::from_millis(config.viewer.fetch_timeout_ms),
    };

    let mut handles = Vec::with_capacity(roster.len());
    for agent_id in roster {
        handles.push(tokio::spawn(feed::run_agent_feed(
            client.clone(),
            feed_config.clone(),
            agent_id,
            Arc::clone(&grid),
            mode_rx.clone(),
        )));
    }

    // Periodic one-line summary of the grid
    let summary_grid = Arc::clone(&grid);
    let summary_rx = mode_rx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            let (live, total) = summary_grid.counts();
            let mode = if *summary_rx.borrow() { "broadcast" } else { "independent" };
            info!(live, total, mode, "grid status");
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
}

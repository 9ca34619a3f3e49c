mod camera;
mod overlay;
mod policy;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camera::{DirectoryCamera, FrameSource, SyntheticCamera};
use policy::DropAndContinue;
use runner::AgentRunner;
use swarm_relay_common::config::Config;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("upload failed: {0}")]
    Upload(reqwest::Error),
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
        num_agents = config.fleet.num_agents,
        tick_ms = config.fleet.tick_ms,
        "starting swarm-relay agent fleet"
    );

    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(config.fleet.upload_timeout_ms))
        .timeout(Duration::from_millis(config.fleet.upload_timeout_ms))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let policy: Arc<dyn policy::FailurePolicy> = Arc::new(DropAndContinue);
    let tick_period = Duration::from_millis(config.fleet.tick_ms.max(1));

    let mut handles = Vec::with_capacity(config.fleet.num_agents);
    for agent_id in config.roster() {
        let camera: Box<dyn FrameSource> = match &config.fleet.frame_dir {
            Some(dir) => match DirectoryCamera::open(dir, &agent_id) {
                Ok(c) => Box::new(c),
                Err(e) => {
                    warn!(agent_id, dir = %dir, error = %e, "directory camera unavailable, using synthetic");
                    Box::new(SyntheticCamera::new(&agent_id))
                }
            },
            None => Box::new(SyntheticCamera::new(&agent_id)),
        };

        let runner = AgentRunner::new(
            agent_id,
            camera,
            Arc::clone(&policy),
            client.clone(),
            &config.relay.url,
            config.fleet.jpeg_quality,
            tick_period,
            config.fleet.telemetry_every_ticks,
        );
        handles.push(tokio::spawn(runner.run()));
    }

    info!(agents = handles.len(), "fleet airborne");
    for handle in handles {
        let _ = handle.await;
    }
}

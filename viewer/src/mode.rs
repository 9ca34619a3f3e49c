use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::ViewerError;

/// Poll the relay's mode endpoint on a short fixed interval and publish
/// the flag to every feed task. Poll failures keep the last known value;
/// mode detection is best-effort like everything else here.
pub async fn run_mode_watcher(
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    fetch_timeout: Duration,
    tx: watch::Sender<bool>,
) {
    let url = format!("{}/swarm/status", base_url.trim_end_matches('/'));
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        match fetch_mode(&client, &url, fetch_timeout).await {
            Ok(enabled) => {
                if *tx.borrow() != enabled {
                    info!(enabled, "broadcast mode changed, feeds re-subscribing");
                    let _ = tx.send(enabled);
                }
            }
            Err(e) => {
                debug!(error = %e, "mode poll failed, keeping last known mode");
            }
        }
    }
}

async fn fetch_mode(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<bool, ViewerError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(ViewerError::Fetch)?;
    if !response.status().is_success() {
        return Err(ViewerError::HttpStatus(response.status().as_u16()));
    }
    let status: serde_json::Value = response.json().await.map_err(ViewerError::Fetch)?;
    Ok(parse_enabled(&status))
}

/// Missing or malformed flag reads as independent mode.
fn parse_enabled(status: &serde_json::Value) -> bool {
    status
        .get("enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

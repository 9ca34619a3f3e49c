use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use swarm_relay_common::multipart::MultipartParser;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::display::DisplayGrid;
use crate::ViewerError;

#[derive(Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub snapshot_poll: Duration,
    pub fetch_timeout: Duration,
}

/// One feed task per agent. Polls snapshots in independent mode, consumes
/// the multipart stream in broadcast mode, and flips strategy whenever the
/// mode watcher reports a change. Runs until the mode channel closes.
pub async fn run_agent_feed(
    client: reqwest::Client,
    config: FeedConfig,
    agent_id: String,
    grid: Arc<DisplayGrid>,
    mut mode_rx: watch::Receiver<bool>,
) {
    loop {
        let broadcast = *mode_rx.borrow_and_update();
        let alive = if broadcast {
            consume_stream(&client, &config, &agent_id, &grid, &mut mode_rx).await
        } else {
            poll_snapshots(&client, &config, &agent_id, &grid, &mut mode_rx).await
        };
        if !alive {
            warn!(agent_id, "mode watcher gone, feed stopping");
            return;
        }
    }
}

/// Snapshot strategy: fetch the latest frame on a fixed timer until the
/// mode flips. Returns `false` when the mode channel is closed.
async fn poll_snapshots(
    client: &reqwest::Client,
    config: &FeedConfig,
    agent_id: &str,
    grid: &DisplayGrid,
    mode_rx: &mut watch::Receiver<bool>,
) -> bool {
    let url = format!(
        "{}/agents/{agent_id}/frame/latest",
        config.base_url.trim_end_matches('/')
    );
    let mut ticker = tokio::time::interval(config.snapshot_poll);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match fetch_snapshot(client, &url, config.fetch_timeout).await {
                    Ok(Some(frame)) => grid.update_live(agent_id, frame),
                    Ok(None) => grid.mark_no_signal(agent_id),
                    Err(e) => {
                        debug!(agent_id, error = %e, "snapshot fetch failed");
                        grid.mark_no_signal(agent_id);
                    }
                }
            }
            changed = mode_rx.changed() => {
                return changed.is_ok();
            }
        }
    }
}

/// `Ok(None)` is the relay's 404: no frame yet, show the placeholder.
async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Option<Bytes>, ViewerError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(ViewerError::Fetch)?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(ViewerError::HttpStatus(response.status().as_u16()));
    }
    let frame = response.bytes().await.map_err(ViewerError::Fetch)?;
    Ok(Some(frame))
}

/// Stream strategy: hold the multipart connection open and push every
/// completed part into the grid. Reconnects forever on error; returns when
/// the mode flips (`true`) or the mode channel closes (`false`).
async fn consume_stream(
    client: &reqwest::Client,
    config: &FeedConfig,
    agent_id: &str,
    grid: &DisplayGrid,
    mode_rx: &mut watch::Receiver<bool>,
) -> bool {
    let url = format!(
        "{}/agents/{agent_id}/frame/stream",
        config.base_url.trim_end_matches('/')
    );

    loop {
        let response = match client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(agent_id, status = %r.status(), "stream rejected");
                grid.mark_no_signal(agent_id);
                if let Some(stop) = wait_before_reconnect(config, mode_rx).await {
                    return stop;
                }
                continue;
            }
            Err(e) => {
                debug!(agent_id, error = %e, "stream connect failed");
                grid.mark_no_signal(agent_id);
                if let Some(stop) = wait_before_reconnect(config, mode_rx).await {
                    return stop;
                }
                continue;
            }
        };

        let mut chunks = response.bytes_stream();
        let mut parser = MultipartParser::new();

        loop {
            tokio::select! {
                chunk = chunks.next() => {
                    match chunk {
                        Some(Ok(chunk)) => {
                            for frame in parser.push(&chunk) {
                                grid.update_live(agent_id, frame);
                            }
                        }
                        Some(Err(e)) => {
                            debug!(agent_id, error = %e, "stream read failed, reconnecting");
                            grid.mark_no_signal(agent_id);
                            break;
                        }
                        None => {
                            debug!(agent_id, "stream ended, reconnecting");
                            grid.mark_no_signal(agent_id);
                            break;
                        }
                    }
                }
                changed = mode_rx.changed() => {
                    // Dropping the response closes the connection
                    return changed.is_ok();
                }
            }
        }

        if let Some(stop) = wait_before_reconnect(config, mode_rx).await {
            return stop;
        }
    }
}

/// Pause one poll period between reconnect attempts. `Some(alive)` means
/// the caller should return (mode changed or channel closed); `None` means
/// reconnect.
async fn wait_before_reconnect(
    config: &FeedConfig,
    mode_rx: &mut watch::Receiver<bool>,
) -> Option<bool> {
    tokio::select! {
        _ = tokio::time::sleep(config.snapshot_poll) => None,
        changed = mode_rx.changed() => Some(changed.is_ok()),
    }
}

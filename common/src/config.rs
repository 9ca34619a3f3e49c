use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where agents and viewers find the relay server.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Cap on the multipart stream cadence, frames per second.
    #[serde(default = "default_stream_fps")]
    pub stream_fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    #[serde(default = "default_num_agents")]
    pub num_agents: usize,
    #[serde(default = "default_agent_prefix")]
    pub agent_prefix: String,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_upload_timeout_ms")]
    pub upload_timeout_ms: u64,
    #[serde(default = "default_telemetry_every_ticks")]
    pub telemetry_every_ticks: u64,
    /// Optional directory of still images to cycle through instead of the
    /// synthetic pattern. Unset or unreadable means synthetic frames.
    #[serde(default)]
    pub frame_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_snapshot_poll_ms")]
    pub snapshot_poll_ms: u64,
    #[serde(default = "default_mode_poll_secs")]
    pub mode_poll_secs: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            stream_fps: default_stream_fps(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            num_agents: default_num_agents(),
            agent_prefix: default_agent_prefix(),
            tick_ms: default_tick_ms(),
            jpeg_quality: default_jpeg_quality(),
            upload_timeout_ms: default_upload_timeout_ms(),
            telemetry_every_ticks: default_telemetry_every_ticks(),
            frame_dir: None,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            snapshot_poll_ms: default_snapshot_poll_ms(),
            mode_poll_secs: default_mode_poll_secs(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Fixed roster of agent ids, `{prefix}_1` through `{prefix}_N`.
    pub fn roster(&self) -> Vec<String> {
        (1..=self.fleet.num_agents)
            .map(|n| format!("{}_{n}", self.fleet.agent_prefix))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_relay_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_port() -> u16 {
    8080
}
fn default_stream_fps() -> f64 {
    10.0
}
fn default_num_agents() -> usize {
    12
}
fn default_agent_prefix() -> String {
    "drone".into()
}
fn default_tick_ms() -> u64 {
    100
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_upload_timeout_ms() -> u64 {
    2000
}
fn default_telemetry_every_ticks() -> u64 {
    10
}
fn default_snapshot_poll_ms() -> u64 {
    500
}
fn default_mode_poll_secs() -> u64 {
    2
}
fn default_fetch_timeout_ms() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".into()
}

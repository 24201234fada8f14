use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub plan: Option<String>,
    /// Human readable size, e.g. "25 GB".
    pub quota: Option<String>,
    pub auth_timeout_sec: Option<u64>,
    pub submission_timeout_sec: Option<u64>,
    pub destination_root: Option<String>,

    // Feature configs
    pub identity: Option<IdentityConfig>,
    pub engine: Option<EngineConfig>,
    pub cloud: Option<CloudConfig>,
    pub queue: Option<QueueConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub latency_ms: Option<u64>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub accept_delay_ms: Option<u64>,
    pub tick_ms: Option<u64>,
    /// Bytes per second, e.g. "2.4 MB".
    pub speed: Option<String>,
    /// Size of links without `xl`, e.g. "700 MB".
    pub default_size: Option<String>,
    /// Overrides the plan's concurrency limit.
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CloudConfig {
    /// Providers connected at start-up, e.g. ["google_drive"].
    pub connected: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// How many recent downloads a dashboard snapshot shows.
    pub recent_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

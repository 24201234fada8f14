mod file_config;

pub use file_config::{CloudConfig, EngineConfig, FileConfig, IdentityConfig, QueueConfig};

use anyhow::{bail, Context, Result};
use byte_unit::Byte;
use std::time::Duration;

use crate::cloud::CloudProvider;
use crate::downloads::{EngineSimulationSettings, QueueSettings};
use crate::plans::Plan;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub plan: Plan,
    pub quota_bytes: Option<u64>,
    pub auth_timeout_sec: u64,
    pub submission_timeout_sec: u64,
    pub destination_root: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            plan: Plan::default(),
            quota_bytes: None,
            auth_timeout_sec: 30,
            submission_timeout_sec: 30,
            destination_root: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub plan: Plan,
    pub quota_bytes: u64,
    pub auth_timeout_sec: u64,
    pub submission_timeout_sec: u64,
    pub destination_root: String,

    // Feature configs (with defaults)
    pub identity: IdentitySettings,
    pub engine: EngineSimulationSettings,
    pub cloud: CloudSettings,
    pub recent_limit: usize,
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub latency: Duration,
    pub available: bool,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(1500),
            available: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloudSettings {
    pub connected: Vec<CloudProvider>,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            connected: vec![CloudProvider::GoogleDrive],
        }
    }
}

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const DEFAULT_DESTINATION_ROOT: &str = "/Downloads";

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let plan = match file.plan {
            Some(plan) => plan.parse::<Plan>()?,
            None => cli.plan,
        };

        let quota_bytes = match file.quota {
            Some(quota) => parse_size(&quota).context("Invalid quota")?,
            None => cli.quota_bytes.unwrap_or_else(|| plan.quota_bytes()),
        };
        if quota_bytes == 0 {
            bail!("quota must be greater than zero");
        }

        let auth_timeout_sec = file.auth_timeout_sec.unwrap_or(cli.auth_timeout_sec);
        let submission_timeout_sec = file
            .submission_timeout_sec
            .unwrap_or(cli.submission_timeout_sec);
        if auth_timeout_sec == 0 || submission_timeout_sec == 0 {
            bail!("Timeouts must be at least one second");
        }

        let destination_root = file
            .destination_root
            .or_else(|| cli.destination_root.clone())
            .unwrap_or_else(|| DEFAULT_DESTINATION_ROOT.to_string());
        if !destination_root.starts_with('/') {
            bail!(
                "destination_root must be an absolute cloud path: {:?}",
                destination_root
            );
        }

        // Identity provider settings - merge file config with defaults
        let identity_file = file.identity.unwrap_or_default();
        let identity_defaults = IdentitySettings::default();
        let identity = IdentitySettings {
            latency: identity_file
                .latency_ms
                .map(Duration::from_millis)
                .unwrap_or(identity_defaults.latency),
            available: identity_file
                .available
                .unwrap_or(identity_defaults.available),
        };

        // Engine settings - plan decides concurrency unless overridden
        let engine_file = file.engine.unwrap_or_default();
        let engine_defaults = EngineSimulationSettings::default();
        let engine = EngineSimulationSettings {
            accept_delay: engine_file
                .accept_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(engine_defaults.accept_delay),
            tick: engine_file
                .tick_ms
                .map(Duration::from_millis)
                .unwrap_or(engine_defaults.tick),
            bytes_per_sec: match engine_file.speed {
                Some(speed) => parse_size(&speed).context("Invalid engine speed")?,
                None => engine_defaults.bytes_per_sec,
            },
            default_size_bytes: match engine_file.default_size {
                Some(size) => parse_size(&size).context("Invalid engine default_size")?,
                None => engine_defaults.default_size_bytes,
            },
            max_concurrent: engine_file
                .max_concurrent
                .or_else(|| plan.max_concurrent_downloads()),
        };
        if engine.tick.is_zero() {
            bail!("engine tick_ms must be greater than zero");
        }
        if engine.bytes_per_sec == 0 {
            bail!("engine speed must be greater than zero");
        }
        if engine.max_concurrent == Some(0) {
            bail!("engine max_concurrent must be greater than zero");
        }

        let cloud = match file.cloud.and_then(|c| c.connected) {
            Some(names) => CloudSettings {
                connected: names
                    .iter()
                    .map(|name| name.parse::<CloudProvider>())
                    .collect::<Result<Vec<_>, _>>()?,
            },
            None => CloudSettings::default(),
        };

        let recent_limit = file
            .queue
            .and_then(|q| q.recent_limit)
            .unwrap_or(DEFAULT_RECENT_LIMIT);

        Ok(Self {
            plan,
            quota_bytes,
            auth_timeout_sec,
            submission_timeout_sec,
            destination_root,
            identity,
            engine,
            cloud,
            recent_limit,
        })
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_sec)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_sec)
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            quota_bytes: self.quota_bytes,
            destination_root: Some(self.destination_root.clone()),
        }
    }
}

/// Parses "25 GB", "2.4MB" or a plain byte count.
pub fn parse_size(s: &str) -> Result<u64> {
    let byte = Byte::parse_str(s.trim(), true)
        .map_err(|e| anyhow::anyhow!("Cannot parse size {:?}: {}", s, e))?;
    Ok(byte.as_u64())
}

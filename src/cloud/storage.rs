use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Cloud drives a completed download can be delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    GoogleDrive,
    Dropbox,
    OneDrive,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 3] = [
        CloudProvider::GoogleDrive,
        CloudProvider::Dropbox,
        CloudProvider::OneDrive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::GoogleDrive => "google_drive",
            CloudProvider::Dropbox => "dropbox",
            CloudProvider::OneDrive => "onedrive",
        }
    }
}

impl FromStr for CloudProvider {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "googledrive" | "gdrive" | "google" => Ok(CloudProvider::GoogleDrive),
            "dropbox" => Ok(CloudProvider::Dropbox),
            "onedrive" => Ok(CloudProvider::OneDrive),
            _ => Err(ConnectionError::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudProvider::GoogleDrive => write!(f, "Google Drive"),
            CloudProvider::Dropbox => write!(f, "Dropbox"),
            CloudProvider::OneDrive => write!(f, "OneDrive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudConnection {
    pub provider: CloudProvider,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Unknown cloud provider '{0}'")]
    UnknownProvider(String),

    #[error("{0} is already connected")]
    AlreadyConnected(CloudProvider),

    #[error("{0} is not connected")]
    NotConnected(CloudProvider),

    #[error("Cloud storage is unavailable")]
    Unavailable,
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Every known provider with its connection state.
    async fn list_connections(&self) -> Result<Vec<CloudConnection>, ConnectionError>;

    async fn connect(&self, provider: CloudProvider) -> Result<(), ConnectionError>;

    async fn disconnect(&self, provider: CloudProvider) -> Result<(), ConnectionError>;
}

/// Connection flags kept in memory.
pub struct InMemoryCloudStorage {
    connections: Mutex<BTreeMap<CloudProvider, bool>>,
    available: AtomicBool,
}

impl InMemoryCloudStorage {
    pub fn new(connected: &[CloudProvider]) -> Self {
        let connections = CloudProvider::ALL
            .iter()
            .map(|provider| (*provider, connected.contains(provider)))
            .collect();
        Self {
            connections: Mutex::new(connections),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn set_connected(&self, provider: CloudProvider, connected: bool) -> Result<(), ConnectionError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ConnectionError::Unavailable);
        }
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = connections.entry(provider).or_insert(false);
        match (*current, connected) {
            (true, true) => Err(ConnectionError::AlreadyConnected(provider)),
            (false, false) => Err(ConnectionError::NotConnected(provider)),
            _ => {
                *current = connected;
                info!(
                    "{} {}",
                    provider,
                    if connected { "connected" } else { "disconnected" }
                );
                Ok(())
            }
        }
    }
}

impl Default for InMemoryCloudStorage {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[async_trait]
impl CloudStorage for InMemoryCloudStorage {
    async fn list_connections(&self) -> Result<Vec<CloudConnection>, ConnectionError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ConnectionError::Unavailable);
        }
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(connections
            .iter()
            .map(|(provider, connected)| CloudConnection {
                provider: *provider,
                connected: *connected,
            })
            .collect())
    }

    async fn connect(&self, provider: CloudProvider) -> Result<(), ConnectionError> {
        self.set_connected(provider, true)
    }

    async fn disconnect(&self, provider: CloudProvider) -> Result<(), ConnectionError> {
        self.set_connected(provider, false)
    }
}

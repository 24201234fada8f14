//! Data models for the download queue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use super::engine::JobId;
use super::magnet::MagnetLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DownloadId(Uuid);

impl DownloadId {
    pub fn new() -> Self {
        DownloadId(Uuid::new_v4())
    }

    /// First 8 hex chars, enough to tell records apart on screen.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for DownloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DownloadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DownloadId(Uuid::parse_str(s)?))
    }
}

/// Status of a download record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Paused,
    Completed, // terminal
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    /// Queued or downloading: the engine is expected to make progress.
    pub fn is_running(&self) -> bool {
        matches!(self, DownloadStatus::Queued | DownloadStatus::Downloading)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub name: String,
    pub magnet: MagnetLink,
    /// Engine job backing this record, once the engine accepted it.
    pub job_id: Option<JobId>,
    pub size_bytes: u64,
    pub status: DownloadStatus,
    /// 0..=100, and 100 only when completed.
    pub progress_percent: u8,
    pub speed_bytes_per_sec: u64,
    pub eta_seconds: u64,
    pub cloud_destination_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Why the record failed, when it did.
    pub error: Option<String>,
}

impl DownloadRecord {
    pub fn new(magnet: MagnetLink) -> Self {
        Self {
            id: DownloadId::new(),
            name: magnet.label(),
            size_bytes: magnet.exact_length.unwrap_or(0),
            magnet,
            job_id: None,
            status: DownloadStatus::Queued,
            progress_percent: 0,
            speed_bytes_per_sec: 0,
            eta_seconds: 0,
            cloud_destination_path: None,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Derived from completed records, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub quota_bytes: u64,
}

impl StorageUsage {
    pub fn percent_used(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 * 100.0 / self.quota_bytes as f64
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.quota_bytes.saturating_sub(self.used_bytes)
    }
}

/// Dashboard "quick stats".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub total_completed: usize,
    pub completed_this_week: usize,
    pub failed: usize,
    pub queued_items: usize,
    /// completed / (completed + failed), None until something finished.
    pub success_rate_percent: Option<f64>,
}

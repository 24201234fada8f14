//! Download engine boundary.
//!
//! The engine owns the actual transfer. It accepts magnet links, hands back
//! a job handle and reports progress over a broadcast channel.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use super::magnet::MagnetLink;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub info_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("this link is already being downloaded")]
    Duplicate,

    #[error("the download engine is unavailable")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}

/// Progress report for one job.
///
/// `seq` increases per job in the order the engine issued the reports.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub seq: u64,
    pub percent: u8,
    pub speed_bytes_per_sec: u64,
    pub eta_seconds: u64,
    /// Set once the engine knows the payload size.
    pub total_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress(ProgressEvent),
    Failed {
        job_id: JobId,
        seq: u64,
        reason: String,
    },
}

impl EngineEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            EngineEvent::Progress(progress) => &progress.job_id,
            EngineEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            EngineEvent::Progress(progress) => progress.seq,
            EngineEvent::Failed { seq, .. } => *seq,
        }
    }
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Hand a link to the engine. May take a while to be accepted.
    async fn submit_magnet_link(&self, magnet: &MagnetLink) -> Result<JobHandle, RejectionReason>;

    async fn pause_job(&self, job_id: &JobId) -> Result<()>;

    async fn resume_job(&self, job_id: &JobId) -> Result<()>;

    async fn cancel_job(&self, job_id: &JobId) -> Result<()>;

    /// Subscribe to progress and failure reports.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

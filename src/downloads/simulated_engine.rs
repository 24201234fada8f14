//! In-process download engine.
//!
//! Moves no bytes: every tick each running job advances by
//! `bytes_per_sec * tick` and a progress event is broadcast. Only the first
//! `max_concurrent` unpaused jobs advance, the rest wait their turn.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::{
    DownloadEngine, EngineEvent, JobHandle, JobId, ProgressEvent, RejectionReason,
};
use super::magnet::MagnetLink;

#[derive(Debug, Clone)]
pub struct EngineSimulationSettings {
    /// How long the engine takes to accept a link.
    pub accept_delay: Duration,
    pub tick: Duration,
    pub bytes_per_sec: u64,
    /// Size assumed for links without an `xl` parameter.
    pub default_size_bytes: u64,
    /// None means unlimited.
    pub max_concurrent: Option<usize>,
}

impl Default for EngineSimulationSettings {
    fn default() -> Self {
        Self {
            accept_delay: Duration::from_millis(2000),
            tick: Duration::from_millis(1000),
            bytes_per_sec: 2_400_000,
            default_size_bytes: 700_000_000,
            max_concurrent: Some(1),
        }
    }
}

struct SimulatedJob {
    job_id: JobId,
    info_hash: String,
    total_bytes: u64,
    downloaded_bytes: u64,
    paused: bool,
    seq: u64,
}

impl SimulatedJob {
    fn percent(&self) -> u8 {
        if self.downloaded_bytes >= self.total_bytes {
            return 100;
        }
        // Never report 100 before the last byte.
        ((self.downloaded_bytes as u128 * 100 / self.total_bytes as u128) as u8).min(99)
    }
}

pub struct SimulatedDownloadEngine {
    settings: EngineSimulationSettings,
    available: AtomicBool,
    jobs: Mutex<Vec<SimulatedJob>>,
    next_job: AtomicU64,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl SimulatedDownloadEngine {
    pub fn new(settings: EngineSimulationSettings) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            settings,
            available: AtomicBool::new(true),
            jobs: Mutex::new(Vec::new()),
            next_job: AtomicU64::new(1),
            event_tx,
        }
    }

    pub fn settings(&self) -> &EngineSimulationSettings {
        &self.settings
    }

    /// An unavailable engine rejects every submission.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn job_count(&self) -> usize {
        self.lock_jobs().len()
    }

    /// Advance every running job by one tick and broadcast their progress.
    pub fn tick(&self) {
        let step = (self.settings.bytes_per_sec as f64 * self.settings.tick.as_secs_f64()) as u64;
        let limit = self.settings.max_concurrent.unwrap_or(usize::MAX);

        let events = {
            let mut jobs = self.lock_jobs();
            let mut events = Vec::new();
            for job in jobs.iter_mut().filter(|job| !job.paused).take(limit) {
                job.downloaded_bytes = job.downloaded_bytes.saturating_add(step).min(job.total_bytes);
                job.seq += 1;
                let remaining = job.total_bytes - job.downloaded_bytes;
                let percent = job.percent();
                events.push(EngineEvent::Progress(ProgressEvent {
                    job_id: job.job_id.clone(),
                    seq: job.seq,
                    percent,
                    speed_bytes_per_sec: if percent == 100 {
                        0
                    } else {
                        self.settings.bytes_per_sec
                    },
                    eta_seconds: remaining / self.settings.bytes_per_sec.max(1),
                    total_bytes: Some(job.total_bytes),
                }));
            }
            jobs.retain(|job| job.downloaded_bytes < job.total_bytes);
            events
        };

        for event in events {
            self.publish(event);
        }
    }

    /// Fail a job as if the transfer broke.
    pub fn fail_job(&self, job_id: &JobId, reason: &str) -> Result<()> {
        let seq = {
            let mut jobs = self.lock_jobs();
            let index = match jobs.iter().position(|job| &job.job_id == job_id) {
                Some(index) => index,
                None => bail!("Unknown job {}", job_id),
            };
            jobs.remove(index).seq + 1
        };
        info!("Job {} failed: {}", job_id, reason);
        self.publish(EngineEvent::Failed {
            job_id: job_id.clone(),
            seq,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Tick until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            "Simulated download engine starting (tick={:?}, speed={} B/s)",
            self.settings.tick, self.settings.bytes_per_sec
        );
        let mut interval = tokio::time::interval(self.settings.tick);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.cancelled() => {
                    info!("Simulated download engine shutting down");
                    break;
                }
            }
        }
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Vec<SimulatedJob>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("No subscribers for engine event: {:?}", e.0);
        }
    }

    fn set_paused(&self, job_id: &JobId, paused: bool) -> Result<()> {
        let mut jobs = self.lock_jobs();
        match jobs.iter_mut().find(|job| &job.job_id == job_id) {
            Some(job) => {
                job.paused = paused;
                Ok(())
            }
            None => bail!("Unknown job {}", job_id),
        }
    }
}

#[async_trait]
impl DownloadEngine for SimulatedDownloadEngine {
    async fn submit_magnet_link(&self, magnet: &MagnetLink) -> Result<JobHandle, RejectionReason> {
        tokio::time::sleep(self.settings.accept_delay).await;
        if !self.available.load(Ordering::SeqCst) {
            return Err(RejectionReason::Unavailable);
        }

        let mut jobs = self.lock_jobs();
        if jobs
            .iter()
            .any(|job| job.info_hash.eq_ignore_ascii_case(&magnet.info_hash))
        {
            return Err(RejectionReason::Duplicate);
        }

        let job_id = JobId(format!(
            "job-{}",
            self.next_job.fetch_add(1, Ordering::SeqCst)
        ));
        jobs.push(SimulatedJob {
            job_id: job_id.clone(),
            info_hash: magnet.info_hash.clone(),
            total_bytes: magnet
                .exact_length
                .unwrap_or(self.settings.default_size_bytes),
            downloaded_bytes: 0,
            paused: false,
            seq: 0,
        });
        debug!("Accepted {} as {}", magnet.label(), job_id);

        Ok(JobHandle {
            job_id,
            info_hash: magnet.info_hash.clone(),
        })
    }

    async fn pause_job(&self, job_id: &JobId) -> Result<()> {
        self.set_paused(job_id, true)
    }

    async fn resume_job(&self, job_id: &JobId) -> Result<()> {
        self.set_paused(job_id, false)
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let mut jobs = self.lock_jobs();
        let before = jobs.len();
        jobs.retain(|job| &job.job_id != job_id);
        if jobs.len() == before {
            bail!("Unknown job {}", job_id);
        }
        debug!("Cancelled {}", job_id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }
}

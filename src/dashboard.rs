//! Presentation boundary of the dashboard.
//!
//! Wires the queue, the download engine, the submission controller and
//! cloud storage together. The UI reads [`DashboardSnapshot`]s and sends
//! intents (submit, pause, resume, cancel, connect); outcomes also go out on
//! the [`EventBus`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cloud::{CloudConnection, CloudProvider, CloudStorage, ConnectionError};
use crate::config::DEFAULT_RECENT_LIMIT;
use crate::downloads::{
    DownloadEngine, DownloadId, DownloadRecord, DownloadStatus, ProgressPump, QueueError,
    QueueStats, QueueSubmissionController, SharedQueue, StorageUsage,
};
use crate::notifications::{AppEvent, CloudEvent, EventBus, QueueEvent};

/// Read-only view of everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub active: Vec<DownloadRecord>,
    /// Most recent first, capped at the configured limit.
    pub recent: Vec<DownloadRecord>,
    pub storage: StorageUsage,
    pub stats: QueueStats,
    pub connections: Vec<CloudConnection>,
    pub submitting: bool,
}

pub struct DashboardService {
    queue: SharedQueue,
    engine: Arc<dyn DownloadEngine>,
    submissions: QueueSubmissionController,
    cloud: Arc<dyn CloudStorage>,
    events: EventBus,
    recent_limit: usize,
}

impl DashboardService {
    pub fn new(
        queue: SharedQueue,
        engine: Arc<dyn DownloadEngine>,
        cloud: Arc<dyn CloudStorage>,
        events: EventBus,
    ) -> Self {
        let submissions = QueueSubmissionController::new(queue.clone(), engine.clone(), events.clone());
        Self {
            queue,
            engine,
            submissions,
            cloud,
            events,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submissions = self.submissions.with_timeout(timeout);
        self
    }

    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// Spawn the task applying engine progress to the queue.
    pub fn start_progress_pump(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let pump = ProgressPump::new(self.queue.clone(), self.events.clone());
        let engine_rx = self.engine.subscribe();
        tokio::spawn(async move { pump.run(engine_rx, shutdown).await })
    }

    pub async fn submit_magnet_link(&self, raw_input: &str) -> Result<DownloadRecord, QueueError> {
        self.submissions.submit(raw_input).await
    }

    /// Navigation away from the dashboard.
    pub fn abandon_submission(&self) -> bool {
        self.submissions.abandon()
    }

    /// Resolve a full id or a unique prefix of one.
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<DownloadId, QueueError> {
        if let Ok(id) = id_or_prefix.trim().parse::<DownloadId>() {
            return Ok(id);
        }
        self.queue.with(|queue| queue.find_by_prefix(id_or_prefix))
    }

    pub fn get(&self, id: DownloadId) -> Option<DownloadRecord> {
        self.queue.get(id)
    }

    pub async fn pause(&self, id: DownloadId) -> Result<DownloadRecord, QueueError> {
        let (changed, record) = self.queue.with(|queue| {
            let changed = queue.pause(id)?;
            Ok::<_, QueueError>((changed, queue.get(id).cloned()))
        })?;
        let record = record.ok_or_else(|| QueueError::RecordNotFound(id.to_string()))?;

        if changed {
            if let Some(job_id) = &record.job_id {
                if let Err(e) = self.engine.pause_job(job_id).await {
                    warn!("Engine could not pause {}: {}", job_id, e);
                }
            }
            self.publish_status(&record);
        }
        Ok(record)
    }

    /// Resume a paused record, or retry a failed one.
    pub async fn resume(&self, id: DownloadId) -> Result<DownloadRecord, QueueError> {
        let (previous, changed, record) = self.queue.with(|queue| {
            let previous = queue.get(id).map(|r| r.status);
            let changed = queue.resume(id)?;
            Ok::<_, QueueError>((previous, changed, queue.get(id).cloned()))
        })?;
        let mut record = record.ok_or_else(|| QueueError::RecordNotFound(id.to_string()))?;

        if !changed {
            return Ok(record);
        }
        self.publish_status(&record);

        if previous == Some(DownloadStatus::Failed) {
            debug!("Resubmitting failed download {}", record.name);
            record = self.submissions.resubmit(id).await?;
        } else if let Some(job_id) = &record.job_id {
            if let Err(e) = self.engine.resume_job(job_id).await {
                warn!("Engine could not resume {}: {}", job_id, e);
            }
        }
        Ok(record)
    }

    pub async fn cancel(&self, id: DownloadId) -> Result<DownloadRecord, QueueError> {
        let record = self.queue.with(|queue| queue.cancel(id))?;
        if let Some(job_id) = &record.job_id {
            if let Err(e) = self.engine.cancel_job(job_id).await {
                debug!("Engine could not cancel {}: {}", job_id, e);
            }
        }
        self.events
            .publish(AppEvent::Queue(QueueEvent::DownloadRemoved { id }));
        Ok(record)
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let connections = match self.cloud.list_connections().await {
            Ok(connections) => connections,
            Err(e) => {
                warn!("Could not list cloud connections: {}", e);
                Vec::new()
            }
        };

        let (active, recent, storage, stats) = self.queue.with(|queue| {
            (
                queue.active_downloads().to_vec(),
                queue
                    .recent_downloads()
                    .iter()
                    .take(self.recent_limit)
                    .cloned()
                    .collect(),
                queue.storage_usage(),
                queue.stats(),
            )
        });

        DashboardSnapshot {
            active,
            recent,
            storage,
            stats,
            connections,
            submitting: self.submissions.is_submitting(),
        }
    }

    pub async fn cloud_connections(&self) -> Result<Vec<CloudConnection>, ConnectionError> {
        self.cloud.list_connections().await
    }

    pub async fn connect_cloud(&self, provider: CloudProvider) -> Result<(), ConnectionError> {
        self.cloud.connect(provider).await?;
        self.events
            .publish(AppEvent::Cloud(CloudEvent::Connected(provider)));
        Ok(())
    }

    pub async fn disconnect_cloud(&self, provider: CloudProvider) -> Result<(), ConnectionError> {
        self.cloud.disconnect(provider).await?;
        self.events
            .publish(AppEvent::Cloud(CloudEvent::Disconnected(provider)));
        Ok(())
    }

    fn publish_status(&self, record: &DownloadRecord) {
        self.events.publish(AppEvent::Queue(QueueEvent::StatusChanged {
            id: record.id,
            status: record.status,
        }));
    }
}

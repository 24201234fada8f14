//! The download queue: canonical set of download records.
//!
//! Records are partitioned into "active" (insertion order) and "recent"
//! (most recently completed first). A record is in exactly one of the two,
//! and it is in "recent" iff it is completed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::engine::{JobId, RejectionReason};
use super::magnet::{MagnetLink, MagnetParseError};
use super::models::{DownloadId, DownloadRecord, DownloadStatus, QueueStats, StorageUsage};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Invalid magnet link: {0}")]
    InvalidMagnetLink(MagnetParseError),

    #[error("Download {0} not found")]
    RecordNotFound(String),

    #[error("Cannot {action} a {status} download")]
    InvalidTransition {
        action: &'static str,
        status: DownloadStatus,
    },

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("Please enter a magnet link")]
    EmptyInput,

    #[error("Download rejected: {0}")]
    Rejected(RejectionReason),

    #[error("The download engine did not answer in time")]
    Timeout,

    #[error("The submission was abandoned")]
    Abandoned,
}

impl From<MagnetParseError> for QueueError {
    fn from(e: MagnetParseError) -> Self {
        QueueError::InvalidMagnetLink(e)
    }
}

/// What an accepted progress update did to the record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressOutcome {
    /// Still active, progress applied.
    Updated(DownloadRecord),
    /// Reached 100 and moved to the recent list.
    Completed(DownloadRecord),
    /// Repeat of 100 on a completed record.
    AlreadyCompleted,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub quota_bytes: u64,
    /// Where completed downloads land in the cloud, e.g. "/Downloads".
    pub destination_root: Option<String>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            quota_bytes: crate::plans::Plan::default().quota_bytes(),
            destination_root: Some("/Downloads".to_string()),
        }
    }
}

pub struct DownloadQueue {
    active: Vec<DownloadRecord>,
    recent: Vec<DownloadRecord>,
    /// Last applied engine sequence number per record.
    last_seq: HashMap<DownloadId, u64>,
    settings: QueueSettings,
}

impl DownloadQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            active: Vec::new(),
            recent: Vec::new(),
            last_seq: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Parses the link and appends a queued record to the active list.
    pub fn add_download(&mut self, magnet_link: &str) -> Result<DownloadRecord, QueueError> {
        let magnet = MagnetLink::parse(magnet_link)?;
        Ok(self.add_parsed(magnet))
    }

    pub fn add_parsed(&mut self, magnet: MagnetLink) -> DownloadRecord {
        let record = DownloadRecord::new(magnet);
        info!("Queued download {} ({})", record.name, record.id.short());
        self.active.push(record.clone());
        record
    }

    pub fn update_progress(
        &mut self,
        id: DownloadId,
        percent: u8,
        speed_bytes_per_sec: u64,
        eta_seconds: u64,
    ) -> Result<ProgressOutcome, QueueError> {
        let percent = percent.min(100);

        if let Some(done) = self.recent.iter().find(|r| r.id == id) {
            return if percent == 100 {
                Ok(ProgressOutcome::AlreadyCompleted)
            } else {
                Err(QueueError::InvalidTransition {
                    action: "update",
                    status: done.status,
                })
            };
        }

        let index = self.active_index(id)?;
        let record = &mut self.active[index];
        if record.status == DownloadStatus::Failed {
            return Err(QueueError::InvalidTransition {
                action: "update",
                status: record.status,
            });
        }

        record.progress_percent = percent;
        if percent < 100 {
            record.speed_bytes_per_sec = speed_bytes_per_sec;
            record.eta_seconds = eta_seconds;
            if record.status == DownloadStatus::Queued {
                record.status = DownloadStatus::Downloading;
            }
            return Ok(ProgressOutcome::Updated(record.clone()));
        }

        let mut record = self.active.remove(index);
        record.status = DownloadStatus::Completed;
        record.speed_bytes_per_sec = 0;
        record.eta_seconds = 0;
        record.completed_at = Some(Utc::now());
        record.cloud_destination_path = self
            .settings
            .destination_root
            .as_ref()
            .map(|root| format!("{}/{}", root.trim_end_matches('/'), record.name));
        info!("Download {} completed", record.name);
        self.recent.insert(0, record.clone());
        Ok(ProgressOutcome::Completed(record))
    }

    /// Engine reports the payload size once it knows it.
    pub fn set_size(&mut self, id: DownloadId, size_bytes: u64) -> Result<(), QueueError> {
        let index = self.active_index(id)?;
        self.active[index].size_bytes = size_bytes;
        Ok(())
    }

    /// Returns whether the status changed.
    pub fn pause(&mut self, id: DownloadId) -> Result<bool, QueueError> {
        let record = self.active_record_mut(id, "pause")?;
        match record.status {
            DownloadStatus::Queued | DownloadStatus::Downloading => {
                record.status = DownloadStatus::Paused;
                record.speed_bytes_per_sec = 0;
                record.eta_seconds = 0;
                debug!("Paused {}", record.name);
                Ok(true)
            }
            DownloadStatus::Paused => Ok(false),
            status => Err(QueueError::InvalidTransition {
                action: "pause",
                status,
            }),
        }
    }

    /// Returns whether the status changed. Resuming a failed record retries it.
    pub fn resume(&mut self, id: DownloadId) -> Result<bool, QueueError> {
        let record = self.active_record_mut(id, "resume")?;
        match record.status {
            DownloadStatus::Paused => {
                record.status = if record.progress_percent > 0 {
                    DownloadStatus::Downloading
                } else {
                    DownloadStatus::Queued
                };
                debug!("Resumed {}", record.name);
                Ok(true)
            }
            DownloadStatus::Failed => {
                record.status = DownloadStatus::Queued;
                record.progress_percent = 0;
                record.error = None;
                record.job_id = None;
                debug!("Retrying {}", record.name);
                Ok(true)
            }
            DownloadStatus::Queued | DownloadStatus::Downloading => Ok(false),
            status => Err(QueueError::InvalidTransition {
                action: "resume",
                status,
            }),
        }
    }

    /// Removes an active record.
    pub fn cancel(&mut self, id: DownloadId) -> Result<DownloadRecord, QueueError> {
        let index = match self.active_index(id) {
            Ok(index) => index,
            Err(e) => {
                if let Some(done) = self.recent.iter().find(|r| r.id == id) {
                    return Err(QueueError::InvalidTransition {
                        action: "cancel",
                        status: done.status,
                    });
                }
                return Err(e);
            }
        };
        let record = self.active.remove(index);
        self.last_seq.remove(&id);
        info!("Cancelled download {}", record.name);
        Ok(record)
    }

    /// Engine-reported failure. Progress stays where it was.
    pub fn mark_failed(&mut self, id: DownloadId, reason: &str) -> Result<DownloadRecord, QueueError> {
        let record = self.active_record_mut(id, "fail")?;
        record.status = DownloadStatus::Failed;
        record.speed_bytes_per_sec = 0;
        record.eta_seconds = 0;
        record.error = Some(reason.to_string());
        info!("Download {} failed: {}", record.name, reason);
        Ok(record.clone())
    }

    pub fn attach_job(&mut self, id: DownloadId, job_id: JobId) -> Result<(), QueueError> {
        let index = self.active_index(id)?;
        self.active[index].job_id = Some(job_id);
        Ok(())
    }

    pub fn find_by_job(&self, job_id: &JobId) -> Option<&DownloadRecord> {
        self.active
            .iter()
            .chain(self.recent.iter())
            .find(|r| r.job_id.as_ref() == Some(job_id))
    }

    /// Looks a record up by full id or by a unique prefix of it.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<DownloadId, QueueError> {
        let prefix = prefix.trim().to_lowercase();
        let mut matches = self
            .active
            .iter()
            .chain(self.recent.iter())
            .filter(|r| !prefix.is_empty() && r.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record.id),
            _ => Err(QueueError::RecordNotFound(prefix.clone())),
        }
    }

    /// Records `seq` for the record if it is newer than the last applied one.
    ///
    /// Returns false for stale or duplicate reports, which must be dropped.
    pub fn accept_sequence(&mut self, id: DownloadId, seq: u64) -> bool {
        match self.last_seq.get(&id) {
            Some(last) if *last >= seq => false,
            _ => {
                self.last_seq.insert(id, seq);
                true
            }
        }
    }

    /// Forget sequence numbers, used when a record gets a new engine job.
    pub fn reset_sequence(&mut self, id: DownloadId) {
        self.last_seq.remove(&id);
    }

    pub fn get(&self, id: DownloadId) -> Option<&DownloadRecord> {
        self.active
            .iter()
            .chain(self.recent.iter())
            .find(|r| r.id == id)
    }

    pub fn active_downloads(&self) -> &[DownloadRecord] {
        &self.active
    }

    pub fn recent_downloads(&self) -> &[DownloadRecord] {
        &self.recent
    }

    pub fn storage_usage(&self) -> StorageUsage {
        StorageUsage {
            used_bytes: self
                .recent
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.size_bytes)),
            quota_bytes: self.settings.quota_bytes,
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> QueueStats {
        let week_ago = now - ChronoDuration::days(7);
        let total_completed = self.recent.len();
        let completed_this_week = self
            .recent
            .iter()
            .filter(|r| r.completed_at.is_some_and(|at| at > week_ago))
            .count();
        let failed = self
            .active
            .iter()
            .filter(|r| r.status == DownloadStatus::Failed)
            .count();
        let queued_items = self
            .active
            .iter()
            .filter(|r| r.status == DownloadStatus::Queued)
            .count();
        let finished = total_completed + failed;
        let success_rate_percent = if finished == 0 {
            None
        } else {
            Some(total_completed as f64 * 100.0 / finished as f64)
        };

        QueueStats {
            total_completed,
            completed_this_week,
            failed,
            queued_items,
            success_rate_percent,
        }
    }

    fn active_index(&self, id: DownloadId) -> Result<usize, QueueError> {
        self.active
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| QueueError::RecordNotFound(id.to_string()))
    }

    /// Active record for a user action; completed records yield
    /// `InvalidTransition`, unknown ids `RecordNotFound`.
    fn active_record_mut(
        &mut self,
        id: DownloadId,
        action: &'static str,
    ) -> Result<&mut DownloadRecord, QueueError> {
        if let Some(done) = self.recent.iter().find(|r| r.id == id) {
            return Err(QueueError::InvalidTransition {
                action,
                status: done.status,
            });
        }
        let index = self.active_index(id)?;
        Ok(&mut self.active[index])
    }
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

/// The queue behind a single lock, shared by the controllers and the
/// progress pump.
#[derive(Clone)]
pub struct SharedQueue {
    inner: Arc<Mutex<DownloadQueue>>,
}

impl SharedQueue {
    pub fn new(queue: DownloadQueue) -> Self {
        Self {
            inner: Arc::new(Mutex::new(queue)),
        }
    }

    /// Run `f` with the queue locked. Never hold this across an await.
    pub fn with<R>(&self, f: impl FnOnce(&mut DownloadQueue) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn active_downloads(&self) -> Vec<DownloadRecord> {
        self.lock().active_downloads().to_vec()
    }

    pub fn recent_downloads(&self) -> Vec<DownloadRecord> {
        self.lock().recent_downloads().to_vec()
    }

    pub fn get(&self, id: DownloadId) -> Option<DownloadRecord> {
        self.lock().get(id).cloned()
    }

    pub fn storage_usage(&self) -> StorageUsage {
        self.lock().storage_usage()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats()
    }

    fn lock(&self) -> MutexGuard<'_, DownloadQueue> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK_A: &str = "magnet:?xt=urn:btih:ABC123";
    const LINK_B: &str = "magnet:?xt=urn:btih:DEF456&dn=second.iso&xl=1000";

    fn queue() -> DownloadQueue {
        DownloadQueue::new(QueueSettings {
            quota_bytes: 10_000,
            destination_root: Some("/Downloads".to_string()),
        })
    }

    #[test]
    fn test_add_download() {
        let mut queue = queue();
        let record = queue.add_download(LINK_A).unwrap();

        assert_eq!(queue.active_downloads().len(), 1);
        assert_eq!(queue.active_downloads()[0].id, record.id);
        assert_eq!(record.status, DownloadStatus::Queued);
        assert_eq!(record.progress_percent, 0);
        assert!(queue.recent_downloads().is_empty());
    }

    #[test]
    fn test_add_invalid_link_leaves_queue_unchanged() {
        let mut queue = queue();
        assert_eq!(
            queue.add_download("not-a-magnet"),
            Err(QueueError::InvalidMagnetLink(MagnetParseError::MissingScheme))
        );
        assert!(queue.active_downloads().is_empty());
        assert!(queue.recent_downloads().is_empty());
    }

    #[test]
    fn test_progress_then_completion() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        let b = queue.add_download(LINK_B).unwrap();
        assert_eq!(
            queue
                .active_downloads()
                .iter()
                .map(|r| r.id)
                .collect::<Vec<_>>(),
            vec![a.id, b.id]
        );

        match queue.update_progress(a.id, 40, 2_400_000, 120).unwrap() {
            ProgressOutcome::Updated(record) => {
                assert_eq!(record.status, DownloadStatus::Downloading);
                assert_eq!(record.progress_percent, 40);
                assert_eq!(record.speed_bytes_per_sec, 2_400_000);
            }
            other => panic!("Unexpected outcome {:?}", other),
        }

        let completed = match queue.update_progress(a.id, 100, 0, 0).unwrap() {
            ProgressOutcome::Completed(record) => record,
            other => panic!("Unexpected outcome {:?}", other),
        };
        assert_eq!(completed.status, DownloadStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(
            completed.cloud_destination_path.as_deref(),
            Some("/Downloads/magnet ABC123")
        );

        assert_eq!(queue.active_downloads().len(), 1);
        assert_eq!(queue.active_downloads()[0].id, b.id);
        assert_eq!(queue.recent_downloads().len(), 1);
        assert_eq!(queue.recent_downloads()[0].id, a.id);

        assert_eq!(
            queue.update_progress(a.id, 100, 0, 0),
            Ok(ProgressOutcome::AlreadyCompleted)
        );
        assert_eq!(queue.recent_downloads().len(), 1);
        assert!(matches!(
            queue.update_progress(a.id, 50, 0, 0),
            Err(QueueError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_recent_is_most_recent_first() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        let b = queue.add_download(LINK_B).unwrap();
        queue.update_progress(a.id, 100, 0, 0).unwrap();
        queue.update_progress(b.id, 100, 0, 0).unwrap();

        let recent: Vec<_> = queue.recent_downloads().iter().map(|r| r.id).collect();
        assert_eq!(recent, vec![b.id, a.id]);
    }

    #[test]
    fn test_percent_is_clamped() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        assert!(matches!(
            queue.update_progress(a.id, 250, 0, 0),
            Ok(ProgressOutcome::Completed(_))
        ));
        assert_eq!(queue.recent_downloads()[0].progress_percent, 100);
    }

    #[test]
    fn test_unknown_record() {
        let mut queue = queue();
        let id = DownloadId::new();
        assert!(matches!(
            queue.update_progress(id, 10, 0, 0),
            Err(QueueError::RecordNotFound(_))
        ));
        assert!(matches!(queue.pause(id), Err(QueueError::RecordNotFound(_))));
        assert!(matches!(queue.resume(id), Err(QueueError::RecordNotFound(_))));
        assert!(matches!(queue.cancel(id), Err(QueueError::RecordNotFound(_))));
    }

    #[test]
    fn test_pause_resume() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();

        assert_eq!(queue.pause(a.id), Ok(true));
        assert_eq!(queue.get(a.id).unwrap().status, DownloadStatus::Paused);
        assert_eq!(queue.pause(a.id), Ok(false));

        // Nothing downloaded yet, goes back to queued
        assert_eq!(queue.resume(a.id), Ok(true));
        assert_eq!(queue.get(a.id).unwrap().status, DownloadStatus::Queued);
        assert_eq!(queue.resume(a.id), Ok(false));

        queue.update_progress(a.id, 30, 10, 10).unwrap();
        queue.pause(a.id).unwrap();
        // Paused records keep their status on progress
        queue.update_progress(a.id, 35, 10, 10).unwrap();
        assert_eq!(queue.get(a.id).unwrap().status, DownloadStatus::Paused);

        queue.resume(a.id).unwrap();
        assert_eq!(queue.get(a.id).unwrap().status, DownloadStatus::Downloading);
    }

    #[test]
    fn test_completed_record_rejects_transitions() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        queue.update_progress(a.id, 100, 0, 0).unwrap();
        let before = queue.recent_downloads().to_vec();

        assert_eq!(
            queue.pause(a.id),
            Err(QueueError::InvalidTransition {
                action: "pause",
                status: DownloadStatus::Completed,
            })
        );
        assert_eq!(
            queue.resume(a.id),
            Err(QueueError::InvalidTransition {
                action: "resume",
                status: DownloadStatus::Completed,
            })
        );
        assert_eq!(
            queue.cancel(a.id),
            Err(QueueError::InvalidTransition {
                action: "cancel",
                status: DownloadStatus::Completed,
            })
        );
        assert_eq!(queue.recent_downloads(), before.as_slice());
        assert!(queue.active_downloads().is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        let b = queue.add_download(LINK_B).unwrap();

        let removed = queue.cancel(a.id).unwrap();
        assert_eq!(removed.id, a.id);
        assert_eq!(queue.active_downloads().len(), 1);
        assert_eq!(queue.active_downloads()[0].id, b.id);
        assert!(queue.get(a.id).is_none());
    }

    #[test]
    fn test_failure_and_retry() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        queue.attach_job(a.id, JobId("job-1".to_string())).unwrap();
        queue.update_progress(a.id, 20, 10, 10).unwrap();

        let failed = queue.mark_failed(a.id, "tracker unreachable").unwrap();
        assert_eq!(failed.status, DownloadStatus::Failed);
        assert_eq!(failed.progress_percent, 20);
        assert_eq!(failed.error.as_deref(), Some("tracker unreachable"));

        assert!(matches!(
            queue.pause(a.id),
            Err(QueueError::InvalidTransition {
                status: DownloadStatus::Failed,
                ..
            })
        ));
        assert!(matches!(
            queue.update_progress(a.id, 30, 0, 0),
            Err(QueueError::InvalidTransition { .. })
        ));

        assert_eq!(queue.resume(a.id), Ok(true));
        let retried = queue.get(a.id).unwrap();
        assert_eq!(retried.status, DownloadStatus::Queued);
        assert_eq!(retried.progress_percent, 0);
        assert!(retried.error.is_none());
        assert!(retried.job_id.is_none());
    }

    #[test]
    fn test_sequence_numbers() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();

        assert!(queue.accept_sequence(a.id, 1));
        assert!(queue.accept_sequence(a.id, 3));
        assert!(!queue.accept_sequence(a.id, 2));
        assert!(!queue.accept_sequence(a.id, 3));

        queue.reset_sequence(a.id);
        assert!(queue.accept_sequence(a.id, 1));
    }

    #[test]
    fn test_job_and_prefix_lookup() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        queue.attach_job(a.id, JobId("job-1".to_string())).unwrap();

        assert_eq!(
            queue.find_by_job(&JobId("job-1".to_string())).unwrap().id,
            a.id
        );
        assert!(queue.find_by_job(&JobId("job-2".to_string())).is_none());

        assert_eq!(queue.find_by_prefix(&a.id.short()), Ok(a.id));
        assert_eq!(
            queue.find_by_prefix(&a.id.to_string().to_uppercase()),
            Ok(a.id)
        );
        assert!(queue.find_by_prefix("").is_err());
    }

    #[test]
    fn test_storage_usage_sums_completed() {
        let mut queue = queue();
        let a = queue.add_download(LINK_A).unwrap();
        let b = queue.add_download(LINK_B).unwrap();
        queue.set_size(a.id, 500).unwrap();

        assert_eq!(queue.storage_usage().used_bytes, 0);
        queue.update_progress(b.id, 100, 0, 0).unwrap();
        assert_eq!(queue.storage_usage().used_bytes, 1000);
        queue.update_progress(a.id, 100, 0, 0).unwrap();
        assert_eq!(
            queue.storage_usage(),
            StorageUsage {
                used_bytes: 1500,
                quota_bytes: 10_000
            }
        );
    }

    #[test]
    fn test_storage_usage_saturates_on_huge_sizes() {
        let mut queue = queue();
        let a = queue
            .add_download("magnet:?xt=urn:btih:AAA&xl=18446744073709551615")
            .unwrap();
        let b = queue.add_download("magnet:?xt=urn:btih:BBB&xl=2").unwrap();
        queue.update_progress(a.id, 100, 0, 0).unwrap();
        queue.update_progress(b.id, 100, 0, 0).unwrap();

        let usage = queue.storage_usage();
        assert_eq!(usage.used_bytes, u64::MAX);
        assert_eq!(usage.remaining_bytes(), 0);
    }

    #[test]
    fn test_stats() {
        let mut queue = queue();
        assert_eq!(queue.stats().success_rate_percent, None);

        let a = queue.add_download(LINK_A).unwrap();
        let b = queue.add_download(LINK_B).unwrap();
        let c = queue.add_download(LINK_A).unwrap();
        queue.add_download(LINK_B).unwrap();

        queue.update_progress(a.id, 100, 0, 0).unwrap();
        queue.update_progress(b.id, 100, 0, 0).unwrap();
        queue.mark_failed(c.id, "boom").unwrap();

        let stats = queue.stats();
        assert_eq!(stats.total_completed, 2);
        assert_eq!(stats.completed_this_week, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued_items, 1);
        let rate = stats.success_rate_percent.unwrap();
        assert!((rate - 200.0 / 3.0).abs() < 1e-9);

        let later = queue.stats_at(Utc::now() + ChronoDuration::days(8));
        assert_eq!(later.completed_this_week, 0);
        assert_eq!(later.total_completed, 2);
    }

    #[test]
    fn test_shared_queue() {
        let shared = SharedQueue::new(queue());
        let record = shared.with(|q| q.add_download(LINK_A)).unwrap();
        assert_eq!(shared.active_downloads().len(), 1);
        assert_eq!(shared.get(record.id).unwrap().name, "magnet ABC123");

        let clone = shared.clone();
        clone
            .with(|q| q.update_progress(record.id, 100, 0, 0))
            .unwrap();
        assert_eq!(shared.recent_downloads().len(), 1);
        assert_eq!(shared.stats().total_completed, 1);
    }
}

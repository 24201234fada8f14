//! Magnet link submission from the dashboard input box.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::engine::{DownloadEngine, JobHandle};
use super::magnet::MagnetLink;
use super::models::{DownloadId, DownloadRecord};
use super::queue::{QueueError, SharedQueue};
use crate::notifications::{AppEvent, EventBus, QueueEvent};

pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(30);

struct SubmissionState {
    in_flight: bool,
    /// Bumped on every submission and on abandonment.
    epoch: u64,
}

/// Trims and checks raw input, waits for the engine to accept the link and
/// only then adds the record to the queue.
///
/// One submission at a time. An abandoned submission never reaches the
/// queue; if the engine accepts it late, the job is cancelled again.
pub struct QueueSubmissionController {
    queue: SharedQueue,
    engine: Arc<dyn DownloadEngine>,
    events: EventBus,
    timeout: Duration,
    state: Mutex<SubmissionState>,
}

struct SubmissionGuard<'a> {
    controller: &'a QueueSubmissionController,
    epoch: u64,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.controller.abandon_epoch(self.epoch);
    }
}

impl QueueSubmissionController {
    pub fn new(queue: SharedQueue, engine: Arc<dyn DownloadEngine>, events: EventBus) -> Self {
        Self {
            queue,
            engine,
            events,
            timeout: DEFAULT_SUBMISSION_TIMEOUT,
            state: Mutex::new(SubmissionState {
                in_flight: false,
                epoch: 0,
            }),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.lock_state().in_flight
    }

    pub async fn submit(&self, raw_input: &str) -> Result<DownloadRecord, QueueError> {
        let input = raw_input.trim();
        if input.is_empty() {
            return Err(self.reject(QueueError::EmptyInput));
        }

        let epoch = self.begin()?;
        let _guard = SubmissionGuard {
            controller: self,
            epoch,
        };

        let magnet = match MagnetLink::parse(input) {
            Ok(magnet) => magnet,
            Err(e) => return Err(self.fail(epoch, e.into())),
        };

        let handle = match self.accept(&magnet).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(epoch, e)),
        };

        let added = {
            let mut state = self.lock_state();
            if state.epoch != epoch || !state.in_flight {
                None
            } else {
                state.in_flight = false;
                Some(self.queue.with(|queue| {
                    let mut record = queue.add_parsed(magnet);
                    if let Err(e) = queue.attach_job(record.id, handle.job_id.clone()) {
                        warn!("Failed to attach {} to {}: {}", handle.job_id, record.id.short(), e);
                    }
                    record.job_id = Some(handle.job_id.clone());
                    record
                }))
            }
        };

        match added {
            Some(record) => {
                info!("Download Added: {} as {}", record.name, handle.job_id);
                self.events
                    .publish(AppEvent::Queue(QueueEvent::DownloadAdded(record.clone())));
                Ok(record)
            }
            None => {
                debug!("Submission {} was abandoned, cancelling {}", epoch, handle.job_id);
                if let Err(e) = self.engine.cancel_job(&handle.job_id).await {
                    warn!("Could not cancel abandoned job {}: {}", handle.job_id, e);
                }
                Err(QueueError::Abandoned)
            }
        }
    }

    /// Sends a record that was reset for retry back to the engine.
    pub async fn resubmit(&self, id: DownloadId) -> Result<DownloadRecord, QueueError> {
        let magnet = self
            .queue
            .get(id)
            .map(|record| record.magnet)
            .ok_or_else(|| QueueError::RecordNotFound(id.to_string()))?;

        match self.accept(&magnet).await {
            Ok(handle) => self.queue.with(|queue| {
                queue.attach_job(id, handle.job_id)?;
                queue.reset_sequence(id);
                queue
                    .get(id)
                    .cloned()
                    .ok_or_else(|| QueueError::RecordNotFound(id.to_string()))
            }),
            Err(e) => {
                let reason = e.to_string();
                if self.queue.with(|queue| queue.mark_failed(id, &reason)).is_ok() {
                    self.events
                        .publish(AppEvent::Queue(QueueEvent::DownloadFailed { id, reason }));
                }
                Err(e)
            }
        }
    }

    /// Discards the pending submission, if any.
    pub fn abandon(&self) -> bool {
        let epoch = self.lock_state().epoch;
        self.abandon_epoch(epoch)
    }

    async fn accept(&self, magnet: &MagnetLink) -> Result<JobHandle, QueueError> {
        match tokio::time::timeout(self.timeout, self.engine.submit_magnet_link(magnet)).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(reason)) => {
                info!("Engine rejected {}: {}", magnet.label(), reason);
                Err(QueueError::Rejected(reason))
            }
            Err(_) => {
                warn!(
                    "Engine did not accept {} within {:?}",
                    magnet.label(),
                    self.timeout
                );
                Err(QueueError::Timeout)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SubmissionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Result<u64, QueueError> {
        let mut state = self.lock_state();
        if state.in_flight {
            drop(state);
            return Err(self.reject(QueueError::SubmissionInProgress));
        }
        state.in_flight = true;
        state.epoch += 1;
        Ok(state.epoch)
    }

    fn reject(&self, error: QueueError) -> QueueError {
        self.events
            .publish(AppEvent::Queue(QueueEvent::SubmissionFailed(error.clone())));
        error
    }

    fn fail(&self, epoch: u64, error: QueueError) -> QueueError {
        {
            let mut state = self.lock_state();
            if state.epoch != epoch || !state.in_flight {
                return QueueError::Abandoned;
            }
            state.in_flight = false;
        }
        self.reject(error)
    }

    fn abandon_epoch(&self, epoch: u64) -> bool {
        {
            let mut state = self.lock_state();
            if state.epoch != epoch || !state.in_flight {
                return false;
            }
            state.in_flight = false;
            state.epoch += 1;
        }
        debug!("Submission {} abandoned", epoch);
        self.reject(QueueError::Abandoned);
        true
    }
}

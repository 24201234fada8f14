//! Applies engine reports to the queue.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::EngineEvent;
use super::queue::{ProgressOutcome, SharedQueue};
use crate::notifications::{AppEvent, EventBus, QueueEvent};

/// Consumes [`EngineEvent`]s and turns them into queue updates plus
/// [`QueueEvent`]s, dropping reports that arrive out of order.
pub struct ProgressPump {
    queue: SharedQueue,
    events: EventBus,
}

impl ProgressPump {
    pub fn new(queue: SharedQueue, events: EventBus) -> Self {
        Self { queue, events }
    }

    /// Apply a single engine report. Returns whether it changed the queue.
    pub fn handle(&self, event: EngineEvent) -> bool {
        let published = self.queue.with(|queue| {
            let id = match queue.find_by_job(event.job_id()) {
                Some(record) => record.id,
                None => {
                    debug!("Ignoring report for unknown job {}", event.job_id());
                    return Vec::new();
                }
            };
            if !queue.accept_sequence(id, event.seq()) {
                debug!(
                    "Dropping stale report {} for job {}",
                    event.seq(),
                    event.job_id()
                );
                return Vec::new();
            }

            match event {
                EngineEvent::Progress(progress) => {
                    if let Some(total) = progress.total_bytes {
                        // Completed records are no longer active, nothing to size.
                        let _ = queue.set_size(id, total);
                    }
                    let before = queue.get(id).map(|r| r.status);
                    match queue.update_progress(
                        id,
                        progress.percent,
                        progress.speed_bytes_per_sec,
                        progress.eta_seconds,
                    ) {
                        Ok(ProgressOutcome::Updated(record)) => {
                            let mut out = vec![QueueEvent::ProgressUpdated {
                                id,
                                percent: record.progress_percent,
                                speed_bytes_per_sec: record.speed_bytes_per_sec,
                                eta_seconds: record.eta_seconds,
                            }];
                            if before != Some(record.status) {
                                out.push(QueueEvent::StatusChanged {
                                    id,
                                    status: record.status,
                                });
                            }
                            out
                        }
                        Ok(ProgressOutcome::Completed(record)) => {
                            vec![
                                QueueEvent::StatusChanged {
                                    id,
                                    status: record.status,
                                },
                                QueueEvent::DownloadCompleted(record),
                            ]
                        }
                        Ok(ProgressOutcome::AlreadyCompleted) => Vec::new(),
                        Err(e) => {
                            debug!("Progress for {} not applied: {}", id.short(), e);
                            Vec::new()
                        }
                    }
                }
                EngineEvent::Failed { reason, .. } => match queue.mark_failed(id, &reason) {
                    Ok(record) => vec![
                        QueueEvent::StatusChanged {
                            id,
                            status: record.status,
                        },
                        QueueEvent::DownloadFailed { id, reason },
                    ],
                    Err(e) => {
                        debug!("Failure for {} not applied: {}", id.short(), e);
                        Vec::new()
                    }
                },
            }
        });

        let changed = !published.is_empty();
        for event in published {
            self.events.publish(AppEvent::Queue(event));
        }
        changed
    }

    /// Main loop, call from a spawned task.
    pub async fn run(
        &self,
        mut engine_rx: broadcast::Receiver<EngineEvent>,
        shutdown: CancellationToken,
    ) {
        info!("Progress pump starting");
        loop {
            tokio::select! {
                received = engine_rx.recv() => {
                    match received {
                        Ok(event) => {
                            self.handle(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Progress pump lagged by {} engine events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Engine event channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Progress pump shutting down");
                    break;
                }
            }
        }
        info!("Progress pump stopped");
    }
}

//! Download queue, magnet links and the download engine boundary.

mod engine;
mod magnet;
mod models;
mod progress_pump;
mod queue;
mod simulated_engine;
mod submission;

#[cfg(feature = "mock")]
pub use engine::MockDownloadEngine;
pub use engine::{DownloadEngine, EngineEvent, JobHandle, JobId, ProgressEvent, RejectionReason};
pub use magnet::{MagnetLink, MagnetParseError};
pub use models::{DownloadId, DownloadRecord, DownloadStatus, QueueStats, StorageUsage};
pub use progress_pump::ProgressPump;
pub use queue::{DownloadQueue, ProgressOutcome, QueueError, QueueSettings, SharedQueue};
pub use simulated_engine::{EngineSimulationSettings, SimulatedDownloadEngine};
pub use submission::{QueueSubmissionController, DEFAULT_SUBMISSION_TIMEOUT};

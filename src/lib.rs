//! CloudMagnet core library
//!
//! Client-side model of a "magnet link to cloud storage" service: credential
//! validation and the authentication flow, the download queue behind the
//! dashboard, and the boundaries to the identity provider, download engine
//! and cloud storage.

pub mod auth;
pub mod cloud;
pub mod config;
pub mod dashboard;
pub mod downloads;
pub mod notifications;
pub mod plans;

// Re-export commonly used types for convenience
pub use auth::{AuthMode, AuthPhase, AuthSessionController, CredentialInput};
pub use dashboard::{DashboardService, DashboardSnapshot};
pub use downloads::{DownloadQueue, DownloadRecord, QueueError, QueueSubmissionController};
pub use notifications::{AppEvent, EventBus};
pub use plans::Plan;

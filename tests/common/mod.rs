//! Common test infrastructure
//!
//! Every test builds an isolated [`TestApp`]: its own event bus, identity
//! provider, download engine, queue and cloud storage, all in-process.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestApp, MAGNET_UBUNTU};
//!
//! #[tokio::test]
//! async fn test_add_download() {
//!     let app = TestApp::spawn().await;
//!     let record = app.dashboard.submit_magnet_link(MAGNET_UBUNTU).await.unwrap();
//!     assert_eq!(app.dashboard.snapshot().await.active.len(), 1);
//! }
//! ```

mod app;
mod constants;

// Public API - this is what tests import
pub use app::{TestApp, TestAppSettings};
pub use constants::*;

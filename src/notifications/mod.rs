//! User-facing outcome events
//!
//! Controllers publish typed events on an [`EventBus`]; whatever renders the
//! UI subscribes and turns them into notices.

mod bus;
mod models;

pub use bus::EventBus;
pub use models::{AppEvent, AuthEvent, CloudEvent, Notice, NoticeVariant, QueueEvent};

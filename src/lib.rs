//! Sync engine for a groups and conversations messaging client.
//!
//! Refreshes are rate limited per list or thread, message threads are fetched
//! incrementally, and cooldowns are persisted so a restarted client resumes
//! its countdowns instead of resetting them.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod storage;
pub mod sync;

pub use common::{Message, SyncEvent, ThreadRef, TimerKey};
pub use error::{ApiError, SyncError};
pub use sync::{CountdownRegistry, RefreshOutcome, SyncCoordinator, SyncSettings, ViewScope};

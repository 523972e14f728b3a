use super::types::{ListKind, ThreadRef, TimerKey};

/// Notifications the sync layer pushes up to whatever is displaying state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A dispatched fetch failed; caches were left as they were.
    FetchFailed { key: TimerKey, message: String },
    ListUpdated { kind: ListKind, count: usize },
    ThreadUpdated { thread: ThreadRef, added: usize },
}

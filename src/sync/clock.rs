//! Persisted "last action" and "last read" timestamps.
//!
//! Action records gate how often a refresh may be dispatched; read records mark
//! which messages the user has already seen. The two are stored independently
//! and never stand in for one another.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::common::{ThreadRef, TimerKey};
use crate::storage::KeyValueStore;

const ACTION_PREFIX: &str = "action:";
const READ_PREFIX: &str = "read:";

fn read_key(thread_id: &str) -> String {
    format!("{READ_PREFIX}{thread_id}")
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct ClockStore<S> {
    store: S,
    /// Serializes check-then-record so two refreshes can't both pass the gate.
    gate: Mutex<()>,
}

impl<S: KeyValueStore> ClockStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }

    pub fn record_action(&self, key: &TimerKey) {
        self.record_action_at(key, now_millis());
    }

    pub fn record_action_at(&self, key: &TimerKey, at_millis: i64) {
        self.store.set(&key.storage_key(), &at_millis.to_string());
    }

    /// Time since the last recorded action, `None` if none was ever recorded.
    pub fn elapsed_since(&self, key: &TimerKey) -> Option<Duration> {
        let recorded = self.read_i64(&key.storage_key())?;
        let elapsed = now_millis().saturating_sub(recorded).max(0);
        Some(Duration::from_millis(elapsed as u64))
    }

    /// Record the action and return `true` unless the last one is younger
    /// than `cooldown`.
    pub fn try_begin(&self, key: &TimerKey, cooldown: Duration) -> bool {
        let _gate = self.gate.lock();
        if let Some(elapsed) = self.elapsed_since(key) {
            if elapsed < cooldown {
                return false;
            }
        }
        self.record_action(key);
        true
    }

    pub fn record_read(&self, thread_id: &str, timestamp: i64) {
        self.store.set(&read_key(thread_id), &timestamp.to_string());
    }

    pub fn last_read(&self, thread_id: &str) -> Option<i64> {
        self.read_i64(&read_key(thread_id))
    }

    /// Drop both the action and the read record of a deleted thread.
    pub fn clear_thread(&self, thread: &ThreadRef) {
        self.store.remove(&TimerKey::thread(thread).storage_key());
        self.store.remove(&read_key(&thread.id));
    }

    pub fn clear_all(&self) {
        self.store.remove_prefix(ACTION_PREFIX);
        self.store.remove_prefix(READ_PREFIX);
    }

    fn read_i64(&self, key: &str) -> Option<i64> {
        let raw = self.store.get(key)?;
        match raw.parse::<i64>() {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Ignoring unparsable clock value `{raw}` for {key}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ListKind;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn groups_key() -> TimerKey {
        TimerKey::List(ListKind::Groups)
    }

    #[test]
    fn test_elapsed_absent_until_recorded() {
        let clocks = ClockStore::new(MemoryStore::new());
        assert_eq!(clocks.elapsed_since(&groups_key()), None);

        clocks.record_action(&groups_key());
        let elapsed = clocks.elapsed_since(&groups_key()).unwrap();
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_elapsed_measures_past_record() {
        let clocks = ClockStore::new(MemoryStore::new());
        clocks.record_action_at(&groups_key(), now_millis() - 70_000);

        let elapsed = clocks.elapsed_since(&groups_key()).unwrap();
        assert!(elapsed >= Duration::from_secs(70));
        assert!(elapsed < Duration::from_secs(75));
    }

    #[test]
    fn test_future_record_counts_as_zero_elapsed() {
        let clocks = ClockStore::new(MemoryStore::new());
        clocks.record_action_at(&groups_key(), now_millis() + 60_000);
        assert_eq!(clocks.elapsed_since(&groups_key()), Some(Duration::ZERO));
    }

    #[test]
    fn test_try_begin_respects_cooldown() {
        let clocks = ClockStore::new(MemoryStore::new());
        let cooldown = Duration::from_secs(60);

        assert!(clocks.try_begin(&groups_key(), cooldown));
        assert!(!clocks.try_begin(&groups_key(), cooldown));

        clocks.record_action_at(&groups_key(), now_millis() - 61_000);
        assert!(clocks.try_begin(&groups_key(), cooldown));
    }

    #[test]
    fn test_garbage_value_treated_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("action:groups", "not-a-number");
        let clocks = ClockStore::new(Arc::clone(&store));

        assert_eq!(clocks.elapsed_since(&groups_key()), None);
        assert!(clocks.try_begin(&groups_key(), Duration::from_secs(60)));
    }

    #[test]
    fn test_read_records_are_independent_of_actions() {
        let clocks = ClockStore::new(MemoryStore::new());
        let thread = ThreadRef::group("g1");

        clocks.record_read("g1", 500);
        assert_eq!(clocks.last_read("g1"), Some(500));
        assert_eq!(clocks.elapsed_since(&TimerKey::thread(&thread)), None);
    }

    #[test]
    fn test_clear_thread_removes_action_and_read() {
        let store = Arc::new(MemoryStore::new());
        let clocks = ClockStore::new(Arc::clone(&store));
        let thread = ThreadRef::conversation("c1");

        clocks.record_action(&TimerKey::thread(&thread));
        clocks.record_read("c1", 42);
        clocks.record_action(&groups_key());

        clocks.clear_thread(&thread);

        assert_eq!(clocks.last_read("c1"), None);
        assert_eq!(clocks.elapsed_since(&TimerKey::thread(&thread)), None);
        assert!(clocks.elapsed_since(&groups_key()).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let store = Arc::new(MemoryStore::new());
        store.set("session:theme", "dark");
        let clocks = ClockStore::new(Arc::clone(&store));
        clocks.record_action(&groups_key());
        clocks.record_read("g1", 1);

        clocks.clear_all();

        assert_eq!(store.len(), 1);
    }
}

use std::collections::VecDeque;

use connections::common::{ListKind, SyncEvent, ThreadRef, TimerKey};

const MAX_NOTIFICATIONS: usize = 20;

/// What the shell is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    List(ListKind),
    Thread(ThreadRef),
}

impl View {
    pub fn key(&self) -> TimerKey {
        match self {
            View::List(kind) => TimerKey::List(*kind),
            View::Thread(thread) => TimerKey::thread(thread),
        }
    }
}

/// Local state of the shell.
pub struct AppState {
    pub view: View,
    /// Seconds until the refresh control of the current view is enabled.
    pub countdown: u64,
    pub notifications: VecDeque<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view: View::List(ListKind::Groups),
            countdown: 0,
            notifications: VecDeque::new(),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_enabled(&self) -> bool {
        self.countdown == 0
    }

    pub fn switch_to(&mut self, view: View) {
        self.view = view;
        self.countdown = 0;
    }

    pub fn push_notification(&mut self, text: String) {
        if self.notifications.len() == MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(text);
    }

    /// Turn a sync event into a user-facing line. Only failures are kept.
    pub fn apply_event(&mut self, event: &SyncEvent) -> Option<String> {
        match event {
            SyncEvent::FetchFailed { key, message } => {
                let text = format!("Error loading {key}: {message}");
                self.push_notification(text.clone());
                Some(text)
            }
            SyncEvent::ListUpdated { kind, count } => {
                log::debug!("{kind} updated with {count} entries");
                None
            }
            SyncEvent::ThreadUpdated { thread, added } => {
                log::debug!("{thread} received {added} message(s)");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_becomes_notification() {
        let mut state = AppState::new();
        let shown = state.apply_event(&SyncEvent::FetchFailed {
            key: TimerKey::List(ListKind::People),
            message: "offline".into(),
        });

        assert!(shown.unwrap().contains("offline"));
        assert_eq!(state.notifications.len(), 1);
    }

    #[test]
    fn test_updates_are_not_notifications() {
        let mut state = AppState::new();
        let shown = state.apply_event(&SyncEvent::ListUpdated {
            kind: ListKind::Groups,
            count: 3,
        });
        assert!(shown.is_none());
        assert!(state.notifications.is_empty());
    }

    #[test]
    fn test_notification_log_is_bounded() {
        let mut state = AppState::new();
        for i in 0..(MAX_NOTIFICATIONS + 5) {
            state.push_notification(format!("n{i}"));
        }
        assert_eq!(state.notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(state.notifications.front().unwrap(), "n5");
    }

    #[test]
    fn test_starts_on_groups_with_refresh_enabled() {
        let state = AppState::default();
        assert_eq!(state.view, View::List(ListKind::Groups));
        assert!(state.refresh_enabled());
        assert!(state.notifications.is_empty());
    }

    #[test]
    fn test_switching_view_resets_countdown() {
        let mut state = AppState::new();
        state.countdown = 12;
        assert!(!state.refresh_enabled());

        state.switch_to(View::Thread(ThreadRef::group("g1")));
        assert!(state.refresh_enabled());
        assert_eq!(state.view.key(), TimerKey::thread(&ThreadRef::group("g1")));
    }
}

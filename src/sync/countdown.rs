//! Per-key countdowns that disable a refresh action until they reach zero.
//!
//! Every countdown is advanced by a single driver task owned by the registry.
//! The driver sleeps until the earliest countdown is due, steps every due
//! countdown by one second and publishes the new value on that key's watch
//! channel. Observers hold a receiver on the channel, so they only ever see the
//! current value and whatever comes after it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::common::TimerKey;

pub const TICK: Duration = Duration::from_secs(1);

/// Remaining seconds, current value first.
pub type CountdownStream = WatchStream<u64>;

/// Identity of whoever started a countdown (usually one open view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running(u64),
    Expired,
}

struct Countdown {
    remaining: u64,
    due: Instant,
    owner: OwnerId,
}

struct Slot {
    tx: watch::Sender<u64>,
    running: Option<Countdown>,
    expired: bool,
}

impl Slot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            tx,
            running: None,
            expired: false,
        }
    }

    fn expire(&mut self) {
        self.running = None;
        self.expired = true;
        self.tx.send_replace(0);
    }

    /// Back to idle. Publishes 0 only if a countdown was actually running.
    fn discard(&mut self) {
        if self.running.take().is_some() {
            self.tx.send_replace(0);
        }
    }
}

#[derive(Default)]
struct Timers {
    slots: HashMap<TimerKey, Slot>,
}

impl Timers {
    fn slot(&mut self, key: &TimerKey) -> &mut Slot {
        self.slots.entry(key.clone()).or_insert_with(Slot::new)
    }

    fn next_due(&self) -> Option<Instant> {
        self.slots
            .values()
            .filter_map(|slot| slot.running.as_ref().map(|countdown| countdown.due))
            .min()
    }

    fn advance(&mut self, now: Instant) {
        for slot in self.slots.values_mut() {
            let Some(countdown) = slot.running.as_mut() else {
                continue;
            };
            while countdown.due <= now && countdown.remaining > 0 {
                countdown.remaining -= 1;
                countdown.due += TICK;
                slot.tx.send_replace(countdown.remaining);
            }
            if countdown.remaining == 0 {
                slot.running = None;
                slot.expired = true;
            }
        }
    }
}

async fn drive(timers: Arc<Mutex<Timers>>, wake: Arc<Notify>) {
    loop {
        let next_due = timers.lock().next_due();
        match next_due {
            Some(due) => {
                tokio::select! {
                    _ = time::sleep_until(due) => timers.lock().advance(Instant::now()),
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

/// Owned registry of live countdowns, at most one per key.
pub struct CountdownRegistry {
    timers: Arc<Mutex<Timers>>,
    wake: Arc<Notify>,
    driver: JoinHandle<()>,
}

impl CountdownRegistry {
    /// Spawns the shared driver task.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Arc<Self> {
        let timers = Arc::new(Mutex::new(Timers::default()));
        let wake = Arc::new(Notify::new());
        let driver = tokio::spawn(drive(Arc::clone(&timers), Arc::clone(&wake)));
        Arc::new(Self {
            timers,
            wake,
            driver,
        })
    }

    /// A fresh owner whose countdowns are cancelled when it is dropped.
    pub fn open_scope(self: &Arc<Self>) -> ViewScope {
        ViewScope {
            owner: OwnerId::new(),
            registry: Arc::downgrade(self),
        }
    }

    /// Replace any countdown for `key` with one starting at `seconds`.
    ///
    /// `seconds` is published immediately, then one lower value per second down
    /// to and including 0.
    pub fn start(&self, owner: OwnerId, key: &TimerKey, seconds: u64) {
        {
            let mut timers = self.timers.lock();
            let slot = timers.slot(key);
            if seconds == 0 {
                slot.expire();
                return;
            }
            slot.running = Some(Countdown {
                remaining: seconds,
                due: Instant::now() + TICK,
                owner,
            });
            slot.expired = false;
            slot.tx.send_replace(seconds);
        }
        self.wake.notify_one();
    }

    /// Continue a countdown of `duration_secs` that began `elapsed` ago.
    ///
    /// Returns the remaining seconds; 0 means the key went straight to expired.
    pub fn resume(
        &self,
        owner: OwnerId,
        key: &TimerKey,
        duration_secs: u64,
        elapsed: Duration,
    ) -> u64 {
        let remaining = duration_secs.saturating_sub(elapsed.as_secs());
        if remaining == 0 {
            self.timers.lock().slot(key).expire();
        } else {
            self.start(owner, key, remaining);
        }
        remaining
    }

    pub fn observe(&self, key: &TimerKey) -> CountdownStream {
        let rx = self.timers.lock().slot(key).tx.subscribe();
        WatchStream::new(rx)
    }

    /// Seconds left on the running countdown for `key`, 0 when idle or expired.
    pub fn remaining(&self, key: &TimerKey) -> u64 {
        match self.state(key) {
            TimerState::Running(remaining) => remaining,
            TimerState::Idle | TimerState::Expired => 0,
        }
    }

    pub fn state(&self, key: &TimerKey) -> TimerState {
        let timers = self.timers.lock();
        match timers.slots.get(key) {
            Some(Slot {
                running: Some(countdown),
                ..
            }) => TimerState::Running(countdown.remaining),
            Some(slot) if slot.expired => TimerState::Expired,
            _ => TimerState::Idle,
        }
    }

    /// Discard the countdown for `key`; observers see 0.
    pub fn cancel(&self, key: &TimerKey) {
        if let Some(slot) = self.timers.lock().slots.get_mut(key) {
            slot.discard();
        }
    }

    /// Discard every countdown started by `owner`. Returns how many were running.
    pub fn cancel_all(&self, owner: OwnerId) -> usize {
        let mut cancelled = 0;
        for slot in self.timers.lock().slots.values_mut() {
            if slot
                .running
                .as_ref()
                .is_some_and(|countdown| countdown.owner == owner)
            {
                slot.discard();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Discard every countdown regardless of owner.
    pub fn cancel_everything(&self) {
        for slot in self.timers.lock().slots.values_mut() {
            slot.discard();
        }
    }

    pub fn running_count(&self) -> usize {
        self.timers
            .lock()
            .slots
            .values()
            .filter(|slot| slot.running.is_some())
            .count()
    }
}

impl Drop for CountdownRegistry {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Owner handle for one view. Dropping it tears down that view's countdowns.
#[derive(Debug)]
pub struct ViewScope {
    owner: OwnerId,
    registry: Weak<CountdownRegistry>,
}

impl ViewScope {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let cancelled = registry.cancel_all(self.owner);
            if cancelled > 0 {
                log::debug!("View scope closed, cancelled {cancelled} countdown(s)");
            }
        }
    }
}

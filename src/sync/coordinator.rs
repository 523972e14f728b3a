//! Rate-limited refresh of lists and message threads.
//!
//! A refresh goes through the same steps for every key:
//!
//! 1. check-and-record the persisted action time under one lock, so a second
//!    request inside the cooldown (including one racing an in-flight fetch) is
//!    a silent no-op;
//! 2. fetch from the backend;
//! 3. merge into the list or thread cache;
//! 4. restart the countdown for the key, whether the fetch worked or not.
//!
//! A failed fetch keeps its cooldown record, leaves the caches as they were and
//! is reported both to the caller and on the event channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::common::{
    Conversation, Group, ListEntity, ListKind, Message, Person, SyncEvent, ThreadId, ThreadKind,
    ThreadRef, TimerKey,
};
use crate::config::AppConfig;
use crate::error::{ApiError, SyncError, SyncResult};
use crate::network::ApiClient;
use crate::storage::KeyValueStore;

use super::clock::{ClockStore, now_millis};
use super::countdown::{CountdownRegistry, CountdownStream, ViewScope};
use super::list_cache::ListCache;
use super::thread_cache::{MergeOutcome, ThreadCache};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub list_cooldown: Duration,
    /// Default for thread refreshes; call sites may pass their own.
    pub thread_cooldown: Duration,
    pub countdown_secs: u64,
    /// Recorded as the creator of groups made from this client.
    pub user_id: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            list_cooldown: Duration::from_secs(60),
            thread_cooldown: Duration::from_secs(60),
            countdown_secs: 60,
            user_id: String::new(),
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig, user_id: &str) -> Self {
        Self {
            list_cooldown: config.list_cooldown(),
            thread_cooldown: config.thread_cooldown(),
            countdown_secs: config.countdown_secs,
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { fetched: usize },
    /// The fetch succeeded but brought nothing new.
    Unchanged,
    /// Still inside the cooldown window; nothing was dispatched.
    CooldownActive,
}

pub struct SyncCoordinator<A, S> {
    api: A,
    clocks: ClockStore<S>,
    timers: Arc<CountdownRegistry>,
    settings: SyncSettings,
    events: mpsc::Sender<SyncEvent>,
    threads: Mutex<ThreadCache>,
    groups: Mutex<ListCache<Group>>,
    people: Mutex<ListCache<Person>>,
    conversations: Mutex<ListCache<Conversation>>,
    /// One message fetch per thread at a time, whoever asks for it.
    thread_fetches: Mutex<HashMap<ThreadId, Arc<AsyncMutex<()>>>>,
}

impl<A: ApiClient, S: KeyValueStore> SyncCoordinator<A, S> {
    pub fn new(
        api: A,
        store: S,
        timers: Arc<CountdownRegistry>,
        settings: SyncSettings,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            api,
            clocks: ClockStore::new(store),
            timers,
            settings,
            events,
            threads: Mutex::new(ThreadCache::new()),
            groups: Mutex::new(ListCache::new()),
            people: Mutex::new(ListCache::new()),
            conversations: Mutex::new(ListCache::new()),
            thread_fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn clocks(&self) -> &ClockStore<S> {
        &self.clocks
    }

    pub fn timers(&self) -> &Arc<CountdownRegistry> {
        &self.timers
    }

    // ========== Refresh ==========

    /// Refresh `key` with the configured cooldown for its kind.
    pub async fn refresh(&self, scope: &ViewScope, key: &TimerKey) -> SyncResult<RefreshOutcome> {
        self.refresh_with_cooldown(scope, key, self.cooldown_for(key))
            .await
    }

    pub async fn refresh_list(
        &self,
        scope: &ViewScope,
        kind: ListKind,
    ) -> SyncResult<RefreshOutcome> {
        self.refresh(scope, &TimerKey::List(kind)).await
    }

    pub async fn refresh_thread(
        &self,
        scope: &ViewScope,
        thread: &ThreadRef,
        cooldown: Duration,
    ) -> SyncResult<RefreshOutcome> {
        self.refresh_with_cooldown(scope, &TimerKey::thread(thread), cooldown)
            .await
    }

    async fn refresh_with_cooldown(
        &self,
        scope: &ViewScope,
        key: &TimerKey,
        cooldown: Duration,
    ) -> SyncResult<RefreshOutcome> {
        if !self.clocks.try_begin(key, cooldown) {
            log::debug!("Refresh of {key} ignored, cooldown active");
            return Ok(RefreshOutcome::CooldownActive);
        }

        log::info!("Refreshing {key}");
        let result = match key {
            TimerKey::List(kind) => self.fetch_list(*kind).await,
            TimerKey::Thread(thread) => self.fetch_thread(thread).await,
        };
        self.timers
            .start(scope.owner(), key, self.countdown_secs(cooldown));

        result.map_err(|source| self.fetch_failed(key, source))
    }

    async fn fetch_list(&self, kind: ListKind) -> Result<RefreshOutcome, ApiError> {
        let fetched = match kind {
            ListKind::Groups => {
                let groups = self.api.list_groups().await?;
                let count = groups.len();
                self.groups.lock().set(groups);
                count
            }
            ListKind::People => {
                let (people, conversations) =
                    futures::join!(self.api.list_people(), self.api.list_conversations());
                let people = people?;
                match conversations {
                    Ok(conversations) => self.conversations.lock().set(conversations),
                    Err(err) => log::warn!("Error getting conversations: {err}"),
                }
                let count = people.len();
                self.people.lock().set(people);
                self.resolve_authors();
                count
            }
        };

        self.notify(SyncEvent::ListUpdated {
            kind,
            count: fetched,
        });
        Ok(RefreshOutcome::Refreshed { fetched })
    }

    /// Full history when nothing is cached, otherwise only what is newer than
    /// the cached tail.
    ///
    /// Concurrent callers for the same thread wait for each other, so the
    /// second one asks from the tail the first one merged.
    async fn fetch_thread(&self, thread: &ThreadRef) -> Result<RefreshOutcome, ApiError> {
        let gate = self.thread_gate(&thread.id);
        let _in_flight = gate.lock().await;
        let since = self.threads.lock().high_watermark(&thread.id);
        let messages = self.api.read_messages(thread, since).await?;
        Ok(self.merge_messages(thread, since.is_some(), messages))
    }

    fn thread_gate(&self, thread_id: &str) -> Arc<AsyncMutex<()>> {
        let mut fetches = self.thread_fetches.lock();
        Arc::clone(fetches.entry(thread_id.to_string()).or_default())
    }

    fn cooldown_for(&self, key: &TimerKey) -> Duration {
        match key {
            TimerKey::List(_) => self.settings.list_cooldown,
            TimerKey::Thread(_) => self.settings.thread_cooldown,
        }
    }

    /// Countdown length for a refresh gated by `cooldown`; never shorter than
    /// the cooldown, so the control is not shown enabled while it is ignored.
    fn countdown_secs(&self, cooldown: Duration) -> u64 {
        let cooldown_secs = cooldown.as_secs() + u64::from(cooldown.subsec_nanos() > 0);
        self.settings.countdown_secs.max(cooldown_secs)
    }

    fn merge_messages(
        &self,
        thread: &ThreadRef,
        incremental: bool,
        messages: Vec<Message>,
    ) -> RefreshOutcome {
        let names = self.author_names();
        let outcome = {
            let mut threads = self.threads.lock();
            let outcome = if incremental {
                threads.append(&thread.id, messages)
            } else {
                threads.replace(&thread.id, messages)
            };
            threads.resolve_authors(&names);
            outcome
        };

        match outcome {
            MergeOutcome::Skipped => {
                log::debug!("No new messages in {thread}");
                RefreshOutcome::Unchanged
            }
            MergeOutcome::Replaced(added) | MergeOutcome::Appended(added) => {
                self.notify(SyncEvent::ThreadUpdated {
                    thread: thread.clone(),
                    added,
                });
                RefreshOutcome::Refreshed { fetched: added }
            }
        }
    }

    fn fetch_failed(&self, key: &TimerKey, source: ApiError) -> SyncError {
        log::error!("Error loading {key}: {source}");
        self.notify(SyncEvent::FetchFailed {
            key: key.clone(),
            message: source.to_string(),
        });
        SyncError::FetchFailed {
            key: key.clone(),
            source,
        }
    }

    fn notify(&self, event: SyncEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!("Sync event channel full, dropping {event:?}");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    // ========== Views ==========

    /// Rehydrate the countdown for `key` from the persisted action time.
    ///
    /// Returns the seconds left; 0 when the key was never refreshed or its
    /// window has passed.
    pub fn resume_countdown(&self, scope: &ViewScope, key: &TimerKey) -> u64 {
        let duration = self.countdown_secs(self.cooldown_for(key));
        match self.clocks.elapsed_since(key) {
            Some(elapsed) => self.timers.resume(scope.owner(), key, duration, elapsed),
            None => 0,
        }
    }

    /// Show a thread: resume its countdown, then load what is missing.
    ///
    /// The load is not rate limited and does not touch the refresh cooldown.
    pub async fn open_thread(
        &self,
        scope: &ViewScope,
        thread: &ThreadRef,
    ) -> SyncResult<Vec<Message>> {
        let key = TimerKey::thread(thread);
        self.resume_countdown(scope, &key);
        self.fetch_thread(thread)
            .await
            .map_err(|source| self.fetch_failed(&key, source))?;
        Ok(self.cached_messages(thread).unwrap_or_default())
    }

    /// Persist the newest cached message of `thread` as read.
    pub fn mark_read(&self, thread: &ThreadRef) -> Option<i64> {
        let tail = self.threads.lock().high_watermark(&thread.id)?;
        self.clocks.record_read(&thread.id, tail);
        Some(tail)
    }

    /// Cached messages newer than the persisted read position.
    pub fn unread_count(&self, thread: &ThreadRef) -> usize {
        let last_read = self.clocks.last_read(&thread.id);
        let threads = self.threads.lock();
        let Some(messages) = threads.get(&thread.id) else {
            return 0;
        };
        match last_read {
            Some(last_read) => messages
                .iter()
                .filter(|message| message.created_at > last_read)
                .count(),
            None => messages.len(),
        }
    }

    // ========== Commands ==========

    /// Post a message, then pull in whatever is new in the thread.
    pub async fn send_message(
        &self,
        thread: &ThreadRef,
        text: &str,
    ) -> SyncResult<RefreshOutcome> {
        self.api
            .append_message(thread, text)
            .await
            .map_err(|source| SyncError::CommandFailed {
                action: "send message",
                source,
            })?;
        self.fetch_thread(thread)
            .await
            .map_err(|source| self.fetch_failed(&TimerKey::thread(thread), source))
    }

    pub async fn create_group(&self, name: &str) -> SyncResult<Group> {
        let id = self
            .api
            .create_group(name)
            .await
            .map_err(|source| SyncError::CommandFailed {
                action: "create group",
                source,
            })?;
        let group = Group {
            id,
            name: name.to_string(),
            created_at: now_millis(),
            created_by: self.settings.user_id.clone(),
        };
        self.apply_created(ListEntity::Group(group.clone()));
        Ok(group)
    }

    pub async fn delete_group(&self, group_id: &str) -> SyncResult<()> {
        self.api
            .delete_group(group_id)
            .await
            .map_err(|source| SyncError::CommandFailed {
                action: "delete group",
                source,
            })?;
        self.apply_deleted(&ThreadRef::group(group_id));
        Ok(())
    }

    /// Existing conversation with `companion_id`, or a newly created one.
    pub async fn create_conversation(&self, companion_id: &str) -> SyncResult<Conversation> {
        if let Some(existing) = self.conversation_with(companion_id) {
            return Ok(existing);
        }
        let id = self
            .api
            .create_conversation(companion_id)
            .await
            .map_err(|source| SyncError::CommandFailed {
                action: "create conversation",
                source,
            })?;
        let conversation = Conversation {
            id,
            companion_id: companion_id.to_string(),
        };
        self.apply_created(ListEntity::Conversation(conversation.clone()));
        Ok(conversation)
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> SyncResult<()> {
        self.api
            .delete_conversation(conversation_id)
            .await
            .map_err(|source| SyncError::CommandFailed {
                action: "delete conversation",
                source,
            })?;
        self.apply_deleted(&ThreadRef::conversation(conversation_id));
        Ok(())
    }

    /// Show a locally created entity without refetching its list.
    pub fn apply_created(&self, entity: ListEntity) {
        match entity {
            ListEntity::Group(group) => self.groups.lock().add(group),
            ListEntity::Conversation(conversation) => {
                self.conversations.lock().add(conversation)
            }
        }
    }

    /// Forget a deleted thread: list entry, cached messages, clocks, countdown.
    pub fn apply_deleted(&self, thread: &ThreadRef) -> usize {
        let removed = match thread.kind {
            ThreadKind::Group => self.groups.lock().remove(|group| group.id == thread.id),
            ThreadKind::Conversation => self
                .conversations
                .lock()
                .remove(|conversation| conversation.id == thread.id),
        };
        self.threads.lock().evict(&thread.id);
        self.thread_fetches.lock().remove(&thread.id);
        self.clocks.clear_thread(thread);
        self.timers.cancel(&TimerKey::thread(thread));
        removed
    }

    /// Logout: drop every cache, persisted clock and running countdown.
    pub fn end_session(&self) {
        self.groups.lock().clear();
        self.people.lock().clear();
        self.conversations.lock().clear();
        self.threads.lock().clear();
        self.thread_fetches.lock().clear();
        self.clocks.clear_all();
        self.timers.cancel_everything();
        log::info!("Session state cleared");
    }

    // ========== Read access ==========

    pub fn observe_countdown(&self, key: &TimerKey) -> CountdownStream {
        self.timers.observe(key)
    }

    pub fn cached_messages(&self, thread: &ThreadRef) -> Option<Vec<Message>> {
        self.threads.lock().get(&thread.id).map(<[Message]>::to_vec)
    }

    pub fn cached_groups(&self) -> Vec<Group> {
        self.groups.lock().get().to_vec()
    }

    pub fn cached_people(&self) -> Vec<Person> {
        self.people.lock().get().to_vec()
    }

    pub fn cached_conversations(&self) -> Vec<Conversation> {
        self.conversations.lock().get().to_vec()
    }

    pub fn is_loaded(&self, kind: ListKind) -> bool {
        match kind {
            ListKind::Groups => self.groups.lock().is_loaded(),
            ListKind::People => self.people.lock().is_loaded(),
        }
    }

    /// `false` until a conversations fetch has succeeded, even when people
    /// are loaded.
    pub fn conversations_loaded(&self) -> bool {
        self.conversations.lock().is_loaded()
    }

    pub fn conversation_with(&self, companion_id: &str) -> Option<Conversation> {
        self.conversations
            .lock()
            .find(|conversation| conversation.companion_id == companion_id)
            .cloned()
    }

    fn author_names(&self) -> HashMap<String, String> {
        self.people
            .lock()
            .get()
            .iter()
            .map(|person| (person.uid.clone(), person.name.clone()))
            .collect()
    }

    fn resolve_authors(&self) {
        let names = self.author_names();
        self.threads.lock().resolve_authors(&names);
    }
}

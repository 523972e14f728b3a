use std::fmt;

use serde::{Deserialize, Serialize};

/// Display name used when a message author is missing from the people list.
pub const UNKNOWN_AUTHOR: &str = "User not found";

/// Opaque id of a group or a personal conversation.
pub type ThreadId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadKind {
    Group,
    Conversation,
}

/// A thread id together with the namespace it lives in.
///
/// Group ids and conversation ids look the same on the wire, so every place
/// that needs to talk to the backend carries the kind alongside the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadRef {
    pub kind: ThreadKind,
    pub id: ThreadId,
}

impl ThreadRef {
    pub fn group(id: impl Into<ThreadId>) -> Self {
        Self {
            kind: ThreadKind::Group,
            id: id.into(),
        }
    }

    pub fn conversation(id: impl Into<ThreadId>) -> Self {
        Self {
            kind: ThreadKind::Conversation,
            id: id.into(),
        }
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ThreadKind::Group => write!(f, "group {}", self.id),
            ThreadKind::Conversation => write!(f, "conversation {}", self.id),
        }
    }
}

/// Whole-collection resources that are refreshed as a unit.
///
/// Conversations ride along with the people refresh, so they share its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Groups,
    People,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Groups => f.write_str("groups"),
            ListKind::People => f.write_str("people"),
        }
    }
}

/// Identifies one refresh gate: a list refresh or a per-thread message refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    List(ListKind),
    Thread(ThreadRef),
}

impl TimerKey {
    pub fn thread(thread: &ThreadRef) -> Self {
        TimerKey::Thread(thread.clone())
    }

    /// Key under which the last dispatched refresh is persisted.
    pub fn storage_key(&self) -> String {
        match self {
            TimerKey::List(ListKind::Groups) => "action:groups".to_string(),
            TimerKey::List(ListKind::People) => "action:people".to_string(),
            TimerKey::Thread(ThreadRef {
                kind: ThreadKind::Group,
                id,
            }) => format!("action:group-messages:{id}"),
            TimerKey::Thread(ThreadRef {
                kind: ThreadKind::Conversation,
                id,
            }) => format!("action:conversation-messages:{id}"),
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKey::List(kind) => write!(f, "{kind} list"),
            TimerKey::Thread(thread) => write!(f, "{thread} messages"),
        }
    }
}

/// One message of a group or conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author_id: String,
    pub text: String,
    /// Milliseconds since the epoch; the only ordering key.
    pub created_at: i64,
    /// Filled from the people list after the message is cached.
    pub author_name: String,
}

impl Message {
    pub fn new(author_id: impl Into<String>, text: impl Into<String>, created_at: i64) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            created_at,
            author_name: UNKNOWN_AUTHOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: ThreadId,
    pub name: String,
    pub created_at: i64,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub uid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ThreadId,
    pub companion_id: String,
}

/// An entity created locally that should appear in a list cache right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntity {
    Group(Group),
    Conversation(Conversation),
}

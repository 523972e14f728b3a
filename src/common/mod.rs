pub mod events;
pub mod types;

pub use events::SyncEvent;
pub use types::{
    Conversation, Group, ListEntity, ListKind, Message, Person, ThreadId, ThreadKind, ThreadRef,
    TimerKey, UNKNOWN_AUTHOR,
};

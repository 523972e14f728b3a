pub mod clock;
pub mod coordinator;
pub mod countdown;
pub mod list_cache;
pub mod thread_cache;

pub use clock::ClockStore;
pub use coordinator::{RefreshOutcome, SyncCoordinator, SyncSettings};
pub use countdown::{CountdownRegistry, CountdownStream, OwnerId, TimerState, ViewScope};
pub use list_cache::ListCache;
pub use thread_cache::{MergeOutcome, ThreadCache};

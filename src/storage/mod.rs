pub mod kv;
pub mod sqlite_store;

pub use kv::{KeyValueStore, MemoryStore};
pub use sqlite_store::SqliteStore;

use std::fs;
use std::path::Path;

/// Ensure the directory holding a database file exists
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

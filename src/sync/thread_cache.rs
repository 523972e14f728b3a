use std::collections::HashMap;

use crate::common::{Message, ThreadId, UNKNOWN_AUTHOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Replaced(usize),
    Appended(usize),
    /// Nothing new arrived; the entry was not touched.
    Skipped,
}

/// Messages per thread, each list kept in ascending `created_at` order.
#[derive(Debug, Default)]
pub struct ThreadCache {
    entries: HashMap<ThreadId, Vec<Message>>,
}

impl ThreadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> Option<&[Message]> {
        self.entries.get(thread_id).map(Vec::as_slice)
    }

    pub fn replace(&mut self, thread_id: &str, mut messages: Vec<Message>) -> MergeOutcome {
        messages.sort_by_key(|message| message.created_at);
        let count = messages.len();
        self.entries.insert(thread_id.to_string(), messages);
        MergeOutcome::Replaced(count)
    }

    /// Merge freshly fetched messages after the cached tail.
    pub fn append(&mut self, thread_id: &str, mut new_messages: Vec<Message>) -> MergeOutcome {
        if new_messages.is_empty() {
            return MergeOutcome::Skipped;
        }
        new_messages.sort_by_key(|message| message.created_at);
        let added = new_messages.len();

        let entry = self.entries.entry(thread_id.to_string()).or_default();
        let after_tail = match (entry.last(), new_messages.first()) {
            (Some(tail), Some(head)) => head.created_at >= tail.created_at,
            _ => true,
        };
        if after_tail {
            entry.extend(new_messages);
        } else {
            // The backend handed back something older than our tail.
            let existing = std::mem::take(entry);
            *entry = merge_sorted(existing, new_messages);
        }
        MergeOutcome::Appended(added)
    }

    /// Highest `created_at` held for the thread; the `since` of the next fetch.
    pub fn high_watermark(&self, thread_id: &str) -> Option<i64> {
        self.entries
            .get(thread_id)?
            .iter()
            .map(|message| message.created_at)
            .max()
    }

    pub fn evict(&mut self, thread_id: &str) -> Option<Vec<Message>> {
        self.entries.remove(thread_id)
    }

    /// Fill `author_name` on every cached message from an id → name table.
    pub fn resolve_authors(&mut self, names: &HashMap<String, String>) {
        for message in self.entries.values_mut().flatten() {
            message.author_name = names
                .get(&message.author_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Stable merge of two sorted lists; on equal timestamps `existing` goes first.
fn merge_sorted(existing: Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut incoming = incoming.into_iter().peekable();
    for message in existing {
        while let Some(next) = incoming.next_if(|next| next.created_at < message.created_at) {
            merged.push(next);
        }
        merged.push(message);
    }
    merged.extend(incoming);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str, created_at: i64) -> Message {
        Message::new("u1", text, created_at)
    }

    fn timestamps(cache: &ThreadCache, thread_id: &str) -> Vec<i64> {
        cache
            .get(thread_id)
            .unwrap()
            .iter()
            .map(|message| message.created_at)
            .collect()
    }

    #[test]
    fn test_replace_sorts_and_overwrites() {
        let mut cache = ThreadCache::new();
        cache.replace("g1", vec![msg("b", 100), msg("a", 50)]);
        assert_eq!(timestamps(&cache, "g1"), vec![50, 100]);

        let outcome = cache.replace("g1", vec![msg("c", 7)]);
        assert_eq!(outcome, MergeOutcome::Replaced(1));
        assert_eq!(timestamps(&cache, "g1"), vec![7]);
    }

    #[test]
    fn test_append_empty_leaves_entry_untouched() {
        let mut cache = ThreadCache::new();
        cache.replace("g1", vec![msg("a", 10), msg("b", 20)]);
        let before = cache.get("g1").unwrap().to_vec();

        assert_eq!(cache.append("g1", Vec::new()), MergeOutcome::Skipped);
        assert_eq!(cache.get("g1").unwrap(), before.as_slice());
        assert_eq!(cache.high_watermark("g1"), Some(20));
    }

    #[test]
    fn test_append_empty_to_unknown_thread_creates_nothing() {
        let mut cache = ThreadCache::new();
        cache.append("g1", Vec::new());
        assert!(cache.get("g1").is_none());
    }

    #[test]
    fn test_append_sorts_new_batch_after_tail() {
        let mut cache = ThreadCache::new();
        cache.replace("g1", vec![msg("a", 10), msg("b", 20)]);

        let outcome = cache.append("g1", vec![msg("d", 40), msg("c", 30)]);

        assert_eq!(outcome, MergeOutcome::Appended(2));
        assert_eq!(timestamps(&cache, "g1"), vec![10, 20, 30, 40]);
        assert_eq!(cache.high_watermark("g1"), Some(40));
    }

    #[test]
    fn test_append_with_older_messages_loses_nothing() {
        let mut cache = ThreadCache::new();
        cache.replace("g1", vec![msg("a", 10), msg("b", 30)]);

        cache.append("g1", vec![msg("late", 20), msg("new", 40), msg("tie", 30)]);

        let texts: Vec<&str> = cache
            .get("g1")
            .unwrap()
            .iter()
            .map(|message| message.text.as_str())
            .collect();
        assert_eq!(texts, vec!["a", "late", "b", "tie", "new"]);
    }

    #[test]
    fn test_append_to_missing_entry_creates_it() {
        let mut cache = ThreadCache::new();
        cache.append("c1", vec![msg("x", 5)]);
        assert_eq!(timestamps(&cache, "c1"), vec![5]);
    }

    #[test]
    fn test_evict_and_watermark() {
        let mut cache = ThreadCache::new();
        assert_eq!(cache.high_watermark("g1"), None);

        cache.replace("g1", vec![msg("a", 10)]);
        assert!(cache.evict("g1").is_some());
        assert!(cache.get("g1").is_none());
    }

    #[test]
    fn test_resolve_authors_with_fallback() {
        let mut cache = ThreadCache::new();
        let mut known = Message::new("u1", "hi", 1);
        known.author_name = "stale".to_string();
        cache.replace("g1", vec![known, Message::new("ghost", "boo", 2)]);

        let names = HashMap::from([("u1".to_string(), "Alice".to_string())]);
        cache.resolve_authors(&names);

        let messages = cache.get("g1").unwrap();
        assert_eq!(messages[0].author_name, "Alice");
        assert_eq!(messages[1].author_name, UNKNOWN_AUTHOR);
    }
}

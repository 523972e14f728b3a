/// Lazily filled copy of a whole collection (groups, people, conversations).
///
/// "Loaded and empty" and "never loaded" are different states: `set(vec![])`
/// marks the cache loaded so views don't keep refetching an empty list.
#[derive(Debug)]
pub struct ListCache<T> {
    items: Vec<T>,
    loaded: bool,
}

impl<T> Default for ListCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loaded: false,
        }
    }
}

impl<T> ListCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self) -> &[T] {
        &self.items
    }

    pub fn set(&mut self, items: Vec<T>) {
        self.items = items;
        self.loaded = true;
    }

    /// Optimistic insert after a local create. Does not mark the list loaded.
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// Optimistic removal after a local delete. Returns the number removed.
    pub fn remove<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().find(|item| predicate(item))
    }

    /// Session teardown: forget items and the loaded flag.
    pub fn clear(&mut self) {
        self.items.clear();
        self.loaded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_is_loaded() {
        let mut cache: ListCache<u32> = ListCache::new();
        assert!(!cache.is_loaded());
        assert!(cache.get().is_empty());

        cache.set(Vec::new());
        assert!(cache.is_loaded());
        assert!(cache.get().is_empty());
    }

    #[test]
    fn test_add_does_not_mark_loaded() {
        let mut cache = ListCache::new();
        cache.add("g1");
        assert!(!cache.is_loaded());
        assert_eq!(cache.get(), &["g1"]);

        cache.set(vec!["g2"]);
        cache.add("g3");
        assert_eq!(cache.get(), &["g2", "g3"]);
    }

    #[test]
    fn test_remove_by_predicate() {
        let mut cache = ListCache::new();
        cache.set(vec![1, 2, 3, 4]);

        assert_eq!(cache.remove(|n| n % 2 == 0), 2);
        assert_eq!(cache.get(), &[1, 3]);
        assert_eq!(cache.remove(|n| *n == 9), 0);
        assert!(cache.is_loaded());
    }

    #[test]
    fn test_clear_resets_loaded() {
        let mut cache = ListCache::new();
        cache.set(vec![1]);
        cache.clear();
        assert!(!cache.is_loaded());
        assert!(cache.get().is_empty());
    }
}

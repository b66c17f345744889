//! Bounded message history for BashTalk.
//!
//! [`MessageCache`] keeps the most recent chat lines so that a user who
//! joins late can catch up. It is a strict FIFO: once full, every append
//! evicts the oldest line.
//!
//! Like the registry, the cache is not thread-safe by itself. The server
//! owns one instance behind a mutex and holds that lock across
//! append + broadcast, so the cache order always matches what users saw.

use std::collections::VecDeque;

/// Default number of lines retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// An ordered, capacity-bounded log of recent chat lines.
#[derive(Debug, Clone)]
pub struct MessageCache {
    lines: VecDeque<String>,
    capacity: usize,
}

impl MessageCache {
    /// Creates an empty cache holding at most `capacity` lines.
    ///
    /// A capacity of zero is allowed and retains nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            // Cap the preallocation; a huge configured capacity shouldn't
            // reserve memory the chat may never use.
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Appends a line at the end, evicting from the front if needed.
    ///
    /// Eviction happens before insertion, so the length never exceeds
    /// the capacity, not even transiently. Returns the evicted line.
    pub fn append(&mut self, line: impl Into<String>) -> Option<String> {
        let line = line.into();
        if self.capacity == 0 {
            return Some(line);
        }

        let evicted = if self.lines.len() >= self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(line);

        if evicted.is_some() {
            tracing::trace!(capacity = self.capacity, "evicted oldest cached line");
        }
        evicted
    }

    /// Returns a snapshot of every line, oldest first.
    pub fn all(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Iterates the lines oldest first without copying.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        let dropped = self.lines.len();
        self.lines.clear();
        tracing::debug!(dropped, "message cache cleared");
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if no lines are held.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_below_capacity_keeps_order() {
        let mut cache = MessageCache::new(3);
        assert!(cache.append("a").is_none());
        assert!(cache.append("b").is_none());
        assert_eq!(cache.all(), vec!["a", "b"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_append_at_capacity_evicts_oldest() {
        let mut cache = MessageCache::new(2);
        cache.append("first");
        cache.append("second");

        let evicted = cache.append("third");

        assert_eq!(evicted.as_deref(), Some("first"));
        assert_eq!(cache.all(), vec!["second", "third"]);
    }

    #[test]
    fn test_append_many_never_exceeds_capacity() {
        let mut cache = MessageCache::new(5);
        for i in 0..50 {
            let evicted = cache.append(format!("msg {i}"));
            assert!(cache.len() <= cache.capacity());
            // Once full, the evicted line is always the oldest survivor.
            if i >= 5 {
                assert_eq!(evicted, Some(format!("msg {}", i - 5)));
            }
        }
        let expected: Vec<String> = (45..50).map(|i| format!("msg {i}")).collect();
        assert_eq!(cache.all(), expected);
    }

    #[test]
    fn test_append_zero_capacity_retains_nothing() {
        let mut cache = MessageCache::new(0);
        assert_eq!(cache.append("gone").as_deref(), Some("gone"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache = MessageCache::default();
        cache.append("a");
        cache.append("b");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_iter_matches_all() {
        let mut cache = MessageCache::new(4);
        cache.append("x");
        cache.append("y");
        let via_iter: Vec<&str> = cache.iter().collect();
        assert_eq!(via_iter, vec!["x", "y"]);
    }
}

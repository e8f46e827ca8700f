//! Fixed-capacity, time-expiring LRU store.
//!
//! # Responsibilities
//! - Map string keys to values with strict recency ordering
//! - Expire entries lazily on read (TTL measured from last write)
//! - Evict the least recently used entry when capacity is exceeded
//! - Count hits and misses
//!
//! # Design Decisions
//! - Entries live in a slot arena addressed by index + generation; the
//!   recency list links slots by index instead of by reference
//! - Freed slots are recycled through a free list and their generation
//!   bumped, so a stale handle can never resolve to a newer entry
//! - Time is passed in by the caller; the store never reads a clock

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle to an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotKey {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Entry<V> {
    key: Arc<str>,
    value: V,
    stamp: Instant,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<V> {
    generation: u32,
    entry: Option<Entry<V>>,
}

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// LRU store with lazy TTL expiration.
///
/// `head` is the most recently used entry, `tail` the least.
#[derive(Debug)]
pub struct LruCache<V> {
    map: HashMap<Arc<str>, SlotKey>,
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<V> LruCache<V> {
    /// Create an empty store. A zero capacity is raised to one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
            ttl,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `key`, promoting it on a hit.
    ///
    /// An entry older than the TTL is evicted and counted as a miss.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<&V> {
        let Some(slot) = self.map.get(key).copied() else {
            self.misses += 1;
            return None;
        };

        if self.is_expired(slot.index, now) {
            self.remove_slot(slot.index);
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        if self.head != Some(slot.index) {
            self.unlink(slot.index);
            self.push_front(slot.index);
        }
        self.entry(slot.index).map(|e| &e.value)
    }

    /// Insert or overwrite `key`, making it the most recently used entry.
    pub fn set(&mut self, key: &str, value: V, now: Instant) {
        if let Some(slot) = self.map.get(key).copied() {
            if let Some(entry) = self.entry_mut(slot.index) {
                entry.value = value;
                entry.stamp = now;
            }
            if self.head != Some(slot.index) {
                self.unlink(slot.index);
                self.push_front(slot.index);
            }
            return;
        }

        let key: Arc<str> = Arc::from(key);
        let entry = Entry {
            key: key.clone(),
            value,
            stamp: now,
            prev: None,
            next: None,
        };
        let slot = self.allocate(entry);
        self.map.insert(key, slot);
        self.push_front(slot.index);

        if self.map.len() > self.capacity {
            if let Some(tail) = self.tail {
                if let Some(evicted) = self.remove_slot(tail) {
                    tracing::trace!(key = %evicted, "Evicted least recently used entry");
                }
            }
        }
    }

    /// Remove `key` without touching the counters.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let slot = self.map.get(key).copied()?;
        self.unlink(slot.index);
        self.map.remove(key);
        self.release(slot.index).map(|e| e.value)
    }

    /// Remove every entry whose key satisfies `predicate`. Returns how many went.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let doomed: Vec<usize> = self
            .map
            .iter()
            .filter_map(|(key, slot)| predicate(&**key).then_some(slot.index))
            .collect();
        for index in &doomed {
            self.remove_slot(*index);
        }
        doomed.len()
    }

    /// Evict expired entries, inspecting at most `budget` entries from the tail.
    pub fn purge_expired(&mut self, now: Instant, budget: usize) -> usize {
        let mut cursor = self.tail;
        let mut purged = 0;
        for _ in 0..budget {
            let Some(index) = cursor else { break };
            cursor = self.entry(index).and_then(|e| e.prev);
            if self.is_expired(index, now) {
                self.remove_slot(index);
                purged += 1;
            }
        }
        purged
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.map.len(),
            capacity: self.capacity,
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let Some(entry) = self.entry(index) else { break };
            keys.push(entry.key.to_string());
            cursor = entry.next;
        }
        keys
    }

    fn is_expired(&self, index: usize, now: Instant) -> bool {
        self.entry(index)
            .map(|e| now.saturating_duration_since(e.stamp) > self.ttl)
            .unwrap_or(false)
    }

    fn entry(&self, index: usize) -> Option<&Entry<V>> {
        self.slots.get(index).and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<V>> {
        self.slots.get_mut(index).and_then(|s| s.entry.as_mut())
    }

    fn allocate(&mut self, entry: Entry<V>) -> SlotKey {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some(entry);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                SlotKey {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn release(&mut self, index: usize) -> Option<Entry<V>> {
        let slot = self.slots.get_mut(index)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(entry)
    }

    /// Unlink, unmap and free a slot. Returns the evicted key.
    fn remove_slot(&mut self, index: usize) -> Option<Arc<str>> {
        self.unlink(index);
        let entry = self.release(index)?;
        let removed = self.map.remove(&entry.key);
        debug_assert!(
            removed.map(|s| s.index == index).unwrap_or(false),
            "map and recency list disagree"
        );
        Some(entry.key)
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match self.entry_mut(index) {
            Some(entry) => {
                let links = (entry.prev, entry.next);
                entry.prev = None;
                entry.next = None;
                links
            }
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(e) = self.entry_mut(p) {
                    e.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(e) = self.entry_mut(n) {
                    e.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(entry) = self.entry_mut(index) {
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(e) = self.entry_mut(h) {
                e.prev = Some(index);
            }
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let mut forward = 0;
        let mut cursor = self.head;
        let mut prev = None;
        while let Some(index) = cursor {
            let entry = self.entry(index).expect("list points at free slot");
            assert_eq!(entry.prev, prev, "broken back link at {}", index);
            let slot = self.map.get(&entry.key).expect("list entry missing from map");
            assert_eq!(slot.index, index);
            assert_eq!(slot.generation, self.slots[index].generation);
            prev = Some(index);
            cursor = entry.next;
            forward += 1;
        }
        assert_eq!(self.tail, prev);
        assert_eq!(forward, self.map.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> (LruCache<u32>, Instant) {
        (LruCache::new(capacity, Duration::from_secs(10)), Instant::now())
    }

    #[test]
    fn test_get_set_promotes() {
        let (mut lru, now) = cache(3);
        lru.set("a", 1, now);
        lru.set("b", 2, now);
        lru.set("c", 3, now);
        assert_eq!(lru.keys(), vec!["c", "b", "a"]);

        assert_eq!(lru.get("a", now), Some(&1));
        assert_eq!(lru.keys(), vec!["a", "c", "b"]);
        lru.assert_consistent();
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (mut lru, now) = cache(2);
        lru.set("a", 1, now);
        lru.set("b", 2, now);
        lru.get("a", now);
        lru.set("c", 3, now);

        assert_eq!(lru.len(), 2);
        assert!(lru.get("b", now).is_none());
        assert_eq!(lru.get("a", now), Some(&1));
        assert_eq!(lru.get("c", now), Some(&3));
        lru.assert_consistent();
    }

    #[test]
    fn test_overwrite_refreshes_and_promotes() {
        let (mut lru, now) = cache(2);
        lru.set("a", 1, now);
        lru.set("b", 2, now);
        lru.set("a", 10, now);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.keys(), vec!["a", "b"]);

        lru.set("c", 3, now);
        assert!(lru.get("b", now).is_none());
        assert_eq!(lru.get("a", now), Some(&10));
        lru.assert_consistent();
    }

    #[test]
    fn test_expired_entry_is_evicted_and_counted_as_miss() {
        let (mut lru, now) = cache(4);
        lru.set("a", 1, now);

        let later = now + Duration::from_secs(11);
        assert!(lru.get("a", later).is_none());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.stats().misses, 1);
        assert_eq!(lru.stats().hits, 0);

        lru.set("a", 2, later);
        assert_eq!(lru.get("a", later), Some(&2));
        lru.assert_consistent();
    }

    #[test]
    fn test_entry_at_exact_ttl_is_still_fresh() {
        let (mut lru, now) = cache(4);
        lru.set("a", 1, now);
        assert_eq!(lru.get("a", now + Duration::from_secs(10)), Some(&1));
    }

    #[test]
    fn test_counters_sum_to_gets() {
        let (mut lru, now) = cache(3);
        let mut gets = 0;
        for round in 0..50u32 {
            let key = format!("k{}", round % 5);
            let at = now + Duration::from_secs((round / 7) as u64 * 4);
            if round % 3 == 0 {
                lru.set(&key, round, at);
            }
            lru.get(&key, at);
            gets += 1;
            lru.get("never", at);
            gets += 1;
        }
        let stats = lru.stats();
        assert_eq!(stats.hits + stats.misses, gets);
        lru.assert_consistent();

        lru.reset_stats();
        assert_eq!(lru.stats().hits + lru.stats().misses, 0);
    }

    #[test]
    fn test_slots_are_recycled() {
        let (mut lru, now) = cache(2);
        for i in 0..100u32 {
            lru.set(&format!("k{}", i), i, now);
        }
        assert!(lru.slots.len() <= 3);
        lru.assert_consistent();
    }

    #[test]
    fn test_remove_where_and_purge() {
        let (mut lru, now) = cache(8);
        lru.set("GET:/a?", 1, now);
        lru.set("GET:/a?x=1", 2, now);
        lru.set("GET:/b?", 3, now);
        assert_eq!(lru.remove_where(|k| k.starts_with("GET:/a?")), 2);
        assert_eq!(lru.keys(), vec!["GET:/b?"]);

        lru.set("fresh", 4, now + Duration::from_secs(15));
        assert_eq!(lru.purge_expired(now + Duration::from_secs(20), 10), 1);
        assert_eq!(lru.keys(), vec!["fresh"]);
        lru.assert_consistent();
    }

    #[test]
    fn test_remove_returns_value() {
        let (mut lru, now) = cache(2);
        lru.set("a", 1, now);
        assert_eq!(lru.remove("a"), Some(1));
        assert_eq!(lru.remove("a"), None);
        assert!(lru.is_empty());
        lru.assert_consistent();
    }
}

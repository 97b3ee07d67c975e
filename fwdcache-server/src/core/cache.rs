use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Bounded recency cache shared by all request handlers.
///
/// A single mutex guards the index, the recency order and the counters
/// together, so no caller can observe them out of sync. Cloning is cheap and
/// yields a handle to the same cache.
pub struct RecencyCache<K, V> {
    inner: Arc<Mutex<LruCore<K, V>>>,
}

impl<K, V> Clone for RecencyCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Sentinel for "no neighbour" in the slot arena
const NIL: usize = usize::MAX;

/// Cache entry, owned by the order list
struct CacheEntry<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// LRU bookkeeping: slot arena + key index.
///
/// `slots` holds a doubly-linked list threaded through indices, most recent at
/// `head`. Vacated slots are recycled through `free`, so every operation is
/// O(1) apart from hashing the key.
struct LruCore<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<CacheEntry<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: usize,
    stats: CacheStats,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl<K, V> LruCore<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        }
    }

    fn entry(&self, slot: usize) -> &CacheEntry<K, V> {
        self.slots[slot]
            .as_ref()
            .expect("linked slot must be occupied")
    }

    fn entry_mut(&mut self, slot: usize) -> &mut CacheEntry<K, V> {
        self.slots[slot]
            .as_mut()
            .expect("linked slot must be occupied")
    }

    /// Remove `slot` from the order list without freeing it
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let entry = self.entry(slot);
            (entry.prev, entry.next)
        };

        if prev == NIL {
            self.head = next;
        } else {
            self.entry_mut(prev).next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.entry_mut(next).prev = prev;
        }
    }

    /// Link an unlinked `slot` in at the head
    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let entry = self.entry_mut(slot);
            entry.prev = NIL;
            entry.next = old_head;
        }

        if old_head == NIL {
            self.tail = slot;
        } else {
            self.entry_mut(old_head).prev = slot;
        }
        self.head = slot;
    }

    fn promote(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key).copied() {
            Some(slot) => {
                self.promote(slot);
                self.stats.hits += 1;
                Some(&self.entry(slot).value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or update; returns the evicted key, if any
    fn put(&mut self, key: K, value: V) -> Option<K> {
        if let Some(&slot) = self.index.get(&key) {
            self.entry_mut(slot).value = value;
            self.promote(slot);
            self.stats.updates += 1;
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.evict_tail()
        } else {
            None
        };

        let entry = CacheEntry {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        self.push_front(slot);
        self.index.insert(key, slot);
        self.stats.inserts += 1;
        self.stats.entries = self.index.len();

        evicted
    }

    fn evict_tail(&mut self) -> Option<K> {
        let slot = self.tail;
        if slot == NIL {
            return None;
        }

        self.unlink(slot);
        let entry = self.slots[slot].take()?;
        self.free.push(slot);
        self.index.remove(&entry.key);
        self.stats.evictions += 1;
        self.stats.entries = self.index.len();

        Some(entry.key)
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.stats.entries = 0;
    }

    fn keys_by_recency(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while cursor != NIL {
            let entry = self.entry(cursor);
            keys.push(entry.key.clone());
            cursor = entry.next;
        }
        keys
    }

    /// Walk the order list and compare it with the index
    #[cfg(test)]
    fn check_consistency(&self) {
        let mut forward = 0;
        let mut cursor = self.head;
        let mut last = NIL;
        while cursor != NIL {
            let entry = self.entry(cursor);
            assert_eq!(entry.prev, last, "broken back link at slot {}", cursor);
            assert_eq!(self.index.get(&entry.key), Some(&cursor));
            last = cursor;
            cursor = entry.next;
            forward += 1;
        }
        assert_eq!(self.tail, last);
        assert_eq!(forward, self.index.len());
        assert!(self.index.len() <= self.capacity);
    }
}

impl<K, V> RecencyCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a new cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one; the cache always keeps the most
    /// recent insertion.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCore::new(capacity.max(1)))),
        }
    }

    /// Look up `key`, marking it most recently used on a hit
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + std::fmt::Debug + ?Sized,
    {
        let mut core = self.inner.lock();
        let value = core.get(key).cloned();

        if value.is_some() {
            debug!(?key, "cache HIT");
        } else {
            debug!(?key, "cache MISS");
        }

        value
    }

    /// Insert or replace `key`, evicting the least recently used entry when a
    /// new key would exceed capacity
    pub fn put(&self, key: K, value: V) {
        let mut core = self.inner.lock();
        if let Some(evicted) = core.put(key, value) {
            debug!(key = ?evicted, "cache EVICT");
        }
    }

    /// Check presence without touching recency or counters
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Keys from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.inner.lock().keys_by_recency()
    }

    /// Drop every entry; counters other than `entries` are kept
    pub fn clear(&self) {
        let mut core = self.inner.lock();
        let count = core.index.len();
        core.clear();
        debug!("cache CLEAR ({} entries)", count);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        self.inner.lock().check_consistency();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cache(capacity: usize) -> RecencyCache<String, u32> {
        RecencyCache::new(capacity)
    }

    #[test]
    fn test_eviction_order() {
        let cache = cache(2);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
        cache.assert_consistent();
    }

    #[test]
    fn test_recency_promotion() {
        let cache = cache(2);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("b"), None, "b should be evicted, not a");
        assert_eq!(cache.get("a"), Some(1));
        cache.assert_consistent();
    }

    #[test]
    fn test_update_in_place() {
        let cache = cache(2);

        cache.put("a".to_string(), 1);
        cache.put("a".to_string(), 2);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));

        let stats = cache.stats();
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_update_promotes_key() {
        let cache = cache(2);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("a".to_string(), 10);
        cache.put("c".to_string(), 3);

        assert!(!cache.contains("b"));
        assert_eq!(cache.get("a"), Some(10));
        cache.assert_consistent();
    }

    #[test]
    fn test_miss_has_no_side_effect() {
        let cache = cache(3);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        let before = cache.keys_by_recency();

        assert_eq!(cache.get("zzz"), None);

        assert_eq!(cache.keys_by_recency(), before);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_keys_by_recency() {
        let cache = cache(3);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);
        cache.get("a");

        assert_eq!(cache.keys_by_recency(), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_contains_does_not_promote() {
        let cache = cache(2);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert!(cache.contains("a"));
        cache.put("c".to_string(), 3);

        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_round_trip_bytes() {
        let cache: RecencyCache<String, Bytes> = RecencyCache::new(4);
        let payload: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();

        cache.put("bin".to_string(), Bytes::from(payload.clone()));

        assert_eq!(cache.get("bin").unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = cache(0);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_slots_are_recycled() {
        let cache = cache(3);

        for i in 0..100u32 {
            cache.put(format!("key{}", i), i);
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.inner.lock().slots.len(), 3);
        assert_eq!(cache.keys_by_recency(), vec!["key99", "key98", "key97"]);
        assert_eq!(cache.stats().evictions, 97);
        cache.assert_consistent();
    }

    #[test]
    fn test_clear() {
        let cache = cache(3);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().entries, 0);

        cache.put("c".to_string(), 3);
        assert_eq!(cache.keys_by_recency(), vec!["c"]);
        cache.assert_consistent();
    }

    #[test]
    fn test_hit_rate() {
        let cache = cache(2);
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.put("a".to_string(), 1);
        cache.get("a");
        cache.get("b");

        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    #[test]
    fn test_concurrent_access_keeps_index_and_order_in_sync() {
        let cache = cache(8);
        let mut handles = Vec::new();

        for t in 0..8u32 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..2_000u32 {
                    let key = format!("k{}", (i * 7 + t) % 24);
                    if i % 3 == 0 {
                        cache.get(key.as_str());
                    } else {
                        cache.put(key, i);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        cache.assert_consistent();
        assert_eq!(cache.len(), 8);
        assert_eq!(cache.keys_by_recency().len(), 8);
    }
}

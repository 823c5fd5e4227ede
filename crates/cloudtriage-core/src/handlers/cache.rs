//! Bounded LRU cache with a time-to-live

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    last_used: u64,
}

/// At most `capacity` entries; an entry older than `ttl` is treated as absent
///
/// Eviction picks the least recently used entry by a linear scan,
/// which is fine at the sizes the factory uses.
pub struct BoundedCache<K, V> {
    slots: HashMap<K, Slot<V>>,
    capacity: usize,
    ttl: Duration,
    tick: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The live value for `key`, marking it most recently used
    ///
    /// An expired entry is dropped and reported as absent.
    pub fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.slots.get(key) {
            Some(slot) => now.saturating_duration_since(slot.inserted_at) >= self.ttl,
            None => return None,
        };
        if expired {
            self.slots.remove(key);
            return None;
        }
        self.tick += 1;
        let tick = self.tick;
        self.slots.get_mut(key).map(|slot| {
            slot.last_used = tick;
            slot.value.clone()
        })
    }

    /// The stored value for `key`, expired or not, without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Insert `value`, returning the key evicted to make room, if any
    pub fn insert(&mut self, key: K, value: V, now: Instant) -> Option<K> {
        self.tick += 1;
        let mut evicted = None;
        if !self.slots.contains_key(&key) && self.slots.len() >= self.capacity {
            self.purge_expired(now);
            if self.slots.len() >= self.capacity {
                evicted = self.evict_lru();
            }
        }
        self.slots.insert(
            key,
            Slot {
                value,
                inserted_at: now,
                last_used: self.tick,
            },
        );
        evicted
    }

    /// Remove `key` only while it still maps to a value `matches` accepts
    pub fn remove_if(&mut self, key: &K, matches: impl FnOnce(&V) -> bool) -> Option<V> {
        if self.slots.get(key).map(|slot| matches(&slot.value)).unwrap_or(false) {
            return self.slots.remove(key).map(|slot| slot.value);
        }
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.slots.remove(key).map(|slot| slot.value)
    }

    /// Drop every expired entry, returning how many were dropped
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| now.saturating_duration_since(slot.inserted_at) < ttl);
        before - self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn evict_lru(&mut self) -> Option<K> {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone())?;
        self.slots.remove(&oldest);
        Some(oldest)
    }
}

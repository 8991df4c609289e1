//! Generic fixed-capacity least-recently-used map.
//!
//! # Layout
//!
//! Entries live in a slab (`Vec<Slot>`) threaded by an intrusive doubly
//! linked list ordered from most to least recently used.  A hash map from key
//! to slot index gives O(1) lookup; promotion and eviction are O(1) pointer
//! swaps.  Evicted slots are reused in place, so the slab never grows past
//! `capacity`.
//!
//! # Eviction policy
//!
//! Both a hit through [`LruCache::get`] and an [`LruCache::insert`] count as
//! a use.  Inserting a new key into a full cache evicts the entry whose last
//! use is the oldest and returns it to the caller.  [`LruCache::peek`] does
//! not count as a use.

use std::hash::Hash;
use std::num::NonZeroUsize;

use rustc_hash::FxHashMap;

const NIL: usize = usize::MAX;

struct Slot<K, V> {
    key:   K,
    value: V,
    prev:  usize,
    next:  usize,
}

/// Fixed-capacity LRU map.
pub struct LruCache<K, V> {
    capacity: usize,
    map:      FxHashMap<K, usize>,
    slots:    Vec<Slot<K, V>>,
    /// Most recently used slot.
    head:     usize,
    /// Least recently used slot; the next eviction victim.
    tail:     usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            capacity,
            map:   FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            slots: Vec::with_capacity(capacity),
            head:  NIL,
            tail:  NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        Some(&self.slots[idx].value)
    }

    /// Look up `key` without touching the recency order.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&idx| &self.slots[idx].value)
    }

    /// Insert or replace `key`, making it most recently used.
    ///
    /// Returns the evicted `(key, value)` when a new key displaced the least
    /// recently used entry of a full cache.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            self.slots[idx].value = value;
            self.promote(idx);
            return None;
        }

        if self.slots.len() < self.capacity {
            let idx = self.slots.len();
            self.slots.push(Slot { key: key.clone(), value, prev: NIL, next: NIL });
            self.map.insert(key, idx);
            self.link_front(idx);
            return None;
        }

        // Full: recycle the tail slot for the new entry.
        let idx = self.tail;
        self.unlink(idx);
        let slot = &mut self.slots[idx];
        let old_key = std::mem::replace(&mut slot.key, key.clone());
        let old_value = std::mem::replace(&mut slot.value, value);
        self.map.remove(&old_key);
        self.map.insert(key, idx);
        self.link_front(idx);
        Some((old_key, old_value))
    }

    /// Drop every entry.  Capacity is unchanged.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            if cur == NIL {
                return None;
            }
            let slot = &self.slots[cur];
            cur = slot.next;
            Some(&slot.key)
        })
    }

    // ── List plumbing ─────────────────────────────────────────────────────

    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.link_front(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            NIL => self.head = next,
            p   => self.slots[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n   => self.slots[n].prev = prev,
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn link_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}

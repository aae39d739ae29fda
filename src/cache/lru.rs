//! Size-bounded LRU cache
//!
//! A thread-safe LRU cache. Entries never expire on their own; the least
//! recently used entry is evicted once capacity is reached.

use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// A cached value and its slot in the recency list
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    node: usize,
}

/// Node in the LRU linked list
#[derive(Debug)]
struct LruNode<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
struct Inner<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    nodes: Vec<LruNode<K>>,
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn allocate_node(&mut self, key: K) -> usize {
        let node = LruNode {
            key,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].next = self.head;
        self.nodes[idx].prev = None;
        match self.head {
            Some(old) => self.nodes[old].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.map.remove(key)?;
        self.unlink(entry.node);
        self.free.push(entry.node);
        Some(entry.value)
    }

    fn evict_lru(&mut self) {
        if let Some(idx) = self.tail {
            let key = self.nodes[idx].key.clone();
            self.remove(&key);
            self.evictions += 1;
        }
    }
}

/// Thread-safe LRU cache
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(capacity),
                nodes: Vec::with_capacity(capacity),
                free: Vec::new(),
                head: None,
                tail: None,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Get an entry, marking it most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(entry) = inner.map.get(key) else {
            inner.misses += 1;
            return None;
        };
        let (node, value) = (entry.node, entry.value.clone());
        inner.touch(node);
        inner.hits += 1;
        Some(value)
    }

    /// Insert or replace an entry, evicting the LRU entry when full
    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.map.get_mut(&key) {
            entry.value = value;
            let node = entry.node;
            inner.touch(node);
            return;
        }

        if inner.map.len() >= self.capacity {
            inner.evict_lru();
        }

        let node = inner.allocate_node(key.clone());
        inner.push_front(node);
        inner.map.insert(key, CacheEntry { value, node });
    }

    /// Read-through lookup. On a miss `load` runs without the lock held, so
    /// concurrent misses may both load; the last insert wins.
    pub fn get_or_try_insert_with<F>(&self, key: K, load: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.get(&key) {
            trace!("cache hit");
            return Ok(value);
        }
        let value = load()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Remove an entry from the cache
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Check if a key exists without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry; statistics are kept
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.nodes.clear();
        inner.free.clear();
        inner.head = None;
        inner.tail = None;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            len: inner.map.len(),
            capacity: self.capacity,
        }
    }
}

//! Read-through caches for parsed tables and loaded models

mod lru;

pub use lru::{CacheStats, LruCache};

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded LRU cache for embedding vectors
//!
//! Shared across all queries for the lifetime of the process. Writes are
//! idempotent, so concurrent misses on the same key may both compute and
//! insert; the last write wins.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::vector::EmbeddingVector;

/// Default maximum number of cached vectors
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Entries currently cached
    pub entries: usize,
    /// Maximum cache capacity
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f32,
}

/// LRU cache mapping normalized text to its embedding
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Arc<EmbeddingVector>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Create a new cache
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of vectors kept (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Generate cache key from text
    pub fn cache_key(text: &str) -> String {
        text.to_lowercase().trim().to_string()
    }

    /// Get a cached vector, marking it as recently used
    pub fn get(&self, text: &str) -> Option<Arc<EmbeddingVector>> {
        let key = Self::cache_key(text);
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(_) => return None,
        };

        match entries.get(&key) {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Embedding cache hit for '{}'", key);
                Some(vector.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Embedding cache miss for '{}'", key);
                None
            }
        }
    }

    /// Insert a vector, evicting the least recently used entry at capacity
    pub fn insert(&self, text: &str, vector: Arc<EmbeddingVector>) {
        let key = Self::cache_key(text);
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, vector);
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        let key = Self::cache_key(text);
        self.entries
            .lock()
            .map(|entries| entries.contains(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries (e.g. on logout)
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f32 / lookups as f32
            },
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

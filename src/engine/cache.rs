//! Bounded LRU cache of ranked query results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::models::DocumentId;

/// Normalized query -> full ranked id list.
///
/// The map handles concurrent point access; recency order lives in a
/// separate deque behind its own lock. Every mutation of the index bumps
/// the generation and empties the cache.
pub struct QueryCache {
    entries: DashMap<String, Arc<Vec<DocumentId>>>,
    order: RwLock<VecDeque<String>>,
    capacity: usize,
    generation: AtomicU64,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: RwLock::new(VecDeque::new()),
            capacity,
            generation: AtomicU64::new(0),
        }
    }

    /// Cached results for `query`, marking it most recently used
    pub fn get(&self, query: &str) -> Option<Arc<Vec<DocumentId>>> {
        let hit = self.entries.get(query).map(|e| e.value().clone())?;
        let mut order = self.order.write();
        if let Some(pos) = order.iter().position(|q| q == query) {
            if let Some(key) = order.remove(pos) {
                order.push_back(key);
            }
        }
        Some(hit)
    }

    /// Current generation; read before evaluating a query
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store results computed against `generation`.
    ///
    /// Dropped (returns false) when the index changed since then or the
    /// cache is disabled.
    pub fn insert(&self, query: String, results: Arc<Vec<DocumentId>>, generation: u64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let mut order = self.order.write();
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }

        if let Some(pos) = order.iter().position(|q| *q == query) {
            order.remove(pos);
        } else {
            while order.len() >= self.capacity {
                match order.pop_front() {
                    Some(evicted) => {
                        self.entries.remove(&evicted);
                    }
                    None => break,
                }
            }
        }
        order.push_back(query.clone());
        self.entries.insert(query, results);
        true
    }

    /// Drop every entry and start a new generation
    pub fn invalidate(&self) {
        let mut order = self.order.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        order.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

use crate::config::CacheConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{trace, warn};

/// Counters for cache performance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub size: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub(crate) fn merge(&mut self, other: &CacheMetrics) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.inserts += other.inserts;
        self.evictions += other.evictions;
        self.size += other.size;
    }
}

/// Entries and metrics behind one lock.
#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, V>,
    metrics: CacheMetrics,
}

/// Bounded memo table owned by a matcher or registry.
///
/// When full the whole table is dropped; entries are cheap to recompute.
#[derive(Debug)]
pub(crate) struct MemoCache<K, V> {
    label: &'static str,
    config: CacheConfig,
    state: Mutex<CacheState<K, V>>,
}

impl<K: Eq + Hash, V: Clone> MemoCache<K, V> {
    pub(crate) fn new(label: &'static str, config: CacheConfig) -> Self {
        Self {
            label,
            config,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        let mut state = self.state.lock();
        match state.entries.get(key).cloned() {
            Some(value) => {
                state.metrics.hits += 1;
                trace!(cache = self.label, "cache hit");
                Some(value)
            }
            None => {
                state.metrics.misses += 1;
                trace!(cache = self.label, "cache miss");
                None
            }
        }
    }

    pub(crate) fn insert(&self, key: K, value: V) {
        if !self.config.enabled {
            return;
        }
        let mut state = self.state.lock();
        if state.entries.len() >= self.config.max_entries && !state.entries.contains_key(&key) {
            warn!(
                cache = self.label,
                max_entries = self.config.max_entries,
                "cache full, clearing"
            );
            state.metrics.evictions += state.entries.len() as u64;
            state.entries.clear();
        }
        state.entries.insert(key, value);
        state.metrics.inserts += 1;
        state.metrics.size = state.entries.len();
    }

    pub(crate) fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.metrics.size = 0;
    }

    pub(crate) fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }
}

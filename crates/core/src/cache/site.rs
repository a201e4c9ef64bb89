//! Site-partitioned result cache.
//!
//! Every operation is scoped to the partition of the current site (the server's
//! canonical base path). Switching sites exposes a fresh, lazily created
//! partition; partitions of previously visited sites are kept as they were.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Partitions<V> {
    site: String,
    data: HashMap<String, HashMap<String, V>>,
}

impl<V> Partitions<V> {
    fn current(&mut self) -> &mut HashMap<String, V> {
        self.data.entry(self.site.clone()).or_default()
    }
}

/// Store of previously parsed successful responses, keyed by cache key.
///
/// No TTL and no eviction: entries stay until deleted or invalidated by prefix.
pub struct SiteBasedCache<V = Value> {
    inner: Mutex<Partitions<V>>,
}

impl<V: Clone> SiteBasedCache<V> {
    /// Create a cache whose active partition is `site`.
    pub fn new(site: impl Into<String>) -> Self {
        Self { inner: Mutex::new(Partitions { site: site.into(), data: HashMap::new() }) }
    }

    fn lock(&self) -> MutexGuard<'_, Partitions<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The site whose partition all operations currently use.
    pub fn site(&self) -> String {
        self.lock().site.clone()
    }

    /// Make `site` the active partition. Existing partitions are retained.
    pub fn switch_site(&self, site: impl Into<String>) {
        let site = site.into();
        let mut state = self.lock();
        if state.site != site {
            tracing::debug!(from = %state.site, to = %site, "switching cache partition");
            state.site = site;
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().current().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().current().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock().current().insert(key.into(), value);
    }

    /// Store into the partition of `site` regardless of which site is active.
    ///
    /// Used when a request settles after the active site changed.
    pub fn set_for_site(&self, site: &str, key: impl Into<String>, value: V) {
        self.lock().data.entry(site.to_string()).or_default().insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) {
        self.lock().current().remove(key);
    }

    /// Remove every entry of the current partition whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut state = self.lock();
        let partition = state.current();
        let before = partition.len();
        partition.retain(|key, _| !key.starts_with(prefix));
        tracing::debug!(prefix, removed = before - partition.len(), "invalidated cached results");
    }

    /// Bulk insert into the current partition.
    pub fn seed(&self, entries: impl IntoIterator<Item = (String, V)>) {
        self.lock().current().extend(entries);
    }

    /// Number of entries in the current partition.
    pub fn len(&self) -> usize {
        self.lock().current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for SiteBasedCache<V> {
    fn default() -> Self {
        Self::new("")
    }
}

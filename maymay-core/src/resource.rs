//! Locally allocated image resources (user uploads).
//!
//! An upload is copied into the store once and referenced from image layers
//! by [`ResourceKey`]. Each key is released exactly once: when its layer is
//! removed or when the owning scene is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of a locally allocated resource, displayed as `blob:<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(Uuid);

impl ResourceKey {
    /// Create a new unique resource key.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// Owner of the bytes behind every live [`ResourceKey`].
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    entries: HashMap<ResourceKey, Arc<[u8]>>,
    released: u64,
}

impl ResourceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `bytes` and return the key that references them.
    pub fn allocate(&mut self, bytes: Vec<u8>) -> ResourceKey {
        let mut key = ResourceKey::new();
        while self.entries.contains_key(&key) {
            key = ResourceKey::new();
        }
        tracing::debug!("Allocated {key} ({} bytes)", bytes.len());
        self.entries.insert(key, Arc::from(bytes));
        key
    }

    /// Get the bytes of a live resource.
    #[must_use]
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<[u8]>> {
        self.entries.get(key).cloned()
    }

    /// Release a resource.
    ///
    /// Returns `false` if the key was not live (unknown or already released).
    pub fn release(&mut self, key: &ResourceKey) -> bool {
        if self.entries.remove(key).is_some() {
            self.released += 1;
            tracing::debug!("Released {key}");
            true
        } else {
            tracing::warn!("Release of {key} ignored: not a live resource");
            false
        }
    }

    /// Release every live resource, returning how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.released += count as u64;
        count
    }

    /// Check whether a key is live.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live resources.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of releases performed over the store's lifetime.
    #[must_use]
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

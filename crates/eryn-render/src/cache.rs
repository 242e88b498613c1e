//! The OSH cache: a trivial `origin -> bytes` map the [`crate::Engine`]
//! consults before recompiling. The renderer needs somewhere to resolve a
//! component's `abs_path` back into bytecode without recompiling it on
//! every invocation.

use std::collections::HashMap;

/// Maps an origin label (a file path or alias) to its compiled OSH bytes.
/// Last write wins; there is no eviction policy.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    entries: HashMap<String, Vec<u8>>,
}

impl Cache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the OSH bytes for `origin`.
    pub fn insert(&mut self, origin: impl Into<String>, osh: Vec<u8>) {
        self.entries.insert(origin.into(), osh);
    }

    /// Looks up the OSH bytes cached for `origin`.
    #[must_use]
    pub fn get(&self, origin: &str) -> Option<&[u8]> {
        self.entries.get(origin).map(Vec::as_slice)
    }

    /// Whether `origin` has a cached entry.
    #[must_use]
    pub fn contains(&self, origin: &str) -> bool {
        self.entries.contains_key(origin)
    }

    /// Removes every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Per-node property cache keyed by synthesized node path

use std::collections::{BTreeMap, HashMap};

use flux_lang::Value;

/// Resolved dynamic props of one node for one refresh window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub refresh_key: i64,
    pub evaluated_time: f64,
    pub evaluated_docstep: u64,
    pub props: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct NodeCache {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached props for `path`, only if they were computed under `refresh_key`
    pub fn lookup(&mut self, path: &str, refresh_key: i64) -> Option<&CacheEntry> {
        match self.entries.get(path) {
            Some(entry) if entry.refresh_key == refresh_key => {
                self.hits += 1;
                log::trace!("Cache hit {} (key {})", path, refresh_key);
                Some(entry)
            }
            _ => {
                self.misses += 1;
                log::trace!("Cache miss {} (key {})", path, refresh_key);
                None
            }
        }
    }

    pub fn store(&mut self, path: String, entry: CacheEntry) {
        self.entries.insert(path, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Path of a node: `parent/kind:id:index`
pub fn node_path(parent: &str, kind: &str, id: &str, index: usize) -> String {
    format!("{}/{}:{}:{}", parent, kind, id, index)
}

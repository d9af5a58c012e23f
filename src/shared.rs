//! The index shared between the HTTP handlers and the change watcher.
//!
//! One writer (the watcher, publishing a freshly rebuilt generation) and many
//! readers (request handlers). A generation is an immutable
//! `Arc<ImageIndex>`: publishing swaps the whole `Arc` under a short write
//! lock, so a reader either sees the previous generation or the new one,
//! never a half-merged mix. Readers that took a [`SharedIndex::snapshot`]
//! keep using their generation for as long as they hold it.

use crate::types::{ImageEntry, ImageIndex};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SharedIndex {
    current: RwLock<Arc<ImageIndex>>,
}

impl SharedIndex {
    pub fn new(index: ImageIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Replace the current generation.
    pub fn publish(&self, index: ImageIndex) {
        let index = Arc::new(index);
        debug!(images = index.len(), "publishing index generation");
        // A panicking reader cannot leave the Arc half-written, so a poisoned
        // lock still holds a valid generation.
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = index;
    }

    /// The current generation.
    pub fn snapshot(&self) -> Arc<ImageIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Sorted names of all entries.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn lookup(&self, name: &str) -> Option<ImageEntry> {
        self.snapshot().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! The stream-context store.
//!
//! A [`StreamContext`] is created when an open uncovers a valid stub mark:
//! it is immutable after construction, shared by every concurrent observer
//! of the same open, and lock-free to read (the only coordination is at
//! creation time). Two concurrent opens of the same stub may each build one;
//! [`ContextStore::create_or_adopt`] implements the keep-if-exists rule that
//! makes the loser discard its freshly built copy and adopt the winner's,
//! guaranteeing context identity across concurrent observers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-open record copied out of a stub mark at open time. Nothing here
/// ever changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamContext {
    pub remote_size: u64,
    pub remote_path: String,
    pub delegate_to_helper: bool,
}

impl StreamContext {
    #[must_use]
    pub fn new(remote_size: u64, remote_path: String, delegate_to_helper: bool) -> Self {
        Self {
            remote_size,
            remote_path,
            delegate_to_helper,
        }
    }
}

/// The store. Cheap to clone: an `Arc` around the map.
#[derive(Clone, Default)]
pub struct ContextStore {
    contexts: Arc<Mutex<HashMap<String, Arc<StreamContext>>>>,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `built` to `path`, unless another open has already won the
    /// race for the same path, in which case `built` is dropped and the
    /// winner's context is returned instead. Either way the caller gets a
    /// shared reference it can attach to its open.
    #[must_use]
    pub fn create_or_adopt(&self, path: &str, built: StreamContext) -> Arc<StreamContext> {
        let key = path.to_lowercase();
        let mut contexts = self.contexts.lock().expect("context store poisoned");
        Arc::clone(contexts.entry(key).or_insert_with(|| Arc::new(built)))
    }

    /// Look up the live context for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<StreamContext>> {
        let key = path.to_lowercase();
        self.contexts
            .lock()
            .expect("context store poisoned")
            .get(&key)
            .cloned()
    }

    /// Detach the context for `path`. Called once materialization commits
    /// (successful fetch) or the open that owned it goes away.
    pub fn clear(&self, path: &str) {
        let key = path.to_lowercase();
        self.contexts.lock().expect("context store poisoned").remove(&key);
    }
}

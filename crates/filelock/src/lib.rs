//! A refcounted, per-path lock so that at most one fetch runs against a
//! given file at a time. Modeled on a manual-reset event that starts
//! "available": the first acquirer to try-consume it becomes the fetcher;
//! everyone else waits for the fetcher to signal completion, then proceeds
//! as an observer of the now-cleared mark.
//!
//! Intended call-site pattern:
//!
//! ```ignore
//! let handle = registry.acquire(path);
//! if handle.try_become_fetcher() {
//!     // ... invoke the fetch engine, clear the mark ...
//!     handle.signal_done();
//! } else {
//!     handle.wait_for_fetcher().await;
//!     // proceed as an observer; the mark is now gone.
//! }
//! // `handle` drops here, releasing unconditionally.
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

struct Entry {
    notify: Notify,
    /// `false` until the first acquirer claims fetcher status.
    claimed: AtomicBool,
    /// `false` until `signal_done` has run. `notify_waiters` stores no
    /// permit, so this flag is what lets a `wait_for_fetcher` call that
    /// starts *after* `signal_done` already fired return immediately
    /// instead of waiting for a wakeup that already happened.
    done: AtomicBool,
}

impl Entry {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            claimed: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }
}

struct Slot {
    entry: Arc<Entry>,
    refcount: usize,
}

/// The registry of per-path locks. Cheap to clone: internally an `Arc`
/// around the map.
#[derive(Clone, Default)]
pub struct FileLockRegistry {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl FileLockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a handle for `path` (compared case-insensitively, matching
    /// the filesystem's own path semantics). Bumps the refcount; the
    /// returned handle releases it on drop.
    #[must_use]
    pub fn acquire(&self, path: &str) -> FileLockHandle {
        let key = path.to_lowercase();
        let entry = {
            let mut slots = self.slots.lock().expect("filelock registry poisoned");
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                entry: Arc::new(Entry::new()),
                refcount: 0,
            });
            slot.refcount += 1;
            Arc::clone(&slot.entry)
        };
        FileLockHandle {
            registry: self.clone(),
            key,
            entry,
        }
    }

    /// Current number of live handles for `path`. Exposed for tests.
    #[cfg(test)]
    fn refcount(&self, path: &str) -> usize {
        let slots = self.slots.lock().unwrap();
        slots.get(&path.to_lowercase()).map_or(0, |s| s.refcount)
    }

    fn release(&self, key: &str) {
        let mut slots = self.slots.lock().expect("filelock registry poisoned");
        if let Some(slot) = slots.get_mut(key) {
            slot.refcount -= 1;
            if slot.refcount == 0 {
                slots.remove(key);
            }
        }
    }
}

/// A live reference to one path's lock entry.
pub struct FileLockHandle {
    registry: FileLockRegistry,
    key: String,
    entry: Arc<Entry>,
}

impl FileLockHandle {
    /// Try to become the fetcher for this path. Exactly one handle among
    /// any concurrently-acquired set for the same path will see `true`.
    #[must_use]
    pub fn try_become_fetcher(&self) -> bool {
        self.entry
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Wait indefinitely for the fetcher to call [`Self::signal_done`].
    /// Callers that lost the race to [`Self::try_become_fetcher`] call this
    /// before re-checking the mark.
    ///
    /// Registers as a waiter before checking `done`, so a `signal_done` that
    /// lands between the check and the await can't be missed — `notify_one`
    /// stores a permit, `notify_waiters` doesn't.
    pub async fn wait_for_fetcher(&self) {
        let notified = self.entry.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.entry.done.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Called by the fetcher once the mark-clear has committed. Per the
    /// happens-before invariant, this must run strictly after the mark is
    /// gone, not before.
    pub fn signal_done(&self) {
        self.entry.done.store(true, Ordering::Release);
        self.entry.notify.notify_waiters();
    }
}

impl Drop for FileLockHandle {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_acquirer_becomes_fetcher_others_do_not() {
        let registry = FileLockRegistry::new();
        let a = registry.acquire("/v/a.bin");
        let b = registry.acquire("/V/A.BIN");
        assert!(a.try_become_fetcher());
        assert!(!b.try_become_fetcher());
        assert!(!a.try_become_fetcher(), "claim is one-shot, not re-entrant");
    }

    #[test]
    fn paths_are_compared_case_insensitively() {
        let registry = FileLockRegistry::new();
        let _a = registry.acquire("/v/a.bin");
        assert_eq!(registry.refcount("/V/A.BIN"), 1);
    }

    #[test]
    fn releasing_the_last_handle_drops_the_entry() {
        let registry = FileLockRegistry::new();
        {
            let _a = registry.acquire("/v/a.bin");
            assert_eq!(registry.refcount("/v/a.bin"), 1);
        }
        assert_eq!(registry.refcount("/v/a.bin"), 0);
    }

    #[test]
    fn distinct_paths_do_not_contend() {
        let registry = FileLockRegistry::new();
        let a = registry.acquire("/v/a.bin");
        let b = registry.acquire("/v/b.bin");
        assert!(a.try_become_fetcher());
        assert!(b.try_become_fetcher());
    }

    #[tokio::test]
    async fn observer_wakes_after_fetcher_signals_done() {
        let registry = FileLockRegistry::new();
        let fetcher = registry.acquire("/v/a.bin");
        let observer = registry.acquire("/v/a.bin");
        assert!(fetcher.try_become_fetcher());
        assert!(!observer.try_become_fetcher());

        let waited = tokio::spawn(async move {
            observer.wait_for_fetcher().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        fetcher.signal_done();
        tokio::time::timeout(Duration::from_secs(1), waited)
            .await
            .expect("observer should wake promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_fetcher_returns_promptly_when_signal_done_already_ran() {
        let registry = FileLockRegistry::new();
        let fetcher = registry.acquire("/v/a.bin");
        let observer = registry.acquire("/v/a.bin");
        assert!(fetcher.try_become_fetcher());
        assert!(!observer.try_become_fetcher());

        // Signal before anyone has started waiting: notify_waiters stores no
        // permit, so without the `done` flag this would hang forever.
        fetcher.signal_done();

        tokio::time::timeout(Duration::from_secs(1), observer.wait_for_fetcher())
            .await
            .expect("a signal that already fired must not be missed");
    }
}

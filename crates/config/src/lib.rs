//! Runtime policy consulted on every open: whether fetching and watching
//! are enabled, which paths are watched, which pids are trusted, and the
//! sampling rate for observation events.
//!
//! Backed by a single `RwLock<ConfigState>`: `set_*` operations (driven by
//! the helper's `set_mode` / `set_watch_paths` / `set_report_rate`
//! commands) take the lock exclusively; the read path the interception
//! layer calls on every open (`is_trusted`, `report_rate_for_path`) takes
//! it shared, so readers never observe a torn mix of a concurrent write.

use std::collections::HashSet;
use std::sync::RwLock;

use bitflags::bitflags;
use lazyfetch_error::{CoreError, CoreResult};

bitflags! {
    /// `mode` bitset. Empty means fetching and watching are both disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mode: u32 {
        const FETCH_ENABLED = 0b01;
        const WATCH_ENABLED  = 0b10;
    }
}

/// Upper bound on `report_rate`: ten-thousandths, i.e. a probability.
pub const REPORT_RATE_MAX: u32 = 10_000;

/// The opaque key/value backing store `reload_from` pulls the three
/// recognized keys from. A host implements this against its own registry
/// or config file; `lazyfetch-testkit` implements it in memory.
pub trait ConfigSource: Send + Sync {
    fn get_u32(&self, key: &str) -> Option<u32>;
    fn get_multi_string(&self, key: &str) -> Option<Vec<String>>;
}

#[derive(Debug, Clone, Default)]
struct ConfigState {
    mode: Mode,
    report_rate: u32,
    watched_paths: HashSet<String>,
    trusted_pids: HashSet<u32>,
}

/// The policy store. Cheaply cloneable (an `Arc` around the lock) so every
/// crate that needs to consult it — intercept, fetch, helper — can hold its
/// own handle.
#[derive(Debug, Default)]
pub struct Config {
    state: RwLock<ConfigState>,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `mode` wholesale. Corresponds to the helper's `set_mode`.
    pub fn set_mode(&self, mode: Mode) {
        self.state.write().expect("config lock poisoned").mode = mode;
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.state.read().expect("config lock poisoned").mode
    }

    /// Clamp and replace `report_rate`. Corresponds to `set_report_rate`.
    pub fn set_report_rate(&self, rate: u32) {
        self.state.write().expect("config lock poisoned").report_rate = rate.min(REPORT_RATE_MAX);
    }

    /// Clear and repopulate `watched_paths`. Every entry must end with a
    /// path separator, mirroring the wire contract `set_watch_paths`
    /// enforces before the core ever sees the list.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidArgument`] if any path is missing its
    /// trailing separator.
    pub fn set_watch_paths<I, S>(&self, paths: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let normalized: HashSet<String> = paths
            .into_iter()
            .map(Into::into)
            .map(|p| {
                if p.ends_with('/') || p.ends_with('\\') {
                    Ok(p.to_lowercase())
                } else {
                    Err(CoreError::InvalidArgument(format!(
                        "watched path {p:?} must end with a separator"
                    )))
                }
            })
            .collect::<CoreResult<_>>()?;
        self.state.write().expect("config lock poisoned").watched_paths = normalized;
        Ok(())
    }

    /// Add a pid to `trusted_pids` (helper connect).
    pub fn trust_pid(&self, pid: u32) {
        self.state
            .write()
            .expect("config lock poisoned")
            .trusted_pids
            .insert(pid);
    }

    /// Remove a pid from `trusted_pids` (helper disconnect).
    pub fn untrust_pid(&self, pid: u32) {
        self.state
            .write()
            .expect("config lock poisoned")
            .trusted_pids
            .remove(&pid);
    }

    #[must_use]
    pub fn is_trusted(&self, pid: u32) -> bool {
        self.state
            .read()
            .expect("config lock poisoned")
            .trusted_pids
            .contains(&pid)
    }

    /// Case-insensitive prefix membership: a path is watched iff some
    /// watched entry is a prefix of it, so watching `/a/b/` covers
    /// `/a/b/c/d`.
    #[must_use]
    pub fn is_watched(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.state
            .read()
            .expect("config lock poisoned")
            .watched_paths
            .iter()
            .any(|prefix| lower.starts_with(prefix.as_str()))
    }

    /// The sampling rate for `path`: the global rate if it's watched and
    /// `WATCH_ENABLED` is set, else 0.
    #[must_use]
    pub fn report_rate_for_path(&self, path: &str) -> u32 {
        let state = self.state.read().expect("config lock poisoned");
        let lower = path.to_lowercase();
        let watched = state
            .watched_paths
            .iter()
            .any(|prefix| lower.starts_with(prefix.as_str()));
        if state.mode.contains(Mode::WATCH_ENABLED) && watched {
            state.report_rate
        } else {
            0
        }
    }

    #[must_use]
    pub fn fetch_enabled(&self) -> bool {
        self.mode().contains(Mode::FETCH_ENABLED)
    }

    /// Reload `mode`, `report_rate`, and `watched_paths` from an opaque
    /// source. Missing keys default to `0`, `0`, and empty, matching the
    /// recognized-key table. `trusted_pids` is never touched here: trust is
    /// driven exclusively by helper connect/disconnect.
    ///
    /// # Errors
    /// Propagates [`CoreError::InvalidArgument`] from a malformed watch path.
    pub fn reload_from(&self, source: &dyn ConfigSource) -> CoreResult<()> {
        let mode = Mode::from_bits_truncate(source.get_u32("OperationMode").unwrap_or(0));
        let report_rate = source.get_u32("ReportRate").unwrap_or(0).min(REPORT_RATE_MAX);
        let paths = source.get_multi_string("WatchPaths").unwrap_or_default();

        self.set_watch_paths(paths)?;
        let mut state = self.state.write().expect("config lock poisoned");
        state.mode = mode;
        state.report_rate = report_rate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        mode: Option<u32>,
        rate: Option<u32>,
        paths: Option<Vec<String>>,
    }

    impl ConfigSource for FakeSource {
        fn get_u32(&self, key: &str) -> Option<u32> {
            match key {
                "OperationMode" => self.mode,
                "ReportRate" => self.rate,
                _ => None,
            }
        }
        fn get_multi_string(&self, key: &str) -> Option<Vec<String>> {
            match key {
                "WatchPaths" => self.paths.clone(),
                _ => None,
            }
        }
    }

    #[test]
    fn fresh_config_is_fully_disabled() {
        let cfg = Config::new();
        assert!(!cfg.fetch_enabled());
        assert_eq!(cfg.report_rate_for_path("/a/b/c"), 0);
    }

    #[test]
    fn watched_paths_match_by_case_insensitive_prefix() {
        let cfg = Config::new();
        cfg.set_watch_paths(["/A/B/"]).unwrap();
        assert!(cfg.is_watched("/a/b/c/d"));
        assert!(!cfg.is_watched("/a/c/"));
    }

    #[test]
    fn set_watch_paths_rejects_missing_separator() {
        let cfg = Config::new();
        let err = cfg.set_watch_paths(["/a/b"]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn report_rate_is_zero_unless_watch_enabled_and_path_watched() {
        let cfg = Config::new();
        cfg.set_watch_paths(["/a/"]).unwrap();
        cfg.set_report_rate(5000);
        assert_eq!(cfg.report_rate_for_path("/a/b"), 0, "watch not yet enabled");

        cfg.set_mode(Mode::WATCH_ENABLED);
        assert_eq!(cfg.report_rate_for_path("/a/b"), 5000);
        assert_eq!(cfg.report_rate_for_path("/z/b"), 0, "unwatched path");
    }

    #[test]
    fn report_rate_is_clamped_to_max() {
        let cfg = Config::new();
        cfg.set_report_rate(50_000);
        cfg.set_watch_paths(["/a/"]).unwrap();
        cfg.set_mode(Mode::WATCH_ENABLED);
        assert_eq!(cfg.report_rate_for_path("/a/"), REPORT_RATE_MAX);
    }

    #[test]
    fn trust_pid_round_trips() {
        let cfg = Config::new();
        assert!(!cfg.is_trusted(99));
        cfg.trust_pid(99);
        assert!(cfg.is_trusted(99));
        cfg.untrust_pid(99);
        assert!(!cfg.is_trusted(99));
    }

    #[test]
    fn reload_from_missing_keys_defaults_to_disabled_empty() {
        let cfg = Config::new();
        cfg.set_mode(Mode::FETCH_ENABLED);
        let source = FakeSource { mode: None, rate: None, paths: None };
        cfg.reload_from(&source).unwrap();
        assert_eq!(cfg.mode(), Mode::empty());
        assert_eq!(cfg.report_rate_for_path("/anything"), 0);
    }

    #[test]
    fn reload_from_populates_all_three_keys() {
        let cfg = Config::new();
        let source = FakeSource {
            mode: Some(0b11),
            rate: Some(2500),
            paths: Some(vec!["/watched/".to_string()]),
        };
        cfg.reload_from(&source).unwrap();
        assert_eq!(cfg.mode(), Mode::FETCH_ENABLED | Mode::WATCH_ENABLED);
        assert_eq!(cfg.report_rate_for_path("/watched/x"), 2500);
    }
}

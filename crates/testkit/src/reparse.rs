use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::{Attributes, RawMark, ReparseHost};

struct PathState {
    mark: Option<RawMark>,
    attrs: Attributes,
}

/// An in-memory reparse-point host. Seeded with stubs via [`Self::seed_stub`];
/// `clear_mark` enforces the same tag/guid the host was constructed with,
/// so a test exercising the wrong owning tag sees the same
/// [`CoreError::InvalidArgument`] a real host would surface for a foreign
/// mark.
pub struct FakeReparseHost {
    own_tag: u32,
    own_guid: [u8; 16],
    paths: Mutex<HashMap<String, PathState>>,
}

impl FakeReparseHost {
    #[must_use]
    pub fn new(own_tag: u32, own_guid: [u8; 16]) -> Self {
        Self {
            own_tag,
            own_guid,
            paths: Mutex::new(HashMap::new()),
        }
    }

    /// Plant a stub mark at `path`, with the attribute bits a real stub
    /// would carry.
    pub fn seed_stub(&self, path: &str, mark: RawMark) {
        self.paths.lock().expect("fake reparse host poisoned").insert(
            path.to_lowercase(),
            PathState {
                mark: Some(mark),
                attrs: Attributes::STUB_BITS,
            },
        );
    }

    /// Current attribute bits for `path` (empty if the path was never seeded).
    #[must_use]
    pub fn attributes(&self, path: &str) -> Attributes {
        self.paths
            .lock()
            .expect("fake reparse host poisoned")
            .get(&path.to_lowercase())
            .map_or(Attributes::empty(), |s| s.attrs)
    }

    #[must_use]
    pub fn has_mark(&self, path: &str) -> bool {
        self.paths
            .lock()
            .expect("fake reparse host poisoned")
            .get(&path.to_lowercase())
            .is_some_and(|s| s.mark.is_some())
    }
}

#[async_trait]
impl ReparseHost for FakeReparseHost {
    async fn read_mark(&self, path: &str) -> CoreResult<Option<RawMark>> {
        Ok(self
            .paths
            .lock()
            .expect("fake reparse host poisoned")
            .get(&path.to_lowercase())
            .and_then(|s| s.mark.clone()))
    }

    async fn clear_mark(&self, path: &str, own_tag: u32, own_guid: [u8; 16]) -> CoreResult<()> {
        if own_tag != self.own_tag || own_guid != self.own_guid {
            return Err(CoreError::InvalidArgument(
                "clear_mark called with a tag/guid this host doesn't own".into(),
            ));
        }
        let mut paths = self.paths.lock().expect("fake reparse host poisoned");
        if let Some(state) = paths.get_mut(&path.to_lowercase()) {
            state.mark = None;
            state.attrs = state.attrs.cleared();
        }
        Ok(())
    }
}

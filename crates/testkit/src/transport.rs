use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::HelperTransport;

enum Canned {
    Reply(Vec<u8>),
    Fail(fn() -> CoreError),
}

/// A scripted helper session: register a canned reply or failure per
/// notification kind, then inspect [`Self::calls`] for what was actually
/// sent.
#[derive(Default)]
pub struct FakeHelperTransport {
    scripted: Mutex<HashMap<u32, Canned>>,
    calls: Mutex<Vec<(u32, Vec<u8>)>>,
}

impl FakeHelperTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reply(self, kind: u32, reply: Vec<u8>) -> Self {
        self.scripted
            .lock()
            .expect("fake transport poisoned")
            .insert(kind, Canned::Reply(reply));
        self
    }

    #[must_use]
    pub fn with_disconnected(self, kind: u32) -> Self {
        self.scripted
            .lock()
            .expect("fake transport poisoned")
            .insert(kind, Canned::Fail(|| CoreError::Disconnected));
        self
    }

    /// Every `(kind, data)` pair sent via [`HelperTransport::notify`], in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(u32, Vec<u8>)> {
        self.calls.lock().expect("fake transport poisoned").clone()
    }
}

#[async_trait]
impl HelperTransport for FakeHelperTransport {
    async fn notify(&self, kind: u32, data: Vec<u8>) -> CoreResult<Vec<u8>> {
        self.calls.lock().expect("fake transport poisoned").push((kind, data));
        match self.scripted.lock().expect("fake transport poisoned").get(&kind) {
            Some(Canned::Reply(reply)) => Ok(reply.clone()),
            Some(Canned::Fail(make_err)) => Err(make_err()),
            None => Ok(Vec::new()),
        }
    }
}

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::{BoxedReader, HelperDelegate, LocalFile, RemoteOpenBackend};

/// An in-memory local file the fetch engine can write into. Cheaply
/// cloneable so a test can keep a handle after moving one into the engine.
#[derive(Clone, Default)]
pub struct FakeLocalFile {
    data: Arc<Mutex<Vec<u8>>>,
}

impl FakeLocalFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().expect("fake local file poisoned").clone()
    }
}

#[async_trait]
impl LocalFile for FakeLocalFile {
    async fn write_at(&mut self, offset: u64, buf: &[u8]) -> CoreResult<()> {
        let mut data = self.data.lock().expect("fake local file poisoned");
        let offset = offset as usize;
        let end = offset + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    async fn set_len(&mut self, len: u64) -> CoreResult<()> {
        self.data.lock().expect("fake local file poisoned").resize(len as usize, 0);
        Ok(())
    }

    async fn current_len(&self) -> CoreResult<u64> {
        Ok(self.data.lock().expect("fake local file poisoned").len() as u64)
    }
}

/// A fixed table of remote sources, reachable directly. Paths absent from
/// the table open as [`CoreError::NotFound`]; paths listed in
/// `denied` open as [`CoreError::AccessDenied`], forcing callers through
/// [`FakeHelperDelegate`] instead.
#[derive(Default)]
pub struct FakeRemoteOpenBackend {
    content: HashMap<String, Vec<u8>>,
    denied: Vec<String>,
}

impl FakeRemoteOpenBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_content(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.content.insert(path.into(), bytes);
        self
    }

    #[must_use]
    pub fn with_direct_access_denied(mut self, path: impl Into<String>) -> Self {
        self.denied.push(path.into());
        self
    }
}

#[async_trait]
impl RemoteOpenBackend for FakeRemoteOpenBackend {
    async fn open_direct(&self, remote_path: &str) -> CoreResult<(BoxedReader, u64)> {
        if self.denied.iter().any(|p| p == remote_path) {
            return Err(CoreError::AccessDenied(format!(
                "direct access to {remote_path} denied"
            )));
        }
        let bytes = self
            .content
            .get(remote_path)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(remote_path.to_string()))?;
        let size = bytes.len() as u64;
        Ok((Box::pin(Cursor::new(bytes)), size))
    }
}

/// The helper-delegated counterpart to [`FakeRemoteOpenBackend`]: serves
/// only paths explicitly registered with [`Self::with_content`], so tests
/// can confirm a fetch actually went through the helper path rather than
/// reaching the source directly.
#[derive(Default)]
pub struct FakeHelperDelegate {
    content: HashMap<String, Vec<u8>>,
}

impl FakeHelperDelegate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_content(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.content.insert(path.into(), bytes);
        self
    }
}

#[async_trait]
impl HelperDelegate for FakeHelperDelegate {
    async fn open_via_helper(&self, remote_path: &str) -> CoreResult<(BoxedReader, u64)> {
        let bytes = self
            .content
            .get(remote_path)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(remote_path.to_string()))?;
        let size = bytes.len() as u64;
        Ok((Box::pin(Cursor::new(bytes)), size))
    }
}

//! Remote-read and local-write handles the fetch engine drives.

use std::pin::Pin;

use async_trait::async_trait;
use lazyfetch_error::CoreResult;
use tokio::io::AsyncRead;

/// A type-erased async byte source. The fetch engine never cares whether
/// bytes come from a direct host read or a helper-delegated one; it only
/// reads sequentially until EOF.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Unpin + Send>>;

/// The local target a fetch writes into: sequential writes plus the two
/// `set_len` calls the pipeline issues (the pre-flight extension to the
/// declared remote size, and the final truncation to bytes actually
/// copied). Kept separate from `tokio::io::AsyncWrite` because `set_len`
/// isn't part of that trait.
#[async_trait]
pub trait LocalFile: Send {
    async fn write_at(&mut self, offset: u64, buf: &[u8]) -> CoreResult<()>;
    async fn set_len(&mut self, len: u64) -> CoreResult<()>;
    async fn current_len(&self) -> CoreResult<u64>;
}

/// Opens a remote source directly against the host (no helper delegation).
/// Returns the byte stream plus the remote's current size, so the fetch
/// engine can perform its pre-flight EOF extension before copying a byte.
#[async_trait]
pub trait RemoteOpenBackend: Send + Sync {
    async fn open_direct(&self, remote_path: &str) -> CoreResult<(BoxedReader, u64)>;
}

/// Opens a remote source through the user-mode helper instead of the host
/// directly. Only exercised when a mark's `delegate_to_helper` is set,
/// which — per the resolved Open Question — never happens from an on-disk
/// mark today; this trait exists so the call path is complete and testable
/// even though no production mark currently triggers it.
#[async_trait]
pub trait HelperDelegate: Send + Sync {
    async fn open_via_helper(&self, remote_path: &str) -> CoreResult<(BoxedReader, u64)>;
}

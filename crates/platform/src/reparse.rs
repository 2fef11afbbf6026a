//! The stub-mark contract: reading and clearing a reparse point's payload.

use std::sync::Arc;

use async_trait::async_trait;
use lazyfetch_error::CoreResult;

/// The payload of a stub mark, already decoded from its on-disk wire format
/// by `lazyfetch-markstore`. `delegate_to_helper` always comes back `false`
/// here: the on-disk struct carries only a declared size and a remote path,
/// nothing else, so there is nothing to decode it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMark {
    pub remote_size: u64,
    pub remote_path: String,
}

/// The subset of reparse-point operations the interception layer needs from
/// a host. A real host implements this against its own reparse/attribute
/// APIs; `lazyfetch-testkit` implements it in memory.
#[async_trait]
pub trait ReparseHost: Send + Sync {
    /// Read and decode the stub mark at `path`, if any. Returns `Ok(None)`
    /// for a path that carries no reparse point at all (not an error: most
    /// opens hit this case).
    async fn read_mark(&self, path: &str) -> CoreResult<Option<RawMark>>;

    /// Break the reparse point at `path`, owned by `(own_tag, own_guid)`,
    /// and restore the attribute bits a plain file should carry (see
    /// [`crate::Attributes::cleared`]). Idempotent: clearing an
    /// already-cleared path is not an error.
    async fn clear_mark(&self, path: &str, own_tag: u32, own_guid: [u8; 16]) -> CoreResult<()>;
}

/// Lets call sites hold `Arc<dyn ReparseHost>` (as [`crate::ReparseHost`]
/// trait objects do everywhere else in this workspace) and still pass it
/// somewhere that's generic over `H: ReparseHost`, such as
/// `lazyfetch_markstore::MarkStore<H>`.
#[async_trait]
impl ReparseHost for Arc<dyn ReparseHost> {
    async fn read_mark(&self, path: &str) -> CoreResult<Option<RawMark>> {
        (**self).read_mark(path).await
    }

    async fn clear_mark(&self, path: &str, own_tag: u32, own_guid: [u8; 16]) -> CoreResult<()> {
        (**self).clear_mark(path, own_tag, own_guid).await
    }
}

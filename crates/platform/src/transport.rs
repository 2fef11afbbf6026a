//! The core's half of the helper session: sending a notification to the
//! connected helper and awaiting its reply. Commands flow the other
//! direction (helper to core) and are handled by the core's own dispatch
//! loop, so they need no trait here — only the notification path is
//! something the core *initiates* and therefore needs abstracted for
//! testing without a real named port.

use async_trait::async_trait;
use lazyfetch_error::CoreResult;

/// One connected helper session's outbound half.
#[async_trait]
pub trait HelperTransport: Send + Sync {
    /// Send notification `kind` with `data` and await the raw reply
    /// payload. Callers decode the payload per the notification's reply
    /// shape (`{handle}` for `open_in_helper`, `{bytes_copied}` for
    /// `fetch_in_helper`, nothing for `close_in_helper`).
    async fn notify(&self, kind: u32, data: Vec<u8>) -> CoreResult<Vec<u8>>;
}

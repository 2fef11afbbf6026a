//! Handle acquisition: a direct open against the host, falling back to the
//! user-mode helper on access-denied.

use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::{BoxedReader, HelperDelegate, RemoteOpenBackend};

/// Open `remote_path` for reading. Tries `direct` first; if that fails with
/// [`CoreError::AccessDenied`] and a `helper` is supplied, delegates to it.
/// A delegation failure that is itself [`CoreError::Disconnected`] or
/// [`CoreError::Timeout`] is reported as the *original* access-denied error
/// rather than the delegation failure, so callers see one consistent
/// status regardless of which path served the open.
///
/// # Errors
/// Any other failure from either path is returned as-is.
pub async fn open_source(
    direct: &dyn RemoteOpenBackend,
    helper: Option<&dyn HelperDelegate>,
    remote_path: &str,
) -> CoreResult<(BoxedReader, u64)> {
    match direct.open_direct(remote_path).await {
        Ok(opened) => Ok(opened),
        Err(CoreError::AccessDenied(msg)) => {
            let Some(helper) = helper else {
                return Err(CoreError::AccessDenied(msg));
            };
            match helper.open_via_helper(remote_path).await {
                Ok(opened) => Ok(opened),
                Err(CoreError::Disconnected | CoreError::Timeout(_)) => {
                    Err(CoreError::AccessDenied(msg))
                }
                Err(other) => Err(other),
            }
        }
        Err(other) => Err(other),
    }
}

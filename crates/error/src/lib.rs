//! Shared error taxonomy consumed by every LazyFetch crate.
//!
//! The nine kinds below mirror the failure surface a filesystem interposer
//! reports to callers: boundary violations, missing state, recoverable
//! races, helper-session loss, bounded waits, and the lower layer's own I/O
//! failures. Individual crates may define their own narrower error types
//! (see `lazyfetch-helper::HelperTransportError`) but converge on
//! [`CoreError`] once an operation reaches the interception layer.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error kinds a LazyFetch operation can fail with.
///
/// Propagation policy: `AlreadyExists` from a context-creation race is
/// fully recovered by the
/// loser and never escapes to a caller; `NotFound` during the read/write
/// re-check is treated as "already materialized" and also never escapes.
/// Every other variant surfaces to the triggering I/O.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Nullness, size, alignment, or format violation at a boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stub mark, stream context, or config key was expected but absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Informational: the caller lost a context-creation race.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The helper session is absent or was torn down mid-request.
    #[error("helper disconnected")]
    Disconnected,

    /// A bounded wait (I/O completion, helper round-trip) expired.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The lower layer denied the operation outright.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A caller-supplied buffer failed the natural-alignment check.
    #[error("misaligned buffer: expected alignment {expected}, pointer {pointer:#x}")]
    Misaligned {
        /// Required alignment in bytes (4 or pointer-size).
        expected: usize,
        /// The offending pointer value, recorded for diagnostics only.
        pointer: usize,
    },

    /// A stub mark's declared length is inconsistent with its payload.
    #[error("malformed stub mark: {0}")]
    Malformed(String),

    /// An unclassified I/O failure from the lower layer.
    #[error("I/O failed: {0}")]
    IoFailed(#[source] io::Error),
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CoreError::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => CoreError::AccessDenied(err.to_string()),
            io::ErrorKind::TimedOut => CoreError::Timeout(Duration::default()),
            _ => CoreError::IoFailed(err),
        }
    }
}

impl CoreError {
    /// Returns `true` for the two kinds that are locally recoverable and
    /// must never surface past the component that produced them
    /// (context-race losers, and a mark that vanished during the
    /// read/write re-check).
    #[must_use]
    pub const fn is_locally_recoverable(&self) -> bool {
        matches!(self, CoreError::AlreadyExists(_) | CoreError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing mark");
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::NotFound(_)));
        assert!(core.is_locally_recoverable());
    }

    #[test]
    fn io_permission_denied_maps_to_access_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::AccessDenied(_)));
    }

    #[test]
    fn unclassified_io_error_wraps_as_io_failed() {
        let err = io::Error::new(io::ErrorKind::Other, "disk gremlin");
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::IoFailed(_)));
        assert!(!core.is_locally_recoverable());
    }

    #[test]
    fn display_includes_kind_specific_text() {
        let err = CoreError::Misaligned {
            expected: 8,
            pointer: 0x1003,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("misaligned buffer"));
        assert!(rendered.contains("0x1003"));
    }

    #[test]
    fn already_exists_is_locally_recoverable() {
        let err = CoreError::AlreadyExists("context race".into());
        assert!(err.is_locally_recoverable());
    }

    #[test]
    fn disconnected_is_not_locally_recoverable() {
        let err = CoreError::Disconnected;
        assert!(!err.is_locally_recoverable());
    }
}

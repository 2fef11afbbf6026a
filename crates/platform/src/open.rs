//! Open classification and the trusted-pid access/sharing widening.

use bitflags::bitflags;

bitflags! {
    /// Desired-access bits relevant to the interception decision.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessMask: u32 {
        const READ            = 0b0000_0001;
        const WRITE            = 0b0000_0010;
        const OPEN_REPARSE    = 0b0000_0100;
        const RANDOM_ACCESS    = 0b0000_1000;
        const WRITE_THROUGH    = 0b0001_0000;
    }
}

bitflags! {
    /// Sharing bits an opener grants to subsequent openers of the same file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShareMode: u32 {
        const READ  = 0b01;
        const WRITE = 0b10;
    }
}

/// Canonical access the interposer grants a trusted pid: read/write with
/// random access, explicitly without `OPEN_REPARSE` so a trusted caller
/// always sees the materialized stream rather than the reparse point itself.
pub const CANONICAL_ACCESS: AccessMask =
    AccessMask::READ.union(AccessMask::WRITE).union(AccessMask::RANDOM_ACCESS);

/// Canonical sharing a trusted pid's open is widened to, so a second,
/// untrusted opener of the same path is never blocked behind the fetch.
pub const CANONICAL_SHARE: ShareMode = ShareMode::READ.union(ShareMode::WRITE);

/// How the create request resolves an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Open,
    Create,
    OpenIf,
    Overwrite,
    OverwriteIf,
    Supersede,
}

impl Disposition {
    /// `true` for dispositions that fail outright if the file doesn't
    /// already exist (a "strict create" never needs fetch interception: a
    /// brand-new file cannot carry a stub mark).
    #[must_use]
    pub const fn is_strict_create(self) -> bool {
        matches!(self, Disposition::Create)
    }

    /// `true` for dispositions that truncate or replace existing content,
    /// at which point any stub mark on the target is moot.
    #[must_use]
    pub const fn overwrites(self) -> bool {
        matches!(
            self,
            Disposition::Overwrite | Disposition::OverwriteIf | Disposition::Supersede
        )
    }
}

/// Everything the interception layer's open-classification step needs to
/// know about one create/open request.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest {
    pub pid: u32,
    pub access: AccessMask,
    pub share: ShareMode,
    pub disposition: Disposition,
    pub is_regular_file: bool,
    pub is_directory: bool,
    pub open_by_id: bool,
    pub is_volume_open: bool,
    pub is_paging_io: bool,
    /// Set when this open was reissued by the interposer itself (the
    /// re-open performed after clearing a mark); never re-entered.
    pub self_issued: bool,
}

impl OpenRequest {
    /// Whether this open is a candidate for interception at all, independent
    /// of whether the target actually carries a stub mark. Mirrors the
    /// driver's early-out checks: only regular, non-by-id, non-volume,
    /// non-paging, non-self-issued opens of a non-strict-create disposition
    /// are worth a mark lookup.
    #[must_use]
    pub const fn is_interception_candidate(&self) -> bool {
        self.is_regular_file
            && !self.is_directory
            && !self.open_by_id
            && !self.is_volume_open
            && !self.is_paging_io
            && !self.self_issued
            && !self.disposition.is_strict_create()
    }

    /// Widen a trusted pid's request to the canonical access/share pair,
    /// leaving every other field untouched. Applied only after the pid has
    /// been confirmed trusted by the config store.
    #[must_use]
    pub fn widen_for_trusted_pid(mut self) -> Self {
        self.access |= CANONICAL_ACCESS;
        self.share |= CANONICAL_SHARE;
        self
    }
}

/// Result of resolving an open against a stub mark: whether a reparse point
/// was present, and whether the disposition ended up creating or
/// overwriting the target (in which case any mark is now stale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOutcome {
    pub reparse_encountered: bool,
    pub created_or_overwrote: bool,
}

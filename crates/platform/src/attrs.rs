//! File-attribute bits the interception layer inspects or rewrites.

use bitflags::bitflags;

bitflags! {
    /// Subset of a file's attribute bits that the interposer cares about.
    ///
    /// `REPARSE_POINT`, `OFFLINE`, and `NOT_CONTENT_INDEXED` are the three
    /// bits a stub carries while unmaterialized and that `Clear` strips once
    /// the fetch completes; `READONLY` is preserved across the clear rather
    /// than dropped, since the mark-clear rewrite is not a user-visible
    /// attribute change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const READONLY             = 0b0000_0001;
        const DIRECTORY            = 0b0000_0010;
        const SYSTEM                = 0b0000_0100;
        const OFFLINE                = 0b0000_1000;
        const REPARSE_POINT        = 0b0001_0000;
        const NOT_CONTENT_INDEXED = 0b0010_0000;
    }
}

impl Attributes {
    /// Bits a stub mark carries while the file is unmaterialized.
    pub const STUB_BITS: Attributes = Attributes::OFFLINE
        .union(Attributes::REPARSE_POINT)
        .union(Attributes::NOT_CONTENT_INDEXED);

    /// Attributes after `Clear` has run: stub bits gone, `READONLY`
    /// preserved verbatim from the pre-clear value.
    #[must_use]
    pub fn cleared(self) -> Attributes {
        (self & !Attributes::STUB_BITS) | (self & Attributes::READONLY)
    }

    /// Cosmetic fix-up applied to directory-enumeration results: clears the
    /// `OFFLINE` bit so a directory listing doesn't show stub entries as
    /// offline once their mark has already been cleared underneath.
    #[must_use]
    pub fn without_offline(self) -> Attributes {
        self & !Attributes::OFFLINE
    }
}

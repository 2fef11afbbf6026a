//! Directory-enumeration cosmetic fix-up: clearing `OFFLINE` on entries
//! that look like stubs, so a listing doesn't show offline files whose
//! mark has already been cleared underneath. Never touches data.

use lazyfetch_platform::Attributes;

/// An entry "looks like a stub" if it's neither a directory nor a system
/// file and still carries the reparse-point bit.
#[must_use]
pub fn fixup_directory_entry(is_directory: bool, is_system: bool, attrs: Attributes) -> Attributes {
    let looks_like_stub = !is_directory && !is_system && attrs.contains(Attributes::REPARSE_POINT);
    if looks_like_stub {
        attrs.without_offline()
    } else {
        attrs
    }
}

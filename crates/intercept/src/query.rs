//! Size and attribute spoofing for query-information classes that report
//! file size (`std`, `eof`, `all`, `network-open`).

use lazyfetch_context::StreamContext;
use lazyfetch_platform::Attributes;

/// Substitute the context's `remote_size` when the lower layer reported
/// zero and a stream context is still attached, and always strip
/// `OFFLINE`/`REPARSE_POINT` so a memory-mapping caller allocates the
/// right section size.
#[must_use]
pub fn spoof_query_information(
    context: Option<&StreamContext>,
    reported_size: u64,
    attrs: Attributes,
) -> (u64, Attributes) {
    let size = if reported_size == 0 {
        context.map_or(reported_size, |ctx| ctx.remote_size)
    } else {
        reported_size
    };
    let attrs = attrs & !(Attributes::OFFLINE | Attributes::REPARSE_POINT);
    (size, attrs)
}

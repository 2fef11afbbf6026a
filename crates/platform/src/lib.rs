//! The host-OS contract the LazyFetch core is written against.
//!
//! Everything in this crate is a trait or a plain-data type; no module here
//! touches a real filesystem, reparse point, or socket. Real host bindings
//! are out of scope — `lazyfetch-testkit` supplies in-memory fakes that
//! every other crate's test suite builds against, and a production build
//! would plug in host-specific adapters satisfying the same traits.

pub mod attrs;
pub mod open;
pub mod reparse;
pub mod source;
pub mod transport;

pub use attrs::Attributes;
pub use open::{
    AccessMask, Disposition, OpenOutcome, OpenRequest, ShareMode, CANONICAL_ACCESS, CANONICAL_SHARE,
};
pub use reparse::{RawMark, ReparseHost};
pub use source::{BoxedReader, HelperDelegate, LocalFile, RemoteOpenBackend};
pub use transport::HelperTransport;

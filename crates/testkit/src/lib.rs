//! In-memory fakes for the host-OS contract (`lazyfetch-platform`) and the
//! opaque configuration source (`lazyfetch-config`). Every crate's test
//! suite that needs more than a locally-defined stub builds on these
//! instead of re-deriving the same fakes.

mod config;
mod reparse;
mod source;
mod transport;

pub use config::FakeConfigSource;
pub use reparse::FakeReparseHost;
pub use source::{FakeHelperDelegate, FakeLocalFile, FakeRemoteOpenBackend};
pub use transport::FakeHelperTransport;

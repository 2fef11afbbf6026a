//! The I/O interception state machine: open classification, the
//! read/write/section-acquire pre-handler, query-information spoofing,
//! directory-enumeration fix-up, and observation-event sampling.

mod enumeration;
mod interceptor;
mod query;
mod sampler;

pub use enumeration::fixup_directory_entry;
pub use interceptor::{Interceptor, ObservationSink, OpenDecision};
pub use query::spoof_query_information;
pub use sampler::{RandSampler, Sampler};

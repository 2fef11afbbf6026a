//! The pipelined chunked copy engine.
//!
//! Copies `remote_size` bytes (or until the source's actual end, whichever
//! is smaller) from an async byte source into a local stub, overlapping
//! reads and writes so the pipeline stays full rather than alternating
//! read-then-write in lockstep. The reader runs as its own task; it hands
//! completed chunks to the writer over a bounded channel, so the channel's
//! capacity *is* the bound on how far ahead the reader is allowed to get,
//! expressed as backpressure instead of an explicit buffer pool. A channel
//! also preserves send order for free, which is what guarantees writes
//! land in the same order the corresponding reads were issued.

mod engine;
mod opener;

pub use engine::{FetchEngine, CHUNK_SIZE, IO_TIMEOUT, MAX_CHUNKS};
pub use opener::open_source;

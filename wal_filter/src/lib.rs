//! Streaming WAL filter: reassembles records from a page-aligned byte
//! stream, decides per-record whether the relations it touches should
//! survive, and rewrites dropped records to same-length no-ops.
//!
//! The public surface is [`WalFilter`]; everything else here is the
//! machinery it's built from.

mod error;
mod filter;
mod reassembly;
mod relfileset;
mod segment_fetcher;

pub use error::WalFilterError;
pub use filter::{PgVersion, WalFilter, WalFilterConfig};
pub use reassembly::ReassemblyState;
pub use relfileset::RelFileSet;
pub use segment_fetcher::{ArchiveReader, SegmentFetcher};

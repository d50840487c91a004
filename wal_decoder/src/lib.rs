//! Version-specific WAL record decoders.
//!
//! A [`WalInterface`] implementation knows how to parse, validate, and
//! selectively rewrite records in exactly one on-disk format. `wal_filter`
//! picks the right implementation once, from the first page's magic number,
//! and then drives it through a resumable reassembly loop.

mod error;
mod gpdb6;
mod gpdb7;
mod interface;

pub use error::DecodeError;
pub use gpdb6::Gpdb6Decoder;
pub use gpdb7::Gpdb7Decoder;
pub use interface::{FilterDecision, RecordHeader, WalInterface};

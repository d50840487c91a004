//!
//! Wire-format primitives shared by every WAL record decoder: page
//! headers, the common prefix all XLogRecord layouts share, RelFileNode,
//! CRC-32C, and the segment/page alignment arithmetic.
//!
//! Nothing in this crate knows about resource managers or record bodies;
//! that lives in `wal_decoder`.
//!

mod crc32c;
mod page;
mod relfilenode;
pub mod pg_constants;
pub mod xlog_utils;

pub use crc32c::Crc32c;
pub use page::{
    LongPageHeader, PageHeader, PageHeaderError, XLOG_SIZE_OF_XLOG_LONG_PHD,
    XLOG_SIZE_OF_XLOG_SHORT_PHD,
};
pub use relfilenode::RelFileNode;

/// Database/relation/tablespace identifier. Never interpreted, only compared.
pub type Oid = u32;
/// Transaction id, opaque to this crate.
pub type TransactionId = u32;
/// Absolute byte offset into the WAL stream.
pub type XLogRecPtr = u64;
/// Timeline identifier.
pub type TimeLineID = u32;
/// Block number within a relation fork.
pub type BlockNumber = u32;
/// WAL segment number (0-based, counted across all timelines of the same id).
pub type XLogSegNo = u64;

/// Maximum alignment boundary PostgreSQL pads records and inter-page gaps to.
pub const MAXIMUM_ALIGNOF: usize = 8;

/// Round `len` up to the next `MAXIMUM_ALIGNOF` boundary.
///
/// Misaligning this by even one byte silently corrupts every page after the
/// first one in the segment being written.
pub const fn maxalign(len: usize) -> usize {
    (len + (MAXIMUM_ALIGNOF - 1)) & !(MAXIMUM_ALIGNOF - 1)
}

/// Read the `xl_tot_len` field that both supported record formats place as
/// the first four little-endian bytes of the record header.
///
/// This lets the reassembler learn a record's total length before it knows
/// (or cares) which decoder will parse the rest of the header.
pub fn peek_xl_tot_len(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[0..4].try_into().expect("buffer must contain xl_tot_len"))
}

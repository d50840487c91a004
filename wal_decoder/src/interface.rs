use postgres_ffi::{RelFileNode, TransactionId};

use crate::error::DecodeError;

/// The handful of `XLogRecord` header fields every version-specific decoder
/// exposes, regardless of how the rest of its header is laid out.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub xl_tot_len: u32,
    pub xl_xid: TransactionId,
    pub xl_rmid: u8,
    /// Raw `xl_info` byte, rmgr-private high bits included.
    pub xl_info: u8,
}

impl RecordHeader {
    /// `xl_info` with the rmgr-private high bits masked off.
    pub fn opcode(&self) -> u8 {
        self.xl_info & !postgres_ffi::pg_constants::XLR_INFO_MASK
    }
}

/// Outcome of filtering a single record against a `RelFileNode` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Every relation this record touches passed the filter (or it touches
    /// none at all); the record is emitted unchanged.
    Keep,
    /// No relation this record touches passed the filter; `filter_record`
    /// has already rewritten the record bytes in place to an `XLOG_NOOP`
    /// record of identical length and recomputed its checksum.
    RewrittenToNoop,
}

/// The per-version behavior a reassembler needs: how to parse and validate a
/// record's header, how to recognize a WAL-switch record, and how to decide
/// (and apply) the keep/no-op filtering decision for a record.
///
/// Mirrors the original's `WalInterface` function-pointer table: one
/// implementation of this trait per supported PostgreSQL/GPDB major version.
pub trait WalInterface {
    /// Expected `xlp_magic` value for pages written by this version.
    fn header_magic(&self) -> u16;

    /// Fixed size of this version's `XLogRecord` header, in bytes.
    fn header_size(&self) -> usize;

    /// Parse the fixed-size header from the start of `raw`. `raw` must be at
    /// least `header_size()` bytes.
    fn decode_header(&self, raw: &[u8]) -> RecordHeader;

    /// Structural sanity checks performable from the header alone (total
    /// length bounds, rmgr id range, the `XLOG_SWITCH` zero-length rule).
    /// `header_raw` is exactly `header_size()` bytes, the header copied out
    /// of the page before the rest of the record is available.
    fn validate_header(&self, header_raw: &[u8], header: &RecordHeader) -> Result<(), DecodeError>;

    /// Full-record checks requiring the record body: backup-block layout and
    /// the CRC-32C checksum.
    fn validate_record(&self, record: &[u8], header: &RecordHeader) -> Result<(), DecodeError>;

    /// `true` if this record is the end-of-segment `XLOG_SWITCH` marker,
    /// which every version encodes identically: rmgr `RM_XLOG_ID`, raw
    /// (unmasked) `xl_info` equal to `XLOG_SWITCH`.
    fn is_wal_switch(&self, header: &RecordHeader) -> bool {
        header.xl_rmid == postgres_ffi::pg_constants::RM_XLOG_ID
            && header.xl_info == postgres_ffi::pg_constants::xlog_info::XLOG_SWITCH
    }

    /// Decide whether `record` should pass through unchanged or be rewritten
    /// to a same-length `XLOG_NOOP`, given `is_needed` as the relation
    /// filter. On `RewrittenToNoop`, `record`'s bytes (including its
    /// checksum) have already been updated in place.
    fn filter_record(
        &self,
        record: &mut [u8],
        header: &RecordHeader,
        is_needed: &dyn Fn(&RelFileNode) -> bool,
    ) -> Result<FilterDecision, DecodeError>;
}

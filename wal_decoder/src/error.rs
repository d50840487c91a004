use thiserror::Error;

/// Errors raised while decoding or filtering a single WAL record.
///
/// `wal_filter` folds this into its own `WalFilterError::Format` /
/// `WalFilterError::Config` variants; it's kept separate here so a decoder
/// can be unit-tested without depending on the reassembler.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid record length: wanted at least {wanted}, got {got}")]
    InvalidRecordLength { wanted: usize, got: u32 },

    #[error("record with zero rmgr-data length")]
    ZeroLength,

    #[error("invalid resource manager id {0}")]
    InvalidRmgrId(u8),

    #[error("incorrect backup block size in record")]
    InvalidBackupBlockSize,

    #[error("incorrect hole size in record")]
    InvalidHoleSize,

    #[error("incorrect resource manager data checksum: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("invalid block_id {0}")]
    InvalidBlockId(u8),

    #[error("out-of-order block_id {0}")]
    OutOfOrderBlockId(u8),

    #[error("BKPBLOCK_HAS_DATA set, but no data included")]
    MissingBlockData,

    #[error("BKPBLOCK_HAS_DATA not set, but data length is {0}")]
    UnexpectedBlockData(u16),

    #[error("BKPBLOCK_SAME_REL set but no previous relation in this record")]
    MissingPreviousRelation,

    #[error("unknown record within resource manager {rmgr}: info {info:#04x}")]
    UnknownRecordInfo { rmgr: u8, info: u8 },

    #[error(
        "the following RelFileNodes cannot be filtered out because they appear in the same \
         record as a RelFileNode that passes the filter: {offenders}. \
         HINT: add these RelFileNodes to your filter"
    )]
    MixedRelationFilter { offenders: String },
}

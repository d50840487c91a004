use bytes::Buf;
use thiserror::Error;

use crate::pg_constants::XLP_LONG_HEADER;
use crate::{TimeLineID, XLogRecPtr};

/// `MAXALIGN(sizeof(XLogPageHeaderData))`.
pub const XLOG_SIZE_OF_XLOG_SHORT_PHD: usize = 24;
/// `MAXALIGN(sizeof(XLogLongPageHeaderData))`.
pub const XLOG_SIZE_OF_XLOG_LONG_PHD: usize = 40;

#[derive(Debug, Error)]
pub enum PageHeaderError {
    #[error("page header truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("unrecognized page magic {0:#06x}")]
    BadMagic(u16),
}

/// A parsed WAL page header. Carries only the fields the filter inspects;
/// the header's on-disk bytes are never re-encoded, only copied verbatim
/// from input to output, so this type has no `encode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub magic: u16,
    pub info: u16,
    pub tli: TimeLineID,
    pub page_addr: XLogRecPtr,
    pub rem_len: u32,
    pub long_header: Option<LongPageHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPageHeader {
    pub sysid: u64,
    pub seg_size: u32,
    pub xlog_blcksz: u32,
}

impl PageHeader {
    /// `true` if `xlp_info & XLP_LONG_HEADER` is set.
    pub fn is_long(&self) -> bool {
        self.info & XLP_LONG_HEADER != 0
    }

    /// On-disk size of this header: `XLOG_SIZE_OF_XLOG_LONG_PHD` for the
    /// first page of a segment, `XLOG_SIZE_OF_XLOG_SHORT_PHD` otherwise.
    pub fn size(&self) -> usize {
        if self.is_long() {
            XLOG_SIZE_OF_XLOG_LONG_PHD
        } else {
            XLOG_SIZE_OF_XLOG_SHORT_PHD
        }
    }

    /// Decode a page header from the start of `buf`. Does not validate the
    /// magic number against an expected version; callers compare `magic`
    /// against the decoder's known value themselves (a mismatch mid-stream
    /// means the WAL data itself is wrong, reported as a format error, not
    /// a version-not-supported error — that's reserved for the
    /// construction-time `pgVersion`/`pgFork` check).
    pub fn decode(buf: &[u8]) -> Result<Self, PageHeaderError> {
        if buf.len() < XLOG_SIZE_OF_XLOG_SHORT_PHD {
            return Err(PageHeaderError::Truncated {
                needed: XLOG_SIZE_OF_XLOG_SHORT_PHD,
                have: buf.len(),
            });
        }
        let mut cur = &buf[..XLOG_SIZE_OF_XLOG_SHORT_PHD];
        let magic = cur.get_u16_le();
        let info = cur.get_u16_le();
        let tli = cur.get_u32_le();
        let page_addr = cur.get_u64_le();
        let rem_len = cur.get_u32_le();

        let is_long = info & XLP_LONG_HEADER != 0;
        let long_header = if is_long {
            if buf.len() < XLOG_SIZE_OF_XLOG_LONG_PHD {
                return Err(PageHeaderError::Truncated {
                    needed: XLOG_SIZE_OF_XLOG_LONG_PHD,
                    have: buf.len(),
                });
            }
            let mut tail = &buf[XLOG_SIZE_OF_XLOG_SHORT_PHD..XLOG_SIZE_OF_XLOG_LONG_PHD];
            Some(LongPageHeader {
                sysid: tail.get_u64_le(),
                seg_size: tail.get_u32_le(),
                xlog_blcksz: tail.get_u32_le(),
            })
        } else {
            None
        };

        Ok(PageHeader { magic, info, tli, page_addr, rem_len, long_header })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_header_bytes(magic: u16, info: u16, rem_len: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&magic.to_le_bytes());
        buf.extend_from_slice(&info.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&rem_len.to_le_bytes());
        buf.resize(XLOG_SIZE_OF_XLOG_SHORT_PHD, 0);
        buf
    }

    #[test]
    fn decodes_short_header() {
        let buf = short_header_bytes(0xD106, 0, 0);
        let hdr = PageHeader::decode(&buf).unwrap();
        assert!(!hdr.is_long());
        assert_eq!(hdr.size(), XLOG_SIZE_OF_XLOG_SHORT_PHD);
        assert!(hdr.long_header.is_none());
    }

    #[test]
    fn decodes_long_header() {
        let mut buf = short_header_bytes(0xD106, XLP_LONG_HEADER, 0);
        buf.resize(XLOG_SIZE_OF_XLOG_LONG_PHD, 0);
        buf[XLOG_SIZE_OF_XLOG_SHORT_PHD..XLOG_SIZE_OF_XLOG_SHORT_PHD + 8]
            .copy_from_slice(&123456789u64.to_le_bytes());
        let hdr = PageHeader::decode(&buf).unwrap();
        assert!(hdr.is_long());
        assert_eq!(hdr.size(), XLOG_SIZE_OF_XLOG_LONG_PHD);
        assert_eq!(hdr.long_header.unwrap().sysid, 123456789);
    }

    #[test]
    fn rejects_truncated_header() {
        let buf = vec![0u8; 4];
        assert!(matches!(PageHeader::decode(&buf), Err(PageHeaderError::Truncated { .. })));
    }
}

//! Decoder for the GPDB7 / PostgreSQL 12-era record format: a 24-byte
//! header followed by a sequence of block-reference sub-headers and a
//! trailing main-data fragment.

use bytes::Buf;
use postgres_ffi::pg_constants::{rmgr_gpdb7::*, xlog_info::*, xlr_gpdb7::*, RM_XLOG_ID};
use postgres_ffi::{Crc32c, RelFileNode};

use crate::error::DecodeError;
use crate::interface::{FilterDecision, RecordHeader, WalInterface};

pub const HEADER_SIZE: usize = 24;
const XL_CRC_OFFSET: usize = 20;

pub struct Gpdb7Decoder {
    pub heap_page_size: usize,
}

impl Gpdb7Decoder {
    pub fn new(heap_page_size: usize) -> Self {
        Gpdb7Decoder { heap_page_size }
    }

    /// Walk the block-reference / main-data sub-header stream, returning the
    /// `RelFileNode` of every block reference (inheriting the previous one
    /// under `BKPBLOCK_SAME_REL`) followed by the main-data fragment's
    /// `RelFileNode`, if it carries one.
    fn extract_relfilenodes(&self, header: &RecordHeader, record: &[u8]) -> Result<Vec<RelFileNode>, DecodeError> {
        let mut nodes = Vec::new();
        let mut offset = HEADER_SIZE;
        let mut datatotal: usize = 0;
        let mut max_block_id: i16 = -1;
        let mut last_node: Option<RelFileNode> = None;
        let mut main_data_size: usize = 0;

        while record.len() - offset > datatotal {
            let block_id = record[offset];
            offset += 1;

            if block_id == XLR_BLOCK_ID_DATA_SHORT {
                main_data_size = record[offset] as usize;
                offset += 1;
                break;
            }
            if block_id == XLR_BLOCK_ID_DATA_LONG {
                main_data_size = u32::from_le_bytes(record[offset..offset + 4].try_into().unwrap()) as usize;
                offset += 4;
                break;
            }
            if block_id == XLR_BLOCK_ID_ORIGIN {
                offset += 2; // RepOriginId
                continue;
            }
            if block_id > XLR_MAX_BLOCK_ID {
                return Err(DecodeError::InvalidBlockId(block_id));
            }
            if (block_id as i16) <= max_block_id {
                return Err(DecodeError::OutOfOrderBlockId(block_id));
            }
            max_block_id = block_id as i16;

            let fork_flags = record[offset];
            offset += 1;
            let data_len = u16::from_le_bytes(record[offset..offset + 2].try_into().unwrap());
            offset += 2;

            if fork_flags & BKPBLOCK_HAS_DATA != 0 {
                if data_len == 0 {
                    return Err(DecodeError::MissingBlockData);
                }
            } else if data_len != 0 {
                return Err(DecodeError::UnexpectedBlockData(data_len));
            }
            datatotal += data_len as usize;

            if fork_flags & BKPBLOCK_HAS_IMAGE != 0 {
                let bimg_len = u16::from_le_bytes(record[offset..offset + 2].try_into().unwrap());
                let hole_offset = u16::from_le_bytes(record[offset + 2..offset + 4].try_into().unwrap());
                let bimg_info = record[offset + 4];
                offset += 5;
                let hole_length = if bimg_info & BKPIMAGE_IS_COMPRESSED != 0 {
                    if bimg_info & BKPIMAGE_HAS_HOLE != 0 {
                        let v = u16::from_le_bytes(record[offset..offset + 2].try_into().unwrap());
                        offset += 2;
                        v
                    } else {
                        0
                    }
                } else {
                    (self.heap_page_size as u16).wrapping_sub(bimg_len)
                };
                datatotal += bimg_len as usize;

                if bimg_info & BKPIMAGE_HAS_HOLE != 0
                    && (hole_offset == 0 || hole_length == 0 || bimg_len as usize == self.heap_page_size)
                {
                    return Err(DecodeError::InvalidHoleSize);
                }
                if bimg_info & BKPIMAGE_HAS_HOLE == 0 && (hole_offset != 0 || hole_length != 0) {
                    return Err(DecodeError::InvalidHoleSize);
                }
                if bimg_info & BKPIMAGE_IS_COMPRESSED != 0 && bimg_len as usize == self.heap_page_size {
                    return Err(DecodeError::InvalidHoleSize);
                }
            }

            if fork_flags & BKPBLOCK_SAME_REL != 0 {
                if last_node.is_none() {
                    return Err(DecodeError::MissingPreviousRelation);
                }
            } else {
                let node = RelFileNode::decode(&mut &record[offset..offset + 12]);
                offset += 12;
                nodes.push(node);
                last_node = Some(node);
            }
            offset += 4; // BlockNumber
        }

        if main_data_size > 0 {
            let main_data = &record[record.len() - main_data_size..];
            if let Some(node) = self.relfilenode_from_main_data(header, main_data)? {
                nodes.push(node);
            }
        }

        Ok(nodes)
    }

    fn relfilenode_from_main_data(&self, header: &RecordHeader, main_data: &[u8]) -> Result<Option<RelFileNode>, DecodeError> {
        let info = header.opcode();
        let node_at_start = |buf: &[u8]| RelFileNode::decode(&mut &buf[..12]);

        Ok(match header.xl_rmid {
            RM_SMGR_ID => match info {
                XLOG_SMGR_CREATE => Some(node_at_start(main_data)),
                XLOG_SMGR_TRUNCATE => Some(node_at_start(&main_data[4..])),
                other => return Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_HEAP2_ID => match info {
                XLOG_HEAP2_CLEANUP_INFO => Some(node_at_start(main_data)),
                XLOG_HEAP2_NEW_CID => Some(node_at_start(&main_data[16..])),
                _ => None,
            },
            RM_BTREE_ID if info == XLOG_BTREE_REUSE_PAGE => Some(node_at_start(main_data)),
            RM_GIN_ID if info == XLOG_GIN_SPLIT || info == XLOG_GIN_UPDATE_META_PAGE => Some(node_at_start(main_data)),
            RM_GIST_ID if info == XLOG_GIST_PAGE_REUSE => Some(node_at_start(main_data)),
            RM_SEQ_ID => {
                if info == XLOG_SEQ_LOG {
                    Some(node_at_start(main_data))
                } else {
                    return Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info });
                }
            }
            RM_BITMAP_ID => match info {
                XLOG_BITMAP_INSERT_WORDS | XLOG_BITMAP_UPDATEWORD | XLOG_BITMAP_UPDATEWORDS
                | XLOG_BITMAP_INSERT_LOVITEM | XLOG_BITMAP_INSERT_BITMAP_LASTWORDS
                | XLOG_BITMAP_INSERT_META => Some(node_at_start(main_data)),
                _ => None,
            },
            RM_APPEND_ONLY_ID => match info {
                XLOG_APPENDONLY_INSERT | XLOG_APPENDONLY_TRUNCATE => Some(node_at_start(main_data)),
                other => return Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            _ => None,
        })
    }
}

impl WalInterface for Gpdb7Decoder {
    fn header_magic(&self) -> u16 {
        postgres_ffi::pg_constants::XLOG_PAGE_MAGIC_GPDB7
    }

    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn decode_header(&self, raw: &[u8]) -> RecordHeader {
        let mut cur = raw;
        let xl_tot_len = cur.get_u32_le();
        let xl_xid = cur.get_u32_le();
        let _xl_prev = cur.get_u64_le();
        let xl_info = cur.get_u8();
        let xl_rmid = cur.get_u8();
        RecordHeader { xl_tot_len, xl_xid, xl_rmid, xl_info }
    }

    fn validate_header(&self, _header_raw: &[u8], header: &RecordHeader) -> Result<(), DecodeError> {
        if (header.xl_tot_len as usize) < HEADER_SIZE {
            return Err(DecodeError::InvalidRecordLength { wanted: HEADER_SIZE, got: header.xl_tot_len });
        }
        if header.xl_rmid > RM_MAX_ID {
            return Err(DecodeError::InvalidRmgrId(header.xl_rmid));
        }
        Ok(())
    }

    fn validate_record(&self, record: &[u8], _header: &RecordHeader) -> Result<(), DecodeError> {
        let crc = Crc32c::init()
            .update(&record[HEADER_SIZE..])
            .update(&record[0..XL_CRC_OFFSET])
            .finish();
        let expected = u32::from_le_bytes(record[XL_CRC_OFFSET..XL_CRC_OFFSET + 4].try_into().unwrap());
        if crc != expected {
            return Err(DecodeError::ChecksumMismatch { expected, computed: crc });
        }
        Ok(())
    }

    fn filter_record(
        &self,
        record: &mut [u8],
        header: &RecordHeader,
        is_needed: &dyn Fn(&RelFileNode) -> bool,
    ) -> Result<FilterDecision, DecodeError> {
        if header.xl_rmid == RM_XLOG_ID && header.opcode() == XLOG_NOOP {
            return Ok(FilterDecision::Keep);
        }

        let nodes = self.extract_relfilenodes(header, record)?;
        if nodes.is_empty() {
            return Ok(FilterDecision::Keep);
        }

        let mut pass = false;
        let mut dropped = Vec::new();
        for node in &nodes {
            if is_needed(node) {
                pass = true;
            } else {
                dropped.push(*node);
            }
        }

        if pass && !dropped.is_empty() {
            let offenders = dropped
                .iter()
                .map(|n| format!("{{{}, {}, {}}}", n.spcnode, n.dbnode, n.relnode))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DecodeError::MixedRelationFilter { offenders });
        }
        if pass {
            return Ok(FilterDecision::Keep);
        }

        self.override_body(record);
        record[16] = XLOG_NOOP;
        record[17] = RM_XLOG_ID;
        let crc = Crc32c::init()
            .update(&record[HEADER_SIZE..])
            .update(&record[0..XL_CRC_OFFSET])
            .finish();
        record[XL_CRC_OFFSET..XL_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        Ok(FilterDecision::RewrittenToNoop)
    }
}

impl Gpdb7Decoder {
    /// Replace the sub-record stream with a single main-data header
    /// spanning from end-of-header to end-of-record: short form if the
    /// remaining length fits in a byte, long form otherwise.
    fn override_body(&self, record: &mut [u8]) {
        let remaining_short = record.len() - HEADER_SIZE - 2;
        if remaining_short <= u8::MAX as usize {
            record[HEADER_SIZE] = XLR_BLOCK_ID_DATA_SHORT;
            record[HEADER_SIZE + 1] = remaining_short as u8;
        } else {
            let remaining_long = record.len() - HEADER_SIZE - 5;
            record[HEADER_SIZE] = XLR_BLOCK_ID_DATA_LONG;
            record[HEADER_SIZE + 1..HEADER_SIZE + 5].copy_from_slice(&(remaining_long as u32).to_le_bytes());
        }
    }
}

//! Decoder for the GPDB6 / PostgreSQL 9.4-era record format: a fixed
//! 32-byte header carrying `xl_len` inline, followed by rmgr data and up to
//! four inline backup blocks flagged by bits in `xl_info`.

use bytes::Buf;
use postgres_ffi::pg_constants::{rmgr_gpdb6::*, xlog_info::*, xlr_gpdb6::*, RM_XLOG_ID};
use postgres_ffi::{Crc32c, RelFileNode};

use crate::error::DecodeError;
use crate::interface::{FilterDecision, RecordHeader, WalInterface};

pub const HEADER_SIZE: usize = 32;
const XLOG_HEAP_OPMASK: u8 = 0x70;
/// `RelFileNode`(12) + `ForkNumber` as i32(4) + `BlockNumber`(4) + hole_offset(2) + hole_length(2).
const BKP_BLOCK_SIZE: usize = 24;

pub struct Gpdb6Decoder {
    pub heap_page_size: usize,
}

impl Gpdb6Decoder {
    pub fn new(heap_page_size: usize) -> Self {
        Gpdb6Decoder { heap_page_size }
    }

    fn xl_len(&self, record: &[u8]) -> u32 {
        u32::from_le_bytes(record[8..12].try_into().unwrap())
    }

    fn xl_crc_offset() -> usize {
        24
    }

    fn main_data(&self, record: &[u8]) -> &[u8] {
        let len = self.xl_len(record) as usize;
        &record[HEADER_SIZE..HEADER_SIZE + len]
    }

    /// Extract the `RelFileNode` this record's rmgr data references, if any.
    fn extract_relfilenode(&self, header: &RecordHeader, main_data: &[u8]) -> Result<Option<RelFileNode>, DecodeError> {
        let info = header.opcode();
        let node_at_start = |buf: &[u8]| RelFileNode::decode(&mut &buf[..12]);

        match header.xl_rmid {
            RM_XLOG_ID => match info {
                XLOG_CHECKPOINT_SHUTDOWN | XLOG_CHECKPOINT_ONLINE | XLOG_NOOP | XLOG_NEXTOID
                | XLOG_NEXTRELFILENODE | XLOG_RESTORE_POINT | XLOG_BACKUP_END
                | XLOG_PARAMETER_CHANGE | XLOG_FPW_CHANGE | XLOG_END_OF_RECOVERY
                | XLOG_OVERWRITE_CONTRECORD | XLOG_SWITCH => Ok(None),
                XLOG_FPI => Ok(Some(node_at_start(main_data))),
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_SMGR_ID => match info {
                XLOG_SMGR_CREATE => Ok(Some(node_at_start(main_data))),
                XLOG_SMGR_TRUNCATE => {
                    // xl_smgr_truncate { blkno: u32, rnode: RelFileNode }
                    Ok(Some(node_at_start(&main_data[4..])))
                }
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_HEAP2_ID => {
                let masked = info & XLOG_HEAP_OPMASK;
                if masked == XLOG_HEAP2_NEW_CID {
                    // xl_heap_new_cid { top_xid, cmin, cmax, combocid: u32 each, target: RelFileNode }
                    Ok(Some(node_at_start(&main_data[16..])))
                } else if masked == XLOG_HEAP2_REWRITE {
                    Ok(None)
                } else {
                    Ok(Some(node_at_start(main_data)))
                }
            }
            RM_HEAP_ID => {
                let masked = info & XLOG_HEAP_OPMASK;
                if masked == XLOG_HEAP_MOVE {
                    return Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info });
                }
                Ok(Some(node_at_start(main_data)))
            }
            RM_BTREE_ID => match info {
                XLOG_BTREE_INSERT_LEAF | XLOG_BTREE_INSERT_UPPER | XLOG_BTREE_INSERT_META
                | XLOG_BTREE_SPLIT_L | XLOG_BTREE_SPLIT_R | XLOG_BTREE_SPLIT_L_ROOT
                | XLOG_BTREE_SPLIT_R_ROOT | XLOG_BTREE_VACUUM | XLOG_BTREE_DELETE
                | XLOG_BTREE_MARK_PAGE_HALFDEAD | XLOG_BTREE_UNLINK_PAGE_META
                | XLOG_BTREE_UNLINK_PAGE | XLOG_BTREE_NEWROOT | XLOG_BTREE_REUSE_PAGE => {
                    Ok(Some(node_at_start(main_data)))
                }
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_GIN_ID => match info {
                XLOG_GIN_CREATE_INDEX | XLOG_GIN_CREATE_PTREE | XLOG_GIN_INSERT | XLOG_GIN_SPLIT
                | XLOG_GIN_VACUUM_PAGE | XLOG_GIN_VACUUM_DATA_LEAF_PAGE | XLOG_GIN_DELETE_PAGE
                | XLOG_GIN_UPDATE_META_PAGE | XLOG_GIN_INSERT_LISTPAGE
                | XLOG_GIN_DELETE_LISTPAGE => Ok(Some(node_at_start(main_data))),
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_GIST_ID => match info {
                XLOG_GIST_PAGE_UPDATE | XLOG_GIST_PAGE_SPLIT | XLOG_GIST_CREATE_INDEX => {
                    Ok(Some(node_at_start(main_data)))
                }
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_SEQ_ID => {
                if info == XLOG_SEQ_LOG {
                    Ok(Some(node_at_start(main_data)))
                } else {
                    Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info })
                }
            }
            RM_SPGIST_ID => match info {
                XLOG_SPGIST_CREATE_INDEX | XLOG_SPGIST_ADD_LEAF | XLOG_SPGIST_MOVE_LEAFS
                | XLOG_SPGIST_ADD_NODE | XLOG_SPGIST_SPLIT_TUPLE | XLOG_SPGIST_PICKSPLIT
                | XLOG_SPGIST_VACUUM_LEAF | XLOG_SPGIST_VACUUM_ROOT
                | XLOG_SPGIST_VACUUM_REDIRECT => Ok(Some(node_at_start(main_data))),
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_BITMAP_ID => match info {
                XLOG_BITMAP_INSERT_LOVITEM | XLOG_BITMAP_INSERT_META
                | XLOG_BITMAP_INSERT_BITMAP_LASTWORDS | XLOG_BITMAP_INSERT_WORDS
                | XLOG_BITMAP_UPDATEWORD | XLOG_BITMAP_UPDATEWORDS => {
                    Ok(Some(node_at_start(main_data)))
                }
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_APPEND_ONLY_ID => match info {
                XLOG_APPENDONLY_INSERT | XLOG_APPENDONLY_TRUNCATE => Ok(Some(node_at_start(main_data))),
                other => Err(DecodeError::UnknownRecordInfo { rmgr: header.xl_rmid, info: other }),
            },
            RM_XACT_ID | RM_CLOG_ID | RM_DBASE_ID | RM_TBLSPC_ID | RM_MULTIXACT_ID
            | RM_RELMAP_ID | RM_STANDBY_ID | RM_DISTRIBUTEDLOG_ID => Ok(None),
            RM_HASH_ID => Err(DecodeError::InvalidRmgrId(header.xl_rmid)),
            other => Err(DecodeError::InvalidRmgrId(other)),
        }
    }
}

impl WalInterface for Gpdb6Decoder {
    fn header_magic(&self) -> u16 {
        postgres_ffi::pg_constants::XLOG_PAGE_MAGIC_GPDB6
    }

    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn decode_header(&self, raw: &[u8]) -> RecordHeader {
        let mut cur = raw;
        let xl_tot_len = cur.get_u32_le();
        let xl_xid = cur.get_u32_le();
        let _xl_len = cur.get_u32_le();
        let xl_info = cur.get_u8();
        let xl_rmid = cur.get_u8();
        RecordHeader { xl_tot_len, xl_xid, xl_rmid, xl_info }
    }

    fn validate_header(&self, header_raw: &[u8], header: &RecordHeader) -> Result<(), DecodeError> {
        let len = self.xl_len(header_raw) as usize;
        let is_switch = header.xl_rmid == RM_XLOG_ID && header.xl_info == XLOG_SWITCH;
        if is_switch {
            if len != 0 {
                return Err(DecodeError::InvalidRecordLength { wanted: 0, got: len as u32 });
            }
        } else if len == 0 {
            return Err(DecodeError::ZeroLength);
        }
        let max_body = XLR_MAX_BKP_BLOCKS * (BKP_BLOCK_SIZE + self.heap_page_size);
        if (header.xl_tot_len as usize) < HEADER_SIZE + len
            || (header.xl_tot_len as usize) > HEADER_SIZE + len + max_body
        {
            return Err(DecodeError::InvalidRecordLength { wanted: HEADER_SIZE + len, got: header.xl_tot_len });
        }
        if header.xl_rmid > RM_MAX_ID {
            return Err(DecodeError::InvalidRmgrId(header.xl_rmid));
        }
        Ok(())
    }

    fn validate_record(&self, record: &[u8], header: &RecordHeader) -> Result<(), DecodeError> {
        let len = self.xl_len(record) as usize;
        let mut remaining = header.xl_tot_len as usize - (HEADER_SIZE + len);
        let mut crc = Crc32c::init().update(&record[HEADER_SIZE..HEADER_SIZE + len]);
        let mut blk = HEADER_SIZE + len;

        for i in 0..XLR_MAX_BKP_BLOCKS as u8 {
            if header.xl_info & xlr_bkp_block(i) == 0 {
                continue;
            }
            if remaining < BKP_BLOCK_SIZE {
                return Err(DecodeError::InvalidBackupBlockSize);
            }
            let hole_offset = u16::from_le_bytes(record[blk + 20..blk + 22].try_into().unwrap());
            let hole_length = u16::from_le_bytes(record[blk + 22..blk + 24].try_into().unwrap());
            if hole_offset as usize + hole_length as usize > self.heap_page_size {
                return Err(DecodeError::InvalidHoleSize);
            }
            let blen = BKP_BLOCK_SIZE + self.heap_page_size - hole_length as usize;
            if remaining < blen {
                return Err(DecodeError::InvalidBackupBlockSize);
            }
            remaining -= blen;
            crc = crc.update(&record[blk..blk + blen]);
            blk += blen;
        }

        if remaining != 0 {
            return Err(DecodeError::InvalidRecordLength { wanted: header.xl_tot_len as usize - remaining, got: header.xl_tot_len });
        }

        crc = crc.update(&record[0..Self::xl_crc_offset()]);
        let computed = crc.finish();
        let expected = u32::from_le_bytes(record[Self::xl_crc_offset()..Self::xl_crc_offset() + 4].try_into().unwrap());
        if computed != expected {
            return Err(DecodeError::ChecksumMismatch { expected, computed });
        }
        Ok(())
    }

    fn filter_record(
        &self,
        record: &mut [u8],
        header: &RecordHeader,
        is_needed: &dyn Fn(&RelFileNode) -> bool,
    ) -> Result<FilterDecision, DecodeError> {
        let main_data = self.main_data(record).to_vec();
        let node = self.extract_relfilenode(header, &main_data)?;
        let Some(node) = node else {
            return Ok(FilterDecision::Keep);
        };
        if is_needed(&node) {
            return Ok(FilterDecision::Keep);
        }

        // Rewrite to XLOG_NOOP of identical length; body bytes (including
        // any backup blocks) are left untouched, only the header changes.
        // Backup-block bits are cleared: a noop carrying block data would be
        // legal on disk but misleading to read back.
        record[12] = XLOG_NOOP;
        record[13] = RM_XLOG_ID;
        let crc = Crc32c::init()
            .update(&record[HEADER_SIZE..HEADER_SIZE + self.xl_len(record) as usize])
            .update(&record[0..Self::xl_crc_offset()])
            .finish();
        record[Self::xl_crc_offset()..Self::xl_crc_offset() + 4].copy_from_slice(&crc.to_le_bytes());
        Ok(FilterDecision::RewrittenToNoop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fpi_record(node: RelFileNode, needed: bool) -> (Vec<u8>, Gpdb6Decoder) {
        let decoder = Gpdb6Decoder::new(8192);
        let main_len = 12u32;
        let tot_len = HEADER_SIZE as u32 + main_len;
        let mut buf = vec![0u8; tot_len as usize];
        buf[0..4].copy_from_slice(&tot_len.to_le_bytes());
        buf[8..12].copy_from_slice(&main_len.to_le_bytes());
        buf[12] = XLOG_FPI;
        buf[13] = RM_XLOG_ID;
        let mut node_bytes = Vec::new();
        node.encode(&mut node_bytes);
        buf[HEADER_SIZE..HEADER_SIZE + 12].copy_from_slice(&node_bytes);
        let crc = Crc32c::init()
            .update(&buf[HEADER_SIZE..HEADER_SIZE + 12])
            .update(&buf[0..24])
            .finish();
        buf[24..28].copy_from_slice(&crc.to_le_bytes());
        let _ = needed;
        (buf, decoder)
    }

    #[test]
    fn keeps_record_whose_relation_is_needed() {
        let node = RelFileNode { spcnode: 1663, dbnode: 16384, relnode: 16385 };
        let (mut buf, decoder) = fpi_record(node, true);
        let header = decoder.decode_header(&buf);
        decoder.validate_record(&buf, &header).unwrap();
        let decision = decoder.filter_record(&mut buf, &header, &|_| true).unwrap();
        assert_eq!(decision, FilterDecision::Keep);
    }

    #[test]
    fn rewrites_to_noop_of_same_length_when_dropped() {
        let node = RelFileNode { spcnode: 1663, dbnode: 16384, relnode: 16385 };
        let (mut buf, decoder) = fpi_record(node, false);
        let orig_len = buf.len();
        let header = decoder.decode_header(&buf);
        let decision = decoder.filter_record(&mut buf, &header, &|_| false).unwrap();
        assert_eq!(decision, FilterDecision::RewrittenToNoop);
        assert_eq!(buf.len(), orig_len);
        let header = decoder.decode_header(&buf);
        assert_eq!(header.xl_rmid, RM_XLOG_ID);
        assert_eq!(header.opcode(), XLOG_NOOP);
        decoder.validate_record(&buf, &header).unwrap();
    }
}

//! Segment numbering and WAL file naming, same conventions PostgreSQL itself
//! uses: a 24-hex-digit filename encoding timeline, log id and segment id.

#![allow(non_snake_case)]

use crate::{TimeLineID, XLogRecPtr, XLogSegNo};

pub const XLOG_FNAME_LEN: usize = 24;

/// Number of segments per "log id" (the high half of a segment number), for
/// a given segment size.
pub fn XLogSegmentsPerXLogId(wal_segsz_bytes: usize) -> XLogSegNo {
    (0x1_0000_0000u64 / wal_segsz_bytes as u64) as XLogSegNo
}

pub fn XLogSegNoOffsetToRecPtr(
    segno: XLogSegNo,
    offset: u32,
    wal_segsz_bytes: usize,
) -> XLogRecPtr {
    segno * (wal_segsz_bytes as u64) + offset as u64
}

/// Segment number containing `ptr`, for a given segment size.
pub fn XLByteToSeg(ptr: XLogRecPtr, wal_segsz_bytes: usize) -> XLogSegNo {
    ptr / wal_segsz_bytes as u64
}

/// `{tli:08X}{log:08X}{seg:08X}`, the canonical 24-character WAL segment
/// filename (without a `.partial` suffix).
pub fn XLogFileName(tli: TimeLineID, log_seg_no: XLogSegNo, wal_segsz_bytes: usize) -> String {
    let segs_per_id = XLogSegmentsPerXLogId(wal_segsz_bytes);
    format!(
        "{:08X}{:08X}{:08X}",
        tli,
        log_seg_no / segs_per_id,
        log_seg_no % segs_per_id
    )
}

/// Inverse of [`XLogFileName`]. Panics if `fname` is not exactly
/// [`XLOG_FNAME_LEN`] hex digits; callers validate with [`IsXLogFileName`]
/// first when the name comes from untrusted input (e.g. a directory
/// listing).
pub fn XLogFromFileName(fname: &str, wal_segsz_bytes: usize) -> (XLogSegNo, TimeLineID) {
    let tli = u32::from_str_radix(&fname[0..8], 16).expect("validated by IsXLogFileName");
    let log = u64::from_str_radix(&fname[8..16], 16).expect("validated by IsXLogFileName");
    let seg = u64::from_str_radix(&fname[16..24], 16).expect("validated by IsXLogFileName");
    (log * XLogSegmentsPerXLogId(wal_segsz_bytes) + seg, tli)
}

pub fn IsXLogFileName(fname: &str) -> bool {
    fname.len() == XLOG_FNAME_LEN && fname.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn IsPartialXLogFileName(fname: &str) -> bool {
    fname.ends_with(".partial") && IsXLogFileName(&fname[..fname.len() - ".partial".len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_round_trips() {
        let name = XLogFileName(3, 5, 16 * 1024 * 1024);
        assert_eq!(name.len(), XLOG_FNAME_LEN);
        assert!(IsXLogFileName(&name));
        let (segno, tli) = XLogFromFileName(&name, 16 * 1024 * 1024);
        assert_eq!(segno, 5);
        assert_eq!(tli, 3);
    }

    #[test]
    fn partial_name_is_recognized_but_not_a_plain_name() {
        let name = XLogFileName(1, 0, 16 * 1024 * 1024) + ".partial";
        assert!(IsPartialXLogFileName(&name));
        assert!(!IsXLogFileName(&name));
    }

    #[test]
    fn segments_per_log_id_matches_16mb_default() {
        assert_eq!(XLogSegmentsPerXLogId(16 * 1024 * 1024), 256);
    }
}

//! Opens the logically previous or next WAL segment in the archive so the
//! reassembler can recover the head or tail of a record straddling a
//! segment boundary.

use regex::Regex;

use postgres_ffi::xlog_utils::{XLogFileName, XLogSegmentsPerXLogId};
use postgres_ffi::{TimeLineID, XLogSegNo};

/// Stands in for the archive storage backend (§1, §6): a directory listing
/// plus the ability to open a reader for one entry. Local/S3/Azure/etc.
/// backends, compression and decryption all live behind this boundary and
/// are out of scope here.
pub trait ArchiveReader {
    /// List entries directly under `dir` whose name matches `pattern`.
    fn list(&self, dir: &str, pattern: &Regex) -> anyhow::Result<Vec<String>>;

    /// Open a transparently-decompressed/decrypted reader for `path`.
    fn open(&self, path: &str) -> anyhow::Result<Box<dyn std::io::Read>>;
}

pub struct SegmentFetcher;

impl SegmentFetcher {
    /// Build the regex matching the sibling segment file for `seg_no`,
    /// honoring the exact asymmetry the original uses: the *next* segment
    /// may carry a `.partial` suffix (a timeline switch can leave the
    /// current segment unfinished), the *previous* one never does.
    fn build_pattern(base_name: &str, is_next: bool) -> Regex {
        let expr = if is_next {
            format!(r"^{base_name}(\.partial)?-[0-9a-f]{{40}}(\.[A-Za-z0-9]+)?$")
        } else {
            format!(r"^{base_name}-[0-9a-f]{{40}}(\.[A-Za-z0-9]+)?$")
        };
        Regex::new(&expr).expect("generated segment regex is well-formed")
    }

    /// Open the segment adjacent to `(timeline, seg_no)` in `direction`.
    /// Returns `Ok(None)` if the archive has no matching file (a warning at
    /// the call site, never a hard error): missing neighbor segments are
    /// downgraded to best-effort pass-through per spec §7.
    pub fn open_neighbor(
        archive: &dyn ArchiveReader,
        timeline: TimeLineID,
        seg_no: XLogSegNo,
        seg_size: usize,
        is_next: bool,
    ) -> anyhow::Result<Option<Box<dyn std::io::Read>>> {
        let neighbor = if is_next { seg_no + 1 } else { seg_no - 1 };
        let base_name = XLogFileName(timeline, neighbor, seg_size);
        let segs_per_log_id = XLogSegmentsPerXLogId(seg_size);
        let dir = format!("{timeline:08X}{:08X}", (neighbor / segs_per_log_id) as u32);

        let pattern = Self::build_pattern(&base_name, is_next);
        let matches = archive.list(&dir, &pattern)?;

        let Some(first) = matches.into_iter().next() else {
            return Ok(None);
        };

        let path = format!("{dir}/{first}");
        Ok(Some(archive.open(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_pattern_allows_partial_suffix() {
        let pattern = SegmentFetcher::build_pattern("000000010000000000000005", true);
        assert!(pattern.is_match("000000010000000000000005.partial-0123456789abcdef0123456789abcdef01234567"));
        assert!(pattern.is_match("000000010000000000000005-0123456789abcdef0123456789abcdef01234567"));
    }

    #[test]
    fn previous_pattern_rejects_partial_suffix() {
        let pattern = SegmentFetcher::build_pattern("000000010000000000000005", false);
        assert!(!pattern.is_match("000000010000000000000005.partial-0123456789abcdef0123456789abcdef01234567"));
        assert!(pattern.is_match("000000010000000000000005-0123456789abcdef0123456789abcdef01234567"));
    }

    #[test]
    fn pattern_accepts_compression_suffix() {
        let pattern = SegmentFetcher::build_pattern("000000010000000000000005", false);
        assert!(pattern.is_match("000000010000000000000005-0123456789abcdef0123456789abcdef01234567.gz"));
    }
}

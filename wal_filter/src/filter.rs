//! Public entry point: construct a filter for a given PostgreSQL/GPDB
//! version and drive it chunk by chunk.

use postgres_ffi::pg_constants::{PG_VERSION_12, PG_VERSION_94};
use postgres_ffi::TimeLineID;
use wal_decoder::{Gpdb6Decoder, Gpdb7Decoder};

use crate::error::WalFilterError;
use crate::reassembly::ReassemblyState;
use crate::relfileset::RelFileSet;
use crate::segment_fetcher::ArchiveReader;

/// The "GPDB" fork name; the only one this filter understands (spec §6).
const FORK_GPDB: &str = "GPDB";

/// The two (pgVersion, fork) combinations this filter understands. Any
/// other combination is a `WalFilterError::VersionNotSupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgVersion {
    /// GPDB 6, on the PostgreSQL 9.4 record format.
    Gpdb6,
    /// GPDB 7, on the PostgreSQL 12 record format.
    Gpdb7,
}

impl PgVersion {
    /// Maps the raw `(pgVersion, pgFork)` pair a host supplies at
    /// construction time to one of the two combinations this filter
    /// understands. Mirrors `walFilterNew`'s fork check followed by its
    /// `PG_VERSION_94`/`PG_VERSION_12` dispatch, including the distinct
    /// wrong-fork vs. wrong-version `VersionNotSupportedError` messages.
    fn from_raw(pg_version: u32, pg_fork: &str) -> Result<Self, WalFilterError> {
        if pg_fork != FORK_GPDB {
            return Err(WalFilterError::VersionNotSupported(
                "WAL filtering is only supported for GPDB 6 and 7".into(),
            ));
        }
        match pg_version {
            PG_VERSION_94 => Ok(PgVersion::Gpdb6),
            PG_VERSION_12 => Ok(PgVersion::Gpdb7),
            _ => Err(WalFilterError::VersionNotSupported(
                "WAL filtering is not supported for this version of GPDB".into(),
            )),
        }
    }
}

/// Construction parameters from the host (spec §6). `pg_version`/`pg_fork`
/// are raw host-reported values, validated against the two supported
/// combinations at construction time. `page_size` is the heap/index page
/// size backup blocks are measured against; `wal_page_size` and
/// `wal_segment_size` are independent byte counts describing the WAL
/// stream's own framing.
pub struct WalFilterConfig {
    pub pg_version: u32,
    pub pg_fork: String,
    pub page_size: usize,
    pub wal_page_size: usize,
    pub wal_segment_size: usize,
    pub timeline: TimeLineID,
}

/// Version-dispatched reassembler. A generic `ReassemblyState<D>` is
/// monomorphized per decoder so the hot path (`process`) dispatches
/// statically; this enum picks which one to drive at construction time,
/// which is the only place the version is still dynamic.
pub enum WalFilter {
    Gpdb6(ReassemblyState<Gpdb6Decoder>),
    Gpdb7(ReassemblyState<Gpdb7Decoder>),
}

impl WalFilter {
    pub fn new(config: WalFilterConfig, relfileset: RelFileSet) -> Result<Self, WalFilterError> {
        match PgVersion::from_raw(config.pg_version, &config.pg_fork)? {
            PgVersion::Gpdb6 => Ok(WalFilter::Gpdb6(ReassemblyState::new(
                Gpdb6Decoder::new(config.page_size),
                relfileset,
                config.wal_page_size,
                config.wal_segment_size,
            ))),
            PgVersion::Gpdb7 => Ok(WalFilter::Gpdb7(ReassemblyState::new(
                Gpdb7Decoder::new(config.page_size),
                relfileset,
                config.wal_page_size,
                config.wal_segment_size,
            ))),
        }
    }

    pub fn process(
        &mut self,
        input: Option<&[u8]>,
        output: &mut Vec<u8>,
        archive: &dyn ArchiveReader,
        timeline: TimeLineID,
    ) -> Result<(), WalFilterError> {
        match self {
            WalFilter::Gpdb6(state) => state.process(input, output, archive, timeline),
            WalFilter::Gpdb7(state) => state.process(input, output, archive, timeline),
        }
    }

    pub fn done(&self) -> bool {
        match self {
            WalFilter::Gpdb6(state) => state.done(),
            WalFilter::Gpdb7(state) => state.done(),
        }
    }

    pub fn input_same(&self) -> bool {
        match self {
            WalFilter::Gpdb6(state) => state.input_same(),
            WalFilter::Gpdb7(state) => state.input_same(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relfileset::RelFileSet;

    fn config(pg_version: u32, pg_fork: &str) -> WalFilterConfig {
        WalFilterConfig {
            pg_version,
            pg_fork: pg_fork.into(),
            page_size: 8192,
            wal_page_size: 8192,
            wal_segment_size: 16 * 1024 * 1024,
            timeline: 1,
        }
    }

    #[test]
    fn accepts_gpdb6_and_gpdb7() {
        assert!(matches!(PgVersion::from_raw(PG_VERSION_94, "GPDB"), Ok(PgVersion::Gpdb6)));
        assert!(matches!(PgVersion::from_raw(PG_VERSION_12, "GPDB"), Ok(PgVersion::Gpdb7)));
    }

    #[test]
    fn rejects_non_gpdb_fork() {
        let err = WalFilter::new(config(PG_VERSION_12, "HEAPCHECK"), RelFileSet::unfiltered()).unwrap_err();
        assert!(matches!(err, WalFilterError::VersionNotSupported(_)));
    }

    #[test]
    fn rejects_unknown_pg_version() {
        let err = WalFilter::new(config(90300, "GPDB"), RelFileSet::unfiltered()).unwrap_err();
        assert!(matches!(err, WalFilterError::VersionNotSupported(_)));
    }
}

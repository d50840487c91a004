use criterion::{criterion_group, criterion_main, Criterion};
use regex::Regex;

use postgres_ffi::pg_constants::rmgr_gpdb7::RM_SMGR_ID;
use postgres_ffi::pg_constants::xlog_info::XLOG_SMGR_CREATE;
use postgres_ffi::pg_constants::{XLOG_PAGE_MAGIC_GPDB7, XLP_LONG_HEADER};
use postgres_ffi::{maxalign, Crc32c, RelFileNode};
use postgres_ffi::pg_constants::PG_VERSION_12;
use wal_filter::{ArchiveReader, RelFileSet, WalFilter, WalFilterConfig};

const PAGE_SIZE: usize = 8192;
const SEG_SIZE: usize = 16 * 1024 * 1024;
const LONG_HDR: usize = 40;
const REC_HDR: usize = 24;

struct NullArchive;

impl ArchiveReader for NullArchive {
    fn list(&self, _dir: &str, _pattern: &Regex) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn open(&self, _path: &str) -> anyhow::Result<Box<dyn std::io::Read>> {
        unreachable!()
    }
}

fn smgr_create_record(node: RelFileNode) -> Vec<u8> {
    let tot_len = REC_HDR as u32 + 2 + 12;
    let mut buf = vec![0u8; tot_len as usize];
    buf[0..4].copy_from_slice(&tot_len.to_le_bytes());
    buf[16] = XLOG_SMGR_CREATE;
    buf[17] = RM_SMGR_ID;
    buf[REC_HDR] = 255;
    buf[REC_HDR + 1] = 12;
    let mut node_bytes = Vec::new();
    node.encode(&mut node_bytes);
    buf[REC_HDR + 2..REC_HDR + 2 + 12].copy_from_slice(&node_bytes);
    let crc = Crc32c::init().update(&buf[REC_HDR..]).update(&buf[0..20]).finish();
    buf[20..24].copy_from_slice(&crc.to_le_bytes());
    buf
}

fn build_segment(record_count: usize) -> Vec<u8> {
    let mut page = vec![0u8; LONG_HDR];
    page[0..2].copy_from_slice(&XLOG_PAGE_MAGIC_GPDB7.to_le_bytes());
    page[2..4].copy_from_slice(&XLP_LONG_HEADER.to_le_bytes());
    page[4..8].copy_from_slice(&1u32.to_le_bytes());
    page[28..32].copy_from_slice(&(SEG_SIZE as u32).to_le_bytes());
    page[32..36].copy_from_slice(&(PAGE_SIZE as u32).to_le_bytes());

    for i in 0..record_count {
        let node = RelFileNode { spcnode: 1600, dbnode: 20000, relnode: 16384 + i as u32 };
        let record = smgr_create_record(node);
        page.extend_from_slice(&record);
        let pad = maxalign(record.len()) - record.len();
        page.resize(page.len() + pad, 0);
    }
    page.resize(PAGE_SIZE, 0);
    page
}

fn bench_process_page(c: &mut Criterion) {
    let segment = build_segment(64);
    let archive = NullArchive;

    c.bench_function("WalFilter::process one page of smgr-create records", |b| {
        b.iter(|| {
            let mut filter = WalFilter::new(
                WalFilterConfig {
                    pg_version: PG_VERSION_12,
                    pg_fork: "GPDB".into(),
                    page_size: PAGE_SIZE,
                    wal_page_size: PAGE_SIZE,
                    wal_segment_size: SEG_SIZE,
                    timeline: 1,
                },
                RelFileSet::unfiltered(),
            )
            .unwrap();
            let mut output = Vec::new();
            loop {
                filter.process(Some(&segment), &mut output, &archive, 1).unwrap();
                if !filter.input_same() {
                    break;
                }
            }
        })
    });
}

criterion_group!(benches, bench_process_page);
criterion_main!(benches);

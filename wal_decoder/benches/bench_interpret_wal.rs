use criterion::{criterion_group, criterion_main, Criterion};
use postgres_ffi::{Crc32c, RelFileNode};
use wal_decoder::{Gpdb6Decoder, Gpdb7Decoder, WalInterface};

const HEAP_PAGE_SIZE: usize = 8192;

fn gpdb6_fpi_record() -> Vec<u8> {
    let node = RelFileNode { spcnode: 1663, dbnode: 16384, relnode: 16385 };
    let main_len = 12u32;
    let tot_len = 32 + main_len;
    let mut buf = vec![0u8; tot_len as usize];
    buf[0..4].copy_from_slice(&tot_len.to_le_bytes());
    buf[8..12].copy_from_slice(&main_len.to_le_bytes());
    buf[12] = 0xA0; // XLOG_FPI
    buf[13] = 0; // RM_XLOG_ID
    let mut node_bytes = Vec::new();
    node.encode(&mut node_bytes);
    buf[32..44].copy_from_slice(&node_bytes);
    let crc = Crc32c::init().update(&buf[32..44]).update(&buf[0..24]).finish();
    buf[24..28].copy_from_slice(&crc.to_le_bytes());
    buf
}

fn gpdb7_smgr_create_record() -> Vec<u8> {
    let node = RelFileNode { spcnode: 1663, dbnode: 16384, relnode: 16385 };
    let tot_len = 24 + 2 + 12u32;
    let mut buf = vec![0u8; tot_len as usize];
    buf[0..4].copy_from_slice(&tot_len.to_le_bytes());
    buf[16] = 0x10; // XLOG_SMGR_CREATE
    buf[17] = 2; // RM_SMGR_ID
    buf[24] = 255; // XLR_BLOCK_ID_DATA_SHORT
    buf[25] = 12;
    let mut node_bytes = Vec::new();
    node.encode(&mut node_bytes);
    buf[26..38].copy_from_slice(&node_bytes);
    let crc = Crc32c::init().update(&buf[24..]).update(&buf[0..20]).finish();
    buf[20..24].copy_from_slice(&crc.to_le_bytes());
    buf
}

fn bench_gpdb6_filter(c: &mut Criterion) {
    let decoder = Gpdb6Decoder::new(HEAP_PAGE_SIZE);
    let record = gpdb6_fpi_record();
    c.bench_function("gpdb6 decode+filter fpi record", |b| {
        b.iter(|| {
            let mut buf = record.clone();
            let header = decoder.decode_header(&buf);
            decoder.validate_record(&buf, &header).unwrap();
            decoder.filter_record(&mut buf, &header, &|n| n.relnode == 16385).unwrap();
        })
    });
}

fn bench_gpdb7_filter(c: &mut Criterion) {
    let decoder = Gpdb7Decoder::new(HEAP_PAGE_SIZE);
    let record = gpdb7_smgr_create_record();
    c.bench_function("gpdb7 decode+filter smgr create record", |b| {
        b.iter(|| {
            let mut buf = record.clone();
            let header = decoder.decode_header(&buf);
            decoder.validate_record(&buf, &header).unwrap();
            decoder.filter_record(&mut buf, &header, &|n| n.relnode == 16385).unwrap();
        })
    });
}

criterion_group!(benches, bench_gpdb6_filter, bench_gpdb7_filter);
criterion_main!(benches);

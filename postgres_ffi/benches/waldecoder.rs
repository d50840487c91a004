use criterion::{black_box, criterion_group, criterion_main, Criterion};
use postgres_ffi::{Crc32c, PageHeader};

fn bench_page_header_decode(c: &mut Criterion) {
    let mut buf = vec![0u8; postgres_ffi::XLOG_SIZE_OF_XLOG_LONG_PHD];
    buf[0..2].copy_from_slice(&postgres_ffi::pg_constants::XLOG_PAGE_MAGIC_GPDB7.to_le_bytes());
    buf[2..4].copy_from_slice(&postgres_ffi::pg_constants::XLP_LONG_HEADER.to_le_bytes());

    c.bench_function("page_header_decode_long", |b| {
        b.iter(|| PageHeader::decode(black_box(&buf)).unwrap())
    });
}

fn bench_crc32c_incremental(c: &mut Criterion) {
    let record = vec![0x42u8; 8192];
    c.bench_function("crc32c_incremental_8k", |b| {
        b.iter(|| {
            let crc = Crc32c::init().update(black_box(&record));
            black_box(crc.finish())
        })
    });
}

criterion_group!(benches, bench_page_header_decode, bench_crc32c_incremental);
criterion_main!(benches);

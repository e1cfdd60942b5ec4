//! Benchmarks for the endpoint ring buffer
//!
//! Single-thread write/read pairs and a wrapping workload.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mcdev::{OpenMode, RingBuffer};

fn bench_write_read(c: &mut Criterion) {
    let rb = RingBuffer::new(1 << 20);
    let payload = vec![0xA5u8; 512];

    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("write_read_512", |b| {
        b.iter(|| {
            let written = rb.write(black_box(&payload), OpenMode::NonBlocking).unwrap();
            black_box(rb.read(written, OpenMode::NonBlocking).unwrap());
        })
    });
    group.finish();
}

fn bench_wrapping(c: &mut Criterion) {
    // 700-byte chunks through a 1000-byte ring cross the end on most calls
    let rb = RingBuffer::new(1000);
    let payload = vec![0x5Au8; 700];

    c.bench_function("ring_buffer_wrapping_700", |b| {
        b.iter(|| {
            let written = rb.write(black_box(&payload), OpenMode::NonBlocking).unwrap();
            black_box(rb.read(written, OpenMode::NonBlocking).unwrap());
        })
    });
}

criterion_group!(benches, bench_write_read, bench_wrapping);
criterion_main!(benches);

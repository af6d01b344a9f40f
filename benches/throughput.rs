//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rtupoll_core::core::protocol::checksum::append_crc;
use rtupoll_core::core::protocol::{crc16_modbus, frame, Response, Timing};
use std::time::Duration;

fn checksum_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..256).map(|i| (i % 256) as u8).collect();

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("crc16_modbus", |b| {
        b.iter(|| {
            let crc = crc16_modbus(black_box(&data));
            black_box(crc)
        })
    });

    group.finish();
}

fn frame_benchmark(c: &mut Criterion) {
    let values: Vec<u16> = (0..120).collect();

    let mut group = c.benchmark_group("frame");

    group.bench_function("read_holding_registers", |b| {
        b.iter(|| black_box(frame::read_holding_registers(black_box(1), 0, 125)))
    });

    group.bench_function("write_multiple_registers", |b| {
        b.iter(|| black_box(frame::write_multiple_registers(1, 0, black_box(&values)).unwrap()))
    });

    group.finish();
}

fn decode_benchmark(c: &mut Criterion) {
    let mut data = vec![0x01, 0x03, 240];
    data.extend((0..240).map(|i| (i % 256) as u8));
    append_crc(&mut data);
    let response = Response::new(
        frame::read_holding_registers(1, 0, 120).into_vec(),
        data,
        Timing {
            begin: chrono::Local::now(),
            to_last_byte: Duration::ZERO,
            total: Duration::ZERO,
        },
    );

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(240));

    group.bench_function("registers", |b| b.iter(|| black_box(response.registers())));

    group.bench_function("f64_word_swap", |b| {
        b.iter(|| {
            let mut cursor = response.cursor();
            let mut sum = 0.0;
            while cursor.remaining() >= 8 {
                sum += cursor.read_f64_word_swap();
            }
            black_box(sum)
        })
    });

    group.finish();
}

criterion_group!(benches, checksum_benchmark, frame_benchmark, decode_benchmark);
criterion_main!(benches);

//! Parser and codec benchmarks.
//!
//! Run with: cargo bench --bench parser

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mqtt_wire::protocol::{Connect, Packet, PingReq, Publish, QoS};
use mqtt_wire::{Parser, Role};

/// CONNECT followed by `count` QoS 1 publishes of `payload_size` bytes
fn publish_stream(count: usize, payload_size: usize) -> Vec<u8> {
    let mut buf = BytesMut::new();
    Packet::from(Connect::default()).encode(&mut buf).unwrap();

    for i in 0..count {
        Packet::from(Publish {
            qos_level: QoS::AtLeastOnce,
            topic_name: "bench/topic".to_string(),
            payload: Bytes::from(vec![0u8; payload_size]),
            packet_identifier: Some((i % 65535) as u16 + 1),
            ..Default::default()
        })
        .encode(&mut buf)
        .unwrap();
    }
    buf.to_vec()
}

/// Benchmark: whole stream delivered in chunks of varying size.
fn bench_chunked_stream(c: &mut Criterion) {
    let data = publish_stream(1000, 256);
    let mut group = c.benchmark_group("parser_chunked");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for chunk in [1usize, 16, 1460, 65536].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            b.iter(|| {
                let mut parser = Parser::new(Role::Server);
                let mut packets = 0;
                for piece in data.chunks(chunk) {
                    packets += parser.data_received(black_box(piece)).len();
                }
                assert_eq!(packets, 1001);
            });
        });
    }

    group.finish();
}

/// Benchmark: payload size against decode throughput.
fn bench_publish_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_publish_size");

    for size in [64usize, 1024, 16384].iter() {
        let data = publish_stream(100, *size);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Parser::new(Role::Server).data_received(black_box(data)));
        });
    }

    group.finish();
}

/// Benchmark: serialising small control packets.
fn bench_serialise(c: &mut Criterion) {
    let publish: Packet = Publish {
        topic_name: "sensors/7/temp".to_string(),
        payload: Bytes::from_static(b"21.5"),
        ..Default::default()
    }
    .into();
    let ping: Packet = PingReq.into();

    c.bench_function("serialise_publish", |b| {
        b.iter(|| black_box(&publish).serialise().unwrap())
    });
    c.bench_function("serialise_pingreq", |b| {
        b.iter(|| black_box(&ping).serialise().unwrap())
    });
}

criterion_group!(
    benches,
    bench_chunked_stream,
    bench_publish_sizes,
    bench_serialise
);
criterion_main!(benches);

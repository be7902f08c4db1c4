//! Frame codec benchmark suite.
//!
//! Measures the per-frame work done on the event loop:
//! - Encoding outbound frames
//! - Decoding inbound frames
//! - Classifying decoded frames
//!
//! Run with: cargo bench --bench frame_codec
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;

use realtime_socket::identifiers::{JoinRef, MessageRef, Topic};
use realtime_socket::protocol::{InboundFrame, OutboundFrame, ParsedEvent};

// ============================================================================
// Fixtures
// ============================================================================

const REPLY: &str =
    r#"{"topic":"realtime:main","event":"phx_reply","ref":"42","payload":{"status":"ok","response":{}}}"#;

const BROADCAST: &str = r#"{"topic":"realtime:main","event":"broadcast","ref":null,"payload":{"event":"message-create","payload":{"id":7,"body":"hello"}}}"#;

/// Presence diff with `keys` joined keys, each carrying two metas.
fn presence_diff(keys: usize) -> String {
    let joins: serde_json::Map<String, serde_json::Value> = (0..keys)
        .map(|i| {
            (
                format!("key-{i}"),
                json!({ "metas": [{ "id": format!("a-{i}") }, { "id": format!("b-{i}") }] }),
            )
        })
        .collect();

    json!({
        "topic": "realtime:main",
        "event": "presence_diff",
        "payload": { "joins": joins, "leaves": {} }
    })
    .to_string()
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let heartbeat = OutboundFrame::heartbeat(MessageRef::new(1));
    group.bench_function("heartbeat", |b| b.iter(|| black_box(&heartbeat).encode()));

    let join = OutboundFrame::new(
        Topic::new("realtime:main"),
        "phx_join",
        json!({
            "access_token": "token",
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "k1" },
                "postgres_changes": [],
                "private": false
            }
        }),
        MessageRef::new(12),
        Some(JoinRef::new(12)),
    );
    group.bench_function("join", |b| b.iter(|| black_box(&join).encode()));

    group.finish();
}

// ============================================================================
// Benchmark: Decode + Classify
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (name, text) in [("reply", REPLY), ("broadcast", BROADCAST)] {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("frame", name), text, |b, text| {
            b.iter(|| InboundFrame::decode(black_box(text)))
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for keys in [1usize, 16, 128] {
        let text = presence_diff(keys);
        let frame = InboundFrame::decode(&text).expect("fixture frame");

        group.bench_with_input(BenchmarkId::new("presence_diff", keys), &frame, |b, frame| {
            b.iter(|| ParsedEvent::parse(black_box(frame.clone())))
        });
    }

    let frame = InboundFrame::decode(BROADCAST).expect("fixture frame");
    group.bench_function("broadcast", |b| {
        b.iter(|| ParsedEvent::parse(black_box(frame.clone())))
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_encode, bench_decode, bench_classify);
criterion_main!(benches);

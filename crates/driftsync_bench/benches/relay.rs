//! Broadcast fan-out benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use driftsync_protocol::ServerFrame;
use driftsync_server::{
    ConnectionId, ConnectionSink, DeviceConnectionRegistry, RecordingSink, SyncBroadcaster,
};
use serde_json::json;
use std::sync::Arc;

fn connect_fleet(
    registry: &DeviceConnectionRegistry,
    user: &str,
    count: usize,
) -> Vec<ConnectionId> {
    (0..count)
        .map(|i| {
            let sink = Arc::new(RecordingSink::new()) as Arc<dyn ConnectionSink>;
            registry
                .add(user, &format!("d{}", i), sink, 0)
                .expect("registration")
        })
        .collect()
}

/// Benchmark fan-out across increasing device counts.
fn bench_relay(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay");

    for devices in [2usize, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("fan_out", devices),
            &devices,
            |b, &devices| {
                let registry = Arc::new(DeviceConnectionRegistry::new());
                let ids = connect_fleet(&registry, "u1", devices);
                let broadcaster = SyncBroadcaster::new(Arc::clone(&registry));
                let frame = ServerFrame::Data(json!({"event": "record-updated", "id": "r1"}));

                b.iter(|| black_box(broadcaster.relay("u1", ids[0], &frame)));
            },
        );
    }

    group.finish();
}

/// Benchmark registry bookkeeping under churn.
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("add_remove", |b| {
        let registry = DeviceConnectionRegistry::new();
        b.iter(|| {
            let sink = Arc::new(RecordingSink::new()) as Arc<dyn ConnectionSink>;
            let id = registry.add("u1", "d1", sink, 0).expect("registration");
            registry.remove(black_box(id));
        });
    });

    group.bench_function("others_among_50", |b| {
        let registry = Arc::new(DeviceConnectionRegistry::new());
        let ids = connect_fleet(&registry, "u1", 50);
        b.iter(|| black_box(registry.others("u1", ids[0])));
    });

    group.finish();
}

criterion_group!(benches, bench_relay, bench_registry);
criterion_main!(benches);

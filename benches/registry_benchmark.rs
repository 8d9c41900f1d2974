use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use duplex::signaling::{MemberId, RoomId, RoomRegistry};

/// registry pre-filled with `rooms` half-empty rooms
fn populated(rooms: usize) -> (RoomRegistry, Vec<RoomId>) {
    let mut registry = RoomRegistry::new();
    let ids: Vec<RoomId> = (0..rooms).map(|i| RoomId::new(format!("room-{i}"))).collect();
    for id in &ids {
        registry.join(MemberId::generate(), id);
    }
    (registry, ids)
}

/// pairing benchmark: second member joins a waiting room
fn bench_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pairing");
    group.throughput(Throughput::Elements(1));

    for rooms in [10usize, 1000] {
        group.bench_function(format!("join_{rooms}_rooms"), |b| {
            b.iter_batched(
                || populated(rooms),
                |(mut registry, ids)| {
                    let outcome = registry.join(MemberId::generate(), &ids[rooms / 2]);
                    black_box(outcome)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// full churn: pair two members, then both leave
fn bench_churn(c: &mut Criterion) {
    let room = RoomId::from("churn");
    let a = MemberId::generate();
    let b = MemberId::generate();

    let mut group = c.benchmark_group("Churn");
    group.throughput(Throughput::Elements(1));

    group.bench_function("join_join_leave_leave", |bench| {
        let mut registry = RoomRegistry::new();
        bench.iter(|| {
            registry.join(black_box(a), &room);
            registry.join(black_box(b), &room);
            black_box(registry.leave(a));
            black_box(registry.leave(b));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_pairing, bench_churn);
criterion_main!(benches);

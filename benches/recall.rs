//! Criterion benchmarks for training and recall.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel,simd
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use hopswarm::prelude::*;

fn make_network(side: u32, tier: ExecutionTier) -> SwarmNetwork {
    SwarmNetwork::new(
        NetworkConfig::default()
            .with_grid(side, side)
            .with_bit_size(8)
            .with_seed(42)
            .with_execution_tier(tier),
    )
    .unwrap()
}

/// Hebbian training at growing grid sizes.
fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");

    for side in [3u32, 5, 8].iter() {
        let net = make_network(*side, ExecutionTier::Scalar);
        group.throughput(Throughput::Elements(net.neuron_count() as u64));

        group.bench_with_input(BenchmarkId::new("hebbian", side), side, |b, _| {
            b.iter(|| black_box(train(black_box(net.library()))));
        });
    }

    group.finish();
}

/// One synchronous step, comparing execution tiers.
fn bench_sync_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_sync");
    let side = 8;

    for (name, tier) in [
        ("scalar", ExecutionTier::Scalar),
        // Falls back to scalar without the `simd` feature.
        ("simd", ExecutionTier::Simd),
        // Falls back to scalar without the `parallel` feature.
        ("parallel", ExecutionTier::Parallel),
    ] {
        let mut net = make_network(side, tier);
        group.throughput(Throughput::Elements(net.neuron_count() as u64));

        group.bench_function(name, |b| {
            b.iter(|| {
                net.reset_state(7);
                black_box(net.recall(1).unwrap())
            });
        });
    }

    group.finish();
}

/// Asynchronous block and neuron updates.
fn bench_async(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_async");

    for side in [3u32, 8].iter() {
        group.bench_with_input(BenchmarkId::new("block", side), side, |b, &side| {
            let mut net = make_network(side, ExecutionTier::Scalar);
            b.iter(|| black_box(net.step_async_block().unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("neuron", side), side, |b, &side| {
            let mut net = make_network(side, ExecutionTier::Scalar);
            b.iter(|| black_box(net.step_async_neuron().unwrap()));
        });
    }

    group.finish();
}

/// Full control cycle against an in-memory swarm.
fn bench_control_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_cycle");

    for side in [3u32, 8].iter() {
        group.bench_with_input(BenchmarkId::new("async_block", side), side, |b, &side| {
            let mut net = make_network(side, ExecutionTier::Scalar);
            let mut swarm = SpeedTable::new(side as usize, side as usize);
            b.iter(|| black_box(net.control_cycle(&mut swarm).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_train,
    bench_sync_tiers,
    bench_async,
    bench_control_cycle
);
criterion_main!(benches);

//! Performance benchmarks for ems_core using Criterion.rs.

use bevy_ecs::prelude::World;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ems_core::ecs::EngineKind;
use ems_core::network::RoadNetwork;
use ems_core::runner::{initialize_simulation, run_until_empty, simulation_schedule};
use ems_core::scenario::{build_scenario, ArrivalProcess};
use ems_core::test_helpers::{demo_chargers, demo_network, demo_params};

fn bench_simulation_run(c: &mut Criterion) {
    let scenarios = vec![
        ("small_diesel", EngineKind::Diesel, 50),
        ("small_electric", EngineKind::Electric, 50),
        ("large_electric", EngineKind::Electric, 500),
    ];

    let mut group = c.benchmark_group("simulation_run");
    for (name, engine, calls) in scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(engine, calls),
            |b, &(engine, calls)| {
                b.iter(|| {
                    let mut world = World::new();
                    let params = demo_params(engine)
                        .with_seed(42)
                        .with_process(ArrivalProcess::Calls(calls))
                        .with_chargers(demo_chargers());
                    build_scenario(&mut world, demo_network(), params)
                        .expect("bench scenario must build");
                    initialize_simulation(&mut world);
                    let mut schedule = simulation_schedule();
                    black_box(run_until_empty(&mut world, &mut schedule, 1_000_000));
                });
            },
        );
    }
    group.finish();
}

fn bench_network_queries(c: &mut Criterion) {
    let network: RoadNetwork = demo_network();
    let nodes: Vec<_> = network.node_ids().collect();

    c.bench_function("network_siren_minutes_all_pairs", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for &a in &nodes {
                for &z in &nodes {
                    total += network.siren_minutes(a, z);
                }
            }
            black_box(total)
        });
    });

    c.bench_function("network_closest_node", |b| {
        b.iter(|| black_box(network.closest_node(4.3, 2.1)));
    });
}

criterion_group!(benches, bench_simulation_run, bench_network_queries);
criterion_main!(benches);

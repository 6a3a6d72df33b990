use std::hint::black_box;

use criterion::*;
use glam::Vec2;

use survivor_sim::game::components::{register_components, Transform};
use survivor_sim::game::prefabs::Prefabs;
use survivor_sim::{CommandBuffer, GameConfig, World};

const AGENTS: usize = 100_000;

fn arena() -> (World, Prefabs) {
    let mut world = World::new();
    register_components(&mut world).unwrap();
    let prefabs = Prefabs::register(&mut world, &GameConfig::default());
    (world, prefabs)
}

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    group.sample_size(10);
    group.throughput(Throughput::Elements(AGENTS as u64));

    group.bench_function("instantiate_direct_100k", |b| {
        b.iter_batched(
            arena,
            |(mut world, prefabs)| {
                for _ in 0..AGENTS {
                    black_box(world.instantiate(prefabs.enemy).unwrap());
                }
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("playback_instantiate_100k", |b| {
        b.iter_batched(
            || {
                let (world, prefabs) = arena();
                let mut buffer = CommandBuffer::new();
                for i in 0..AGENTS {
                    let enemy = buffer.instantiate(prefabs.enemy);
                    let position = Vec2::new(i as f32, 0.0);
                    buffer.set_component(enemy, Transform::at(position));
                }
                (world, buffer)
            },
            |(mut world, buffer)| {
                let report = world.playback(buffer).unwrap();
                black_box(report.applied);
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("destroy_then_recycle_100k", |b| {
        b.iter_batched(
            || {
                let (mut world, prefabs) = arena();
                let mut buffer = CommandBuffer::new();
                for _ in 0..AGENTS {
                    let enemy = world.instantiate(prefabs.enemy).unwrap();
                    buffer.destroy(enemy);
                }
                (world, prefabs, buffer)
            },
            |(mut world, prefabs, buffer)| {
                world.playback(buffer).unwrap();
                for _ in 0..AGENTS {
                    black_box(world.instantiate(prefabs.enemy).unwrap());
                }
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);

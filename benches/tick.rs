use std::hint::black_box;
use std::sync::Arc;

use criterion::*;
use glam::Vec2;

use survivor_sim::game::components::Transform;
use survivor_sim::game::movement::OrbitInput;
use survivor_sim::game::presentation::RecordingUi;
use survivor_sim::{Collaborators, Game, GameConfig};

const HORDES: [usize; 3] = [100, 1_000, 10_000];

fn game_with_horde(enemies: usize, threads: usize) -> Game {
    let mut config = GameConfig::default();
    config.simulation.worker_threads = threads;
    config.spawner.seed = 7;
    let collaborators = Collaborators {
        input: Arc::new(OrbitInput { period: 600 }),
        ui: Arc::new(RecordingUi::new()),
        ..Collaborators::default()
    };
    let mut game = Game::new(config, collaborators).unwrap();
    let template = game.prefabs().enemy;
    for i in 0..enemies {
        // Spiral well outside the player's reach so the run stays alive.
        let angle = i as f32 * 0.618;
        let radius = 40.0 + (i as f32).sqrt();
        let position = Vec2::new(angle.sin(), angle.cos()) * radius;
        let enemy = game.world_mut().instantiate(template).unwrap();
        game.world_mut().attach(enemy, Transform::at(position)).unwrap();
    }
    game
}

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(20);

    for &enemies in &HORDES {
        group.throughput(Throughput::Elements(enemies as u64));
        group.bench_with_input(BenchmarkId::new("full_tick", enemies), &enemies, |b, &n| {
            b.iter_batched(
                || game_with_horde(n, 4),
                |mut game| {
                    for _ in 0..10 {
                        black_box(game.tick().unwrap());
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("full_tick_single_worker_1k", |b| {
        b.iter_batched(
            || game_with_horde(1_000, 1),
            |mut game| {
                for _ in 0..10 {
                    black_box(game.tick().unwrap());
                }
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);

//! Performance benchmarks for the disconnect sweep scan

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

use arbiter::game::ConnectionTracker;

fn tracker_with_games(games: usize, players_per_game: usize) -> ConnectionTracker {
    let tracker = ConnectionTracker::new();
    for g in 0..games {
        let game_id = uuid::Uuid::new_v4();
        for p in 0..players_per_game {
            tracker.add(game_id, format!("player-{}-{}", g, p));
        }
    }
    tracker
}

fn bench_termination_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("disconnect_sweep");

    for &games in &[100usize, 1_000, 10_000] {
        group.bench_function(format!("scan_{}_games_all_due", games), |b| {
            b.iter_batched(
                || tracker_with_games(games, 2),
                |tracker| {
                    // Zero threshold: every tracked game is due
                    black_box(tracker.games_needing_termination(Duration::ZERO))
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("scan_{}_games_none_due", games), |b| {
            b.iter_batched(
                || tracker_with_games(games, 2),
                |tracker| {
                    black_box(tracker.games_needing_termination(Duration::from_secs(3600)))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_termination_scan);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::PathBuf;
use viastitch::prelude::*;
use viastitch::{place_in_snapshot, TargetPattern};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_board(name: &str) -> BoardSnapshot {
    let text = std::fs::read_to_string(fixture_path(name)).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn bench_grid(c: &mut Criterion) {
    let board = load_board("mixed_board.json");
    let settings = ZoneSettings::default();

    c.bench_function("grid_mixed_board", |b| {
        b.iter(|| {
            place_in_snapshot(
                black_box(&board),
                "gnd-bottom",
                black_box(&settings),
                &mut RunOptions::default(),
            )
        });
    });
}

fn bench_maximize(c: &mut Criterion) {
    let board = load_board("mixed_board.json");
    let settings = ZoneSettings {
        maximize_vias: true,
        ..Default::default()
    };

    c.bench_function("maximize_mixed_board", |b| {
        b.iter(|| {
            place_in_snapshot(
                black_box(&board),
                "gnd-bottom",
                black_box(&settings),
                &mut RunOptions::default(),
            )
        });
    });
}

fn bench_target(c: &mut Criterion) {
    let board = load_board("square_10mm.json");
    let settings = ZoneSettings {
        target_mode: true,
        target_count: 40,
        target_pattern: TargetPattern::Staggered,
        ..Default::default()
    };

    c.bench_function("target_staggered_square", |b| {
        b.iter(|| {
            place_in_snapshot(
                black_box(&board),
                "gnd-top",
                black_box(&settings),
                &mut RunOptions::default(),
            )
        });
    });
}

criterion_group!(benches, bench_grid, bench_maximize, bench_target);
criterion_main!(benches);

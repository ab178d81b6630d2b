//! Placement scenarios against board fixtures

use std::collections::HashSet;
use std::path::PathBuf;

use viastitch::prelude::*;
use viastitch::{place_in_snapshot, Point, Strategy, TargetPattern, ZeroPlacementDiagnosis};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_board(name: &str) -> BoardSnapshot {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture should exist");
    serde_json::from_str(&text).expect("fixture should parse")
}

fn place(board: &BoardSnapshot, zone_id: &str, settings: &ZoneSettings) -> PlacementResult {
    place_in_snapshot(board, zone_id, settings, &mut RunOptions::default())
        .expect("placement should succeed")
}

fn min_pair_distance(points: &[Point]) -> f64 {
    let mut best = f64::INFINITY;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            best = best.min(a.distance(b));
        }
    }
    best
}

#[test]
fn test_plain_grid_anchor_count() {
    let board = load_board("square_10mm.json");
    let result = place(&board, "gnd-top", &ZoneSettings::default());

    // Columns and rows at 0mm and 10mm sit on the edge and fail the
    // 0.25mm boundary margin, leaving 9 x 9.
    assert_eq!(result.len(), 81);
    assert_eq!(result.strategy, Strategy::Grid);
    assert_eq!(result.stats.accepted, 81);
    assert_eq!(result.stats.rejected_overlap, 0);
    assert!(min_pair_distance(&result.points()) >= 500_000.0);
    assert!(result.vias.iter().all(|v| v.net == "GND"));
}

#[test]
fn test_existing_via_rejects_one_candidate() {
    let clean = place(&load_board("square_10mm.json"), "gnd-top", &ZoneSettings::default());
    let blocked = place(
        &load_board("square_with_via.json"),
        "gnd-top",
        &ZoneSettings::default(),
    );

    assert_eq!(blocked.len(), 80);
    assert_eq!(blocked.stats.rejected_overlap, 1);

    let expected: HashSet<Point> = clean
        .points()
        .into_iter()
        .filter(|p| p.distance(&Point::new(5_000_000, 5_000_000)) >= 500_000.0)
        .collect();
    let actual: HashSet<Point> = blocked.points().into_iter().collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_target_count_is_exact() {
    let board = load_board("square_10mm.json");
    for pattern in [
        TargetPattern::Grid,
        TargetPattern::Staggered,
        TargetPattern::Spiral,
    ] {
        let settings = ZoneSettings {
            target_mode: true,
            target_count: 25,
            target_pattern: pattern,
            ..Default::default()
        };
        let result = place(&board, "gnd-top", &settings);
        assert_eq!(result.len(), 25, "pattern {}", pattern);
        assert_eq!(result.strategy, Strategy::Target);
        assert!(
            min_pair_distance(&result.points()) >= 500_000.0,
            "pattern {} spacing",
            pattern
        );
        let report = result.target.expect("target report");
        assert!(report.available >= 25);
        assert!(!report.fallback_offered);
    }
}

#[test]
fn test_target_shortfall_without_fallback() {
    let board = load_board("square_10mm.json");
    let settings = ZoneSettings {
        target_mode: true,
        target_count: 500,
        ..Default::default()
    };
    let result = place(&board, "gnd-top", &settings);
    let report = result.target.clone().expect("target report");

    assert!(report.available < report.requested);
    assert_eq!(result.len(), report.available);
    assert!(report.fallback_offered);
    assert!(!report.fallback_accepted);
}

#[test]
fn test_target_shortfall_callback_sees_numbers() {
    let board = load_board("square_10mm.json");
    let settings = ZoneSettings {
        target_mode: true,
        target_count: 500,
        target_pattern: TargetPattern::Staggered,
        ..Default::default()
    };
    let mut seen = None;
    let result = {
        let mut options = RunOptions::default().with_fallback(|shortfall| {
            seen = Some((shortfall.requested, shortfall.available));
            true
        });
        place_in_snapshot(&board, "gnd-top", &settings, &mut options).unwrap()
    };

    let (requested, available) = seen.expect("callback should run");
    assert_eq!(requested, 500);
    assert!(result.len() >= available);
    assert!(result.len() < 500);
    assert!(min_pair_distance(&result.points()) >= 500_000.0);
}

#[test]
fn test_maximize_not_below_plain_grid() {
    let board = load_board("mixed_board.json");
    let plain = place(&board, "gnd-bottom", &ZoneSettings::default());
    let maximize = place(
        &board,
        "gnd-bottom",
        &ZoneSettings {
            maximize_vias: true,
            ..Default::default()
        },
    );

    assert!(maximize.len() >= plain.len());
    assert!(matches!(
        maximize.strategy,
        Strategy::MaximizeGrid | Strategy::Pack
    ));
    assert!(min_pair_distance(&maximize.points()) >= 500_000.0);
}

#[test]
fn test_mixed_board_keeps_clear_of_items() {
    let board = load_board("mixed_board.json");
    let result = place(&board, "gnd-bottom", &ZoneSettings::default());
    assert!(!result.is_empty());

    let hole_center = Point::new(10_000_000, 6_000_000);
    for p in result.points() {
        // hole (8..12 x 4..8 mm) plus via radius
        let in_hole = (7_750_000..=12_250_000).contains(&p.x) && (3_750_000..=8_250_000).contains(&p.y);
        assert!(!in_hole, "{:?} inside hole around {:?}", p, hole_center);
        // through-hole pad J1-1
        assert!(p.distance(&Point::new(5_000_000, 9_000_000)) >= 850_000.0 + 250_000.0);
        // signal via
        assert!(p.distance(&Point::new(3_000_000, 3_000_000)) >= 300_000.0 + 250_000.0);
        // bottom track along y = 6mm from x = 0 to 6mm
        if p.x <= 6_000_000 {
            assert!((p.y - 6_000_000).abs() as f64 >= 125_000.0 + 250_000.0);
        }
        // VCC island
        let in_vcc = (14_750_000..=19_250_000).contains(&p.x) && (8_750_000..=11_250_000).contains(&p.y);
        assert!(!in_vcc, "{:?} touches the VCC island", p);
    }
}

#[test]
fn test_other_layer_items_only_when_requested() {
    let board = load_board("mixed_board.json");
    let own_layers = place(&board, "gnd-bottom", &ZoneSettings::default());
    let all_layers = place(
        &board,
        "gnd-bottom",
        &ZoneSettings {
            include_other_layers: true,
            ..Default::default()
        },
    );
    assert!(all_layers.len() < own_layers.len());
    // trk-2 is a top-layer track at x = 14mm
    assert!(all_layers
        .points()
        .iter()
        .all(|p| (p.x - 14_000_000).abs() as f64 >= 125_000.0 + 250_000.0));
}

#[test]
fn test_zero_placements_are_diagnosed() {
    let board = load_board("square_10mm.json");
    let settings = ZoneSettings {
        edge_margin: 6.0,
        ..Default::default()
    };
    let result = place(&board, "gnd-top", &settings);
    assert!(result.is_empty());
    let diagnosis = result.diagnosis().expect("diagnosis for empty result");
    assert!(matches!(
        diagnosis,
        ZeroPlacementDiagnosis::AllEdgeMargin | ZeroPlacementDiagnosis::Mixed
    ));
    assert!(!diagnosis.hints(false).is_empty());
}

#[test]
fn test_invalid_settings_rejected_before_placement() {
    let board = load_board("square_10mm.json");
    let settings = ZoneSettings {
        via_drill: 0.6,
        ..Default::default()
    };
    let err = place_in_snapshot(&board, "gnd-top", &settings, &mut RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, StitchError::InvalidParameters(_)));

    let err = place_in_snapshot(&board, "nope", &ZoneSettings::default(), &mut RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, StitchError::ZoneNotFound(_)));
}

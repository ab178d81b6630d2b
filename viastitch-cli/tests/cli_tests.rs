//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Build command for the viastitch-cli binary.
fn viastitch_cli() -> Command {
    cargo_bin_cmd!("viastitch-cli")
}

/// Path to the library's board fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("viastitch")
        .join("tests")
        .join("fixtures")
}

/// Copy a fixture into a fresh temp dir, since commands write back.
fn scratch_board(name: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("board.json");
    fs::copy(fixtures_dir().join(name), &path).unwrap();
    (dir, path)
}

fn via_count(board: &Path) -> usize {
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(board).unwrap()).unwrap();
    json["vias"].as_array().map_or(0, |v| v.len())
}

#[test]
fn test_cli_help() {
    let mut cmd = viastitch_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Stitching via"));
}

#[test]
fn test_cli_version() {
    let mut cmd = viastitch_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_place_writes_board_and_state() {
    let (dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place").arg(&board).arg("--zone").arg("gnd-top");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Placed:     81"));

    assert_eq!(via_count(&board), 81);
    let state = fs::read_to_string(dir.path().join("board.stitching.json")).unwrap();
    assert!(state.contains("owned_via_ids"));
    assert!(state.contains("ViaSize"));
}

#[test]
fn test_cli_place_json_output() {
    let (_dir, board) = scratch_board("square_with_via.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--format")
        .arg("json");
    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["placement"]["vias"].as_array().unwrap().len(), 80);
    assert_eq!(report["placement"]["stats"]["rejected_overlap"], 1);
    assert_eq!(report["committed"], true);
}

#[test]
fn test_cli_dry_run_changes_nothing() {
    let (dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--dry-run");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert_eq!(via_count(&board), 0);
    assert!(!dir.path().join("board.stitching.json").exists());
}

#[test]
fn test_cli_settings_overrides() {
    let (_dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--spacing")
        .arg("2")
        .arg("--via-size")
        .arg("0.6")
        .arg("--via-drill")
        .arg("0.35");
    cmd.assert().success();
    assert_eq!(via_count(&board), 16);
}

#[test]
fn test_cli_target_mode() {
    let (_dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--target")
        .arg("12")
        .arg("--pattern")
        .arg("spiral");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("12 requested"));
    assert_eq!(via_count(&board), 12);
}

#[test]
fn test_cli_invalid_settings() {
    let (_dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--via-drill")
        .arg("0.8");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Via drill must be smaller"));
}

#[test]
fn test_cli_exit_codes() {
    let (_dir, board) = scratch_board("square_10mm.json");

    let mut cmd = viastitch_cli();
    cmd.arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--edge-margin")
        .arg("6");
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("No vias placed"));
    assert_eq!(via_count(&board), 0);

    let mut cmd = viastitch_cli();
    cmd.arg("place").arg(&board).arg("--zone").arg("missing");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Zone not found"));

    let mut cmd = viastitch_cli();
    cmd.arg("zones").arg("does_not_exist.json");
    cmd.assert().code(1).stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_remove_and_orphans() {
    let (_dir, board) = scratch_board("square_with_via.json");

    viastitch_cli()
        .arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .assert()
        .success();
    assert_eq!(via_count(&board), 81);

    viastitch_cli()
        .arg("orphans")
        .arg(&board)
        .assert()
        .success()
        .stdout(predicate::str::contains("No orphan vias"));

    viastitch_cli()
        .arg("remove")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 80 vias"));
    assert_eq!(via_count(&board), 1);
}

#[test]
fn test_cli_orphans_clean() {
    let (dir, board) = scratch_board("square_10mm.json");
    let state = dir.path().join("board.stitching.json");

    viastitch_cli()
        .arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .assert()
        .success();

    // Delete the zone from the board file.
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&board).unwrap()).unwrap();
    json["zones"] = serde_json::json!([]);
    fs::write(&board, serde_json::to_string(&json).unwrap()).unwrap();

    viastitch_cli()
        .arg("orphans")
        .arg(&board)
        .assert()
        .success()
        .stdout(predicate::str::contains("Orphan vias: 81"))
        .stdout(predicate::str::contains("GND: 81"));

    viastitch_cli()
        .arg("orphans")
        .arg(&board)
        .arg("--clean")
        .arg("--state")
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 81 orphan vias"));
    assert_eq!(via_count(&board), 0);
}

#[test]
fn test_cli_zones_listing() {
    let mut cmd = viastitch_cli();
    cmd.arg("zones").arg(fixtures_dir().join("mixed_board.json"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("gnd-bottom"))
        .stdout(predicate::str::contains("vcc-island"));
}

#[test]
fn test_cli_output_formats_are_different() {
    let (_dir, board) = scratch_board("square_10mm.json");

    let human = viastitch_cli()
        .arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--dry-run")
        .output()
        .unwrap();
    let json = viastitch_cli()
        .arg("place")
        .arg(&board)
        .arg("--zone")
        .arg("gnd-top")
        .arg("--dry-run")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();

    assert_ne!(
        human.stdout, json.stdout,
        "Different formats should produce different output"
    );
}

//! Simple stitching example: fill one zone of a board snapshot and print
//! the result.

use viastitch::prelude::*;
use std::path::Path;

fn main() -> Result<(), StitchError> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/square_10mm.json".to_string());
    let zone_id = args.next().unwrap_or_else(|| "gnd-top".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_stitch [board.json] [zone id]");
        std::process::exit(1);
    }

    let mut board = MemoryBoard::load(path)?;
    let mut state = StitchState::default();
    let report = StitchCore::update_array(
        &mut board,
        &mut state,
        &zone_id,
        &UpdateOptions {
            dry_run: true,
            ..Default::default()
        },
        &mut RunOptions::default(),
    )?;

    let stats = &report.placement.stats;
    println!("Zone: {}", zone_id);
    println!("Strategy: {}", report.placement.strategy);
    println!("Vias: {}", report.placed());
    println!(
        "Candidates: tested={} inside={} overlap={} edge={}",
        stats.tested, stats.inside, stats.rejected_overlap, stats.rejected_edge
    );

    if let Some(diagnosis) = report.diagnosis() {
        println!("\nNo vias placed: {}", diagnosis);
        for hint in diagnosis.hints(false) {
            println!("  - {}", hint);
        }
        std::process::exit(2);
    }
    Ok(())
}

//! ViaStitch CLI - place and maintain stitching via arrays in board snapshots.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use viastitch::{
    BoardHost, CleanReport, MemoryBoard, OrphanScan, RemoveReport, RunOptions, StitchCore,
    StitchState, TargetPattern, UpdateOptions, UpdateReport, ZoneSettings,
};

/// Exit code when a placement run produced no vias.
const EXIT_NO_VIAS: i32 = 2;

#[derive(Parser)]
#[command(name = "viastitch")]
#[command(about = "Stitching via placement for PCB copper zones", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place (or regenerate) the via array of a zone
    Place {
        #[command(flatten)]
        board: BoardArgs,

        /// Zone id
        #[arg(short, long)]
        zone: String,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Also replace unowned vias of the zone's net inside the zone
        #[arg(long)]
        include_user_vias: bool,

        /// Compute the placement without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Remove the via array owned by a zone
    Remove {
        #[command(flatten)]
        board: BoardArgs,

        /// Zone id
        #[arg(short, long)]
        zone: String,

        /// Also remove unowned vias of the zone's net inside the zone
        #[arg(long)]
        include_user_vias: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Report owned vias that left their zone, optionally removing them
    Orphans {
        #[command(flatten)]
        board: BoardArgs,

        /// Remove orphan vias and stale ids
        #[arg(long)]
        clean: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List the zones of a board
    Zones {
        #[command(flatten)]
        board: BoardArgs,
    },
}

#[derive(Args)]
struct BoardArgs {
    /// Board snapshot (JSON)
    #[arg(value_name = "BOARD")]
    path: PathBuf,

    /// Stitching state file [default: <BOARD>.stitching.json]
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Write the updated board here instead of over BOARD
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl BoardArgs {
    fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| self.path.with_extension("stitching.json"))
    }

    fn output_path(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.path)
    }

    fn load(&self) -> anyhow::Result<(MemoryBoard, StitchState)> {
        let board = MemoryBoard::load(&self.path)
            .with_context(|| format!("failed to load board {}", self.path.display()))?;
        let state_path = self.state_path();
        let state = StitchState::load(&state_path)
            .with_context(|| format!("failed to load state {}", state_path.display()))?;
        tracing::debug!(
            "Using state {} with {} zone entries",
            state_path.display(),
            state.zones.len()
        );
        Ok((board, state))
    }

    fn save(&self, board: &MemoryBoard, state: &StitchState) -> anyhow::Result<()> {
        let output = self.output_path();
        board
            .save(output)
            .with_context(|| format!("failed to write board {}", output.display()))?;
        let state_path = self.state_path();
        state
            .save(&state_path)
            .with_context(|| format!("failed to write state {}", state_path.display()))?;
        Ok(())
    }
}

/// Overrides applied on top of the zone's stored settings. Lengths in mm.
#[derive(Args, Default)]
struct SettingsArgs {
    #[arg(long, value_name = "MM")]
    via_size: Option<f64>,
    #[arg(long, value_name = "MM")]
    via_drill: Option<f64>,
    /// Sets both spacings
    #[arg(long, value_name = "MM")]
    spacing: Option<f64>,
    #[arg(long, value_name = "MM")]
    h_spacing: Option<f64>,
    #[arg(long, value_name = "MM")]
    v_spacing: Option<f64>,
    #[arg(long, value_name = "MM", allow_hyphen_values = true)]
    h_offset: Option<f64>,
    #[arg(long, value_name = "MM", allow_hyphen_values = true)]
    v_offset: Option<f64>,
    #[arg(long, value_name = "MM")]
    edge_margin: Option<f64>,
    #[arg(long, value_name = "MM")]
    pad_margin: Option<f64>,
    /// Check overlaps on every copper layer
    #[arg(long)]
    include_other_layers: bool,
    /// Center columns within each filled segment
    #[arg(long)]
    center_segments: bool,
    /// Place as many vias as fit
    #[arg(long, conflicts_with = "target")]
    maximize: bool,
    /// Place exactly this many vias
    #[arg(long, value_name = "COUNT")]
    target: Option<i64>,
    /// Pattern used with --target
    #[arg(long, value_enum, requires = "target")]
    pattern: Option<PatternArg>,
    /// Fall back to dense packing when the pattern cannot reach --target
    #[arg(long)]
    allow_fallback: bool,
    /// Jitter grid points (non-deterministic)
    #[arg(long)]
    randomize: bool,
}

impl SettingsArgs {
    fn apply(&self, settings: &mut ZoneSettings) {
        let lengths = [
            (self.via_size, &mut settings.via_size),
            (self.via_drill, &mut settings.via_drill),
            (self.h_spacing.or(self.spacing), &mut settings.h_spacing),
            (self.v_spacing.or(self.spacing), &mut settings.v_spacing),
            (self.h_offset, &mut settings.h_offset),
            (self.v_offset, &mut settings.v_offset),
            (self.edge_margin, &mut settings.edge_margin),
            (self.pad_margin, &mut settings.pad_margin),
        ];
        for (value, slot) in lengths {
            if let Some(value) = value {
                *slot = value;
            }
        }

        settings.include_other_layers |= self.include_other_layers;
        settings.center_segments |= self.center_segments;
        settings.allow_heuristic_fallback |= self.allow_fallback;
        settings.randomize |= self.randomize;
        if self.maximize {
            settings.maximize_vias = true;
            settings.target_mode = false;
        }
        if let Some(count) = self.target {
            settings.target_mode = true;
            settings.target_count = count;
            settings.maximize_vias = false;
        }
        if let Some(pattern) = self.pattern {
            settings.target_pattern = pattern.into();
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PatternArg {
    Grid,
    Staggered,
    Spiral,
}

impl From<PatternArg> for TargetPattern {
    fn from(p: PatternArg) -> Self {
        match p {
            PatternArg::Grid => TargetPattern::Grid,
            PatternArg::Staggered => TargetPattern::Staggered,
            PatternArg::Spiral => TargetPattern::Spiral,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Place {
            board,
            zone,
            settings,
            include_user_vias,
            dry_run,
            format,
        } => handle_place(
            &board,
            &zone,
            &settings,
            UpdateOptions {
                include_user_vias,
                dry_run,
            },
            format,
        ),
        Commands::Remove {
            board,
            zone,
            include_user_vias,
            format,
        } => handle_remove(&board, &zone, include_user_vias, format),
        Commands::Orphans {
            board,
            clean,
            format,
        } => handle_orphans(&board, clean, format),
        Commands::Zones { board } => handle_zones(&board),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_place(
    args: &BoardArgs,
    zone_id: &str,
    overrides: &SettingsArgs,
    options: UpdateOptions,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let (mut board, mut state) = args.load()?;
    let settings = {
        let entry = state.zone_mut(zone_id);
        overrides.apply(&mut entry.settings);
        entry.settings.clone()
    };

    let mut run = RunOptions::default().allow_fallback(settings.allow_heuristic_fallback);
    let report = StitchCore::update_array(&mut board, &mut state, zone_id, &options, &mut run)?;

    if report.committed {
        args.save(&board, &state)?;
    }

    match format {
        OutputFormat::Human => print_update(&report, &settings),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.placement.is_empty() && !report.placement.cancelled {
        return Ok(EXIT_NO_VIAS);
    }
    Ok(0)
}

fn handle_remove(
    args: &BoardArgs,
    zone_id: &str,
    include_user_vias: bool,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let (mut board, mut state) = args.load()?;
    let report = StitchCore::remove_array(&mut board, &mut state, zone_id, include_user_vias)?;
    if report.removed() > 0 || report.stale_ids > 0 {
        args.save(&board, &state)?;
    }

    match format {
        OutputFormat::Human => print_remove(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

fn handle_orphans(args: &BoardArgs, clean: bool, format: OutputFormat) -> anyhow::Result<i32> {
    let (mut board, mut state) = args.load()?;

    if !clean {
        let scan = StitchCore::scan_orphans(&board, &state);
        match format {
            OutputFormat::Human => print_scan(&scan),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&scan)?),
        }
        return Ok(0);
    }

    let report = StitchCore::clean_orphans(&mut board, &mut state)?;
    if report.removed > 0 || report.state_changed {
        args.save(&board, &state)?;
    }
    match format {
        OutputFormat::Human => print_clean(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

fn handle_zones(args: &BoardArgs) -> anyhow::Result<i32> {
    let (board, state) = args.load()?;
    for zone in board.zones() {
        let owned = state.owned_ids(&zone.id).len();
        println!(
            "{:<16} net={:<10} layers={:<12} islands={} owned={}{}",
            zone.id,
            if zone.net.is_empty() { "-" } else { zone.net.as_str() },
            zone.layers.to_string(),
            zone.regions.len(),
            owned,
            if zone.keepout { " keepout" } else { "" }
        );
    }
    Ok(0)
}

fn print_update(report: &UpdateReport, settings: &ZoneSettings) {
    let placement = &report.placement;
    let stats = &placement.stats;

    println!("\nZone: {}", report.zone_id);
    println!("{}", "─".repeat(60));
    if report.zone_changed {
        println!("  Zone changed since the last update");
    }
    println!("  Strategy:   {}", placement.strategy);
    if let Some(phase) = placement.phase {
        println!("  Phase:      ({}, {})", phase.x, phase.y);
    }
    println!("  Placed:     {}", placement.len());
    if let Some(target) = &placement.target {
        println!(
            "  Target:     {} requested, {} available ({})",
            target.requested, target.available, target.pattern
        );
        if target.fallback_accepted {
            println!("  Fallback:   dense packing placed {}", target.placed);
        } else if target.fallback_offered {
            println!("  Fallback:   declined (use --allow-fallback)");
        }
    }
    println!(
        "  Candidates: tested={} inside={} overlap={} edge={}",
        stats.tested, stats.inside, stats.rejected_overlap, stats.rejected_edge
    );
    if report.committed {
        println!(
            "  Removed:    {} owned, {} user vias",
            report.removed_owned, report.removed_user
        );
    }
    if report.pruned > 0 {
        println!("  Pruned:     {} owned vias outside the zone", report.pruned);
    }
    if report.stale_ids > 0 {
        println!("  Stale ids:  {}", report.stale_ids);
    }

    if placement.cancelled {
        println!("\n  Cancelled; nothing was changed.");
    } else if let Some(diagnosis) = placement.diagnosis() {
        println!("\n  No vias placed: {}", diagnosis);
        for hint in diagnosis.hints(settings.include_other_layers) {
            println!("    - {}", hint);
        }
    } else if !report.committed {
        println!("\n  Dry run; nothing was changed.");
    }
}

fn print_remove(report: &RemoveReport) {
    if report.removed() == 0 {
        println!("No owned vias were found for zone {}.", report.zone_id);
    } else {
        println!(
            "Removed {} vias from zone {} ({} owned, {} user).",
            report.removed(),
            report.zone_id,
            report.removed_owned,
            report.removed_user
        );
    }
    if report.stale_ids > 0 {
        println!("Cleaned {} stale ids.", report.stale_ids);
    }
}

fn print_scan(scan: &OrphanScan) {
    if scan.is_clean() {
        println!("No orphan vias were found.");
        return;
    }
    if !scan.orphans.is_empty() {
        println!("Orphan vias: {}", scan.orphans.len());
        for (net, count) in &scan.counts_by_net {
            println!("  - {}: {}", net, count);
        }
    }
    if !scan.missing_ids.is_empty() {
        println!("Stale ids: {}", scan.missing_ids.len());
    }
}

fn print_clean(report: &CleanReport) {
    if report.scan.is_clean() {
        println!("No orphan vias were found.");
        return;
    }
    println!(
        "Removed {} orphan vias and cleaned {} stale ids.",
        report.removed, report.stale_cleaned
    );
    for (net, count) in &report.scan.counts_by_net {
        println!("  - {}: {}", net, count);
    }
}

//! Phase search over grid origin offsets.
//!
//! Every phase is a full trial with reservations. Trials are ranked by
//! [`PlacementStats::score`]; the default phase is tried first and the
//! others follow in ascending (y, x) order. A later phase replaces the
//! current best only with a strictly greater score, so ties keep the
//! earlier phase. Runs are deterministic, so the winning trial's result is
//! returned as-is instead of being re-run.

use super::{grid, CancelFlag, PlacementParams, PlacementStats, StrategyRun};
use crate::candidates::Phase;
use crate::geometry::BoundingBox;
use crate::obstacles::ObstacleIndex;
use crate::zone::Zone;

/// Horizontal phase samples for the maximize grid without centering.
pub const MAXIMIZE_SAMPLES_X: usize = 6;
/// Vertical phase samples for the maximize grid.
pub const MAXIMIZE_SAMPLES_Y: usize = 8;

/// `base mod pitch` first, then `i * pitch / samples` for each sample in
/// ascending order, without duplicates.
pub fn phase_offsets(pitch: i64, base: i64, samples: usize) -> Vec<i64> {
    if pitch <= 0 {
        return vec![0];
    }
    let first = base.rem_euclid(pitch);
    let mut rest: Vec<i64> = (0..samples.max(1) as i64)
        .map(|i| i * pitch / samples.max(1) as i64)
        .filter(|offset| *offset != first)
        .collect();
    rest.sort_unstable();
    rest.dedup();

    let mut offsets = Vec::with_capacity(rest.len() + 1);
    offsets.push(first);
    if samples > 1 {
        offsets.extend(rest);
    }
    offsets
}

/// All phase combinations, default first, then ascending by (y, x).
pub fn candidate_phases(
    pitch: (i64, i64),
    base: Phase,
    samples_x: usize,
    samples_y: usize,
) -> Vec<Phase> {
    let xs = phase_offsets(pitch.0, base.x, samples_x);
    let ys = phase_offsets(pitch.1, base.y, samples_y);
    let default = Phase::new(xs[0], ys[0]);

    let mut others: Vec<Phase> = ys
        .iter()
        .flat_map(|&y| xs.iter().map(move |&x| Phase::new(x, y)))
        .filter(|p| *p != default)
        .collect();
    others.sort_by_key(|p| (p.y, p.x));

    let mut phases = Vec::with_capacity(others.len() + 1);
    phases.push(default);
    phases.extend(others);
    phases
}

/// Run `trial` for each phase and keep the best-scoring run.
///
/// Stops early when `cancel` is raised; the best run so far is returned
/// with its `cancelled` flag set.
pub fn search<F>(phases: &[Phase], cancel: &CancelFlag, mut trial: F) -> StrategyRun
where
    F: FnMut(Phase) -> StrategyRun,
{
    let mut best: Option<StrategyRun> = None;
    for &phase in phases {
        if cancel.is_cancelled() {
            break;
        }
        let run = trial(phase);
        tracing::debug!(
            "Phase ({}, {}): accepted={} overlap={} edge={}",
            phase.x,
            phase.y,
            run.stats.accepted,
            run.stats.rejected_overlap,
            run.stats.rejected_edge
        );
        let interrupted = run.cancelled;
        best = match best {
            Some(current) if !beats(&run.stats, &current.stats) => Some(current),
            _ => Some(run),
        };
        if interrupted {
            break;
        }
    }

    let mut best = best.unwrap_or_default();
    if cancel.is_cancelled() {
        best.cancelled = true;
    }
    best
}

fn beats(candidate: &PlacementStats, current: &PlacementStats) -> bool {
    candidate.score() > current.score()
}

/// Maximize-flavoured grid: centered or inset columns at the user pitch,
/// searched over 6x8 phases (1x8 when centering pins the columns).
pub(crate) fn search_maximize_grid(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    cancel: &CancelFlag,
) -> StrategyRun {
    let pitch = params.effective_pitch();
    let generator = grid::generator(zone, params, bounds, pitch, true);
    let samples_x = if params.center_segments {
        1
    } else {
        MAXIMIZE_SAMPLES_X
    };
    let phases = candidate_phases(
        pitch,
        grid::default_phase(params, pitch),
        samples_x,
        MAXIMIZE_SAMPLES_Y,
    );
    let best = search(&phases, cancel, |phase| {
        grid::run_grid(zone, index, params, &generator, phase, None, cancel)
    });
    tracing::debug!(
        "Maximize grid in zone {}: best phase ({}, {}) of {} with {} vias",
        zone.label(),
        best.phase.x,
        best.phase.y,
        phases.len(),
        best.accepted.len()
    );
    best
}

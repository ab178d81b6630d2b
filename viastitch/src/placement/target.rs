//! Target-count placement.
//!
//! The selected pattern is tried over a small set of phases (the spiral
//! once, from the zone center) and the best run is kept. When it yields at
//! least the requested count, a spread subset of exactly that many points
//! is returned. Otherwise the caller is offered the pack strategy as a
//! fallback, reduced the same way.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::grid::{self, RowScan};
use super::{
    pack, phase, CancelFlag, Candidate, CandidateOrigin, CandidateOutcome, Evaluator,
    PlacementParams, PlacementResult, RunOptions, Strategy, StrategyRun, TargetPattern,
    TargetSpec,
};
use crate::candidates::{ColumnLayout, Phase, RowGenerator};
use crate::geometry::{BoundingBox, Point};
use crate::obstacles::ObstacleIndex;
use crate::zone::Zone;

/// Phase samples per axis for grid and staggered patterns.
pub const TARGET_PHASE_SAMPLES: usize = 3;

/// Passed to the fallback callback when a pattern falls short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetShortfall {
    pub requested: usize,
    pub available: usize,
    pub pattern: TargetPattern,
}

/// How a target-count request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub requested: usize,
    /// Points the deterministic pattern could place.
    pub available: usize,
    pub pattern: TargetPattern,
    pub fallback_offered: bool,
    pub fallback_accepted: bool,
    pub placed: usize,
}

/// Staggered steps as `(pitch, half)`. Rows sit `half` apart and odd rows
/// shift by `half`, so diagonal neighbours are `half * sqrt(2)` apart; the
/// half step is rounded up before doubling so that distance never drops
/// below the minimum spacing.
pub fn staggered_steps(params: &PlacementParams) -> (i64, i64) {
    let (px, py) = params.effective_pitch();
    let diagonal = (params.min_spacing() as f64 / 2f64.sqrt()).ceil() as i64;
    let half = (px.min(py) / 2).max(diagonal).max(1);
    (2 * half, half)
}

/// Points along an Archimedean spiral around `center`, arms `spacing`
/// apart and consecutive points about `spacing` apart, out to `max_radius`.
pub fn spiral_points(center: Point, spacing: i64, max_radius: f64) -> Vec<Point> {
    let spacing = spacing.max(1) as f64;
    let b = spacing / (2.0 * PI);
    let mut points = vec![center];
    let mut theta = 2.0 * PI;
    loop {
        let r = b * theta;
        if r > max_radius {
            break;
        }
        let p = Point::from_f64(
            center.x as f64 + r * theta.cos(),
            center.y as f64 + r * theta.sin(),
        );
        if points.last() != Some(&p) {
            points.push(p);
        }
        theta += 2.0 * (spacing / (2.0 * r)).min(1.0).asin();
    }
    points
}

/// Farthest-point subset of `count` candidates.
///
/// Seeds with the candidate nearest `center`, then repeatedly adds the one
/// whose distance to the chosen set is largest. Ties go to the earlier
/// candidate. The subset keeps the input order.
pub fn spread_subset(candidates: &[Candidate], count: usize, center: Point) -> Vec<Candidate> {
    if count >= candidates.len() {
        return candidates.to_vec();
    }
    if count == 0 {
        return Vec::new();
    }

    let mut chosen = vec![false; candidates.len()];
    let seed = candidates
        .iter()
        .enumerate()
        .min_by(|a, b| {
            let da = a.1.position.distance_sq(&center);
            let db = b.1.position.distance_sq(&center);
            da.total_cmp(&db).then(a.0.cmp(&b.0))
        })
        .map_or(0, |(i, _)| i);
    chosen[seed] = true;

    let mut nearest: Vec<f64> = candidates
        .iter()
        .map(|c| c.position.distance_sq(&candidates[seed].position))
        .collect();

    for _ in 1..count {
        let mut pick: Option<usize> = None;
        for (i, d) in nearest.iter().enumerate() {
            if chosen[i] {
                continue;
            }
            if pick.map_or(true, |p| *d > nearest[p]) {
                pick = Some(i);
            }
        }
        let Some(next) = pick else { break };
        chosen[next] = true;
        let origin = candidates[next].position;
        for (i, d) in nearest.iter_mut().enumerate() {
            *d = d.min(candidates[i].position.distance_sq(&origin));
        }
    }

    candidates
        .iter()
        .zip(&chosen)
        .filter_map(|(c, keep)| keep.then_some(*c))
        .collect()
}

fn tag(mut run: StrategyRun, pattern: TargetPattern) -> StrategyRun {
    let phase = run.phase;
    for c in &mut run.accepted {
        c.origin = CandidateOrigin::Pattern { pattern, phase };
    }
    run
}

fn run_spiral(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    cancel: &CancelFlag,
) -> StrategyRun {
    index.clear_reservations();
    let evaluator = Evaluator::new(zone, params);
    let spacing = pack::pack_spacing(params);
    let center = bounds.center();
    let reach = (bounds.width() as f64).hypot(bounds.height() as f64) / 2.0 + spacing as f64;
    let origin = CandidateOrigin::Pattern {
        pattern: TargetPattern::Spiral,
        phase: Phase::default(),
    };

    let mut run = StrategyRun::default();
    for position in spiral_points(center, spacing, reach) {
        if cancel.is_cancelled() {
            run.cancelled = true;
            break;
        }
        let outcome = evaluator.evaluate(index, position);
        run.stats.record(outcome);
        if outcome == CandidateOutcome::Accepted {
            run.accepted.push(Candidate { position, origin });
        }
    }
    run
}

/// Best run of `pattern` across its phases.
pub(crate) fn best_pattern_run(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    pattern: TargetPattern,
    cancel: &CancelFlag,
) -> StrategyRun {
    match pattern {
        TargetPattern::Grid => {
            let (px, py) = params.effective_pitch();
            let floor = params.min_spacing();
            let pitch = (px.max(floor), py.max(floor));
            let generator = grid::generator(zone, params, bounds, pitch, false);
            let phases = phase::candidate_phases(
                pitch,
                grid::default_phase(params, pitch),
                TARGET_PHASE_SAMPLES,
                TARGET_PHASE_SAMPLES,
            );
            let run = phase::search(&phases, cancel, |phase| {
                grid::run_grid(zone, index, params, &generator, phase, None, cancel)
            });
            tag(run, pattern)
        }
        TargetPattern::Staggered => {
            let (pitch, row_step) = staggered_steps(params);
            let generator = RowGenerator::new(
                &zone.regions,
                bounds,
                pitch,
                row_step,
                ColumnLayout::Aligned,
                0.0,
            );
            let phases = phase::candidate_phases(
                (pitch, row_step),
                grid::default_phase(params, (pitch, row_step)),
                TARGET_PHASE_SAMPLES,
                TARGET_PHASE_SAMPLES,
            );
            let run = phase::search(&phases, cancel, |phase| {
                let scan = RowScan {
                    generator: &generator,
                    phase,
                    stagger: row_step,
                    jitter: None,
                    origin: CandidateOrigin::Pattern { pattern, phase },
                };
                scan.run(zone, index, params, cancel)
            });
            tag(run, pattern)
        }
        TargetPattern::Spiral => run_spiral(zone, index, params, bounds, cancel),
    }
}

pub(crate) fn place_target(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    spec: TargetSpec,
    options: &mut RunOptions<'_>,
) -> PlacementResult {
    let cancel = options.cancel.clone();
    let center = bounds.center();
    let mut best = best_pattern_run(zone, index, params, bounds, spec.pattern, &cancel);
    let available = best.accepted.len();
    let mut report = TargetReport {
        requested: spec.count,
        available,
        pattern: spec.pattern,
        fallback_offered: false,
        fallback_accepted: false,
        placed: 0,
    };
    tracing::debug!(
        "Target {} in zone {}: pattern {} yields {}",
        spec.count,
        zone.label(),
        spec.pattern,
        available
    );

    let mut strategy = Strategy::Target;
    if available >= spec.count {
        best.accepted = spread_subset(&best.accepted, spec.count, center);
    } else if !best.cancelled {
        let shortfall = TargetShortfall {
            requested: spec.count,
            available,
            pattern: spec.pattern,
        };
        report.fallback_offered = true;
        tracing::warn!(
            "Pattern {} fits {} of {} requested vias in zone {}",
            spec.pattern,
            available,
            spec.count,
            zone.label()
        );
        if options.offer_fallback(&shortfall) {
            let mut packed = pack::run_pack(zone, index, params, bounds, &cancel);
            packed.accepted = spread_subset(&packed.accepted, spec.count, center);
            report.fallback_accepted = true;
            if packed.accepted.len() > available {
                strategy = Strategy::TargetFallback;
                best = packed;
            }
        }
    }

    let phase = (strategy == Strategy::Target && spec.pattern != TargetPattern::Spiral)
        .then_some(best.phase);
    let mut result = PlacementResult::from_run(strategy, best, params, &zone.net, phase);
    report.placed = result.len();
    result.target = Some(report);
    result
}

//! Fixed-pitch grid strategy.

use rand::Rng;

use super::{
    CancelFlag, Candidate, CandidateOrigin, CandidateOutcome, Evaluator, PlacementParams,
    StrategyRun,
};
use crate::candidates::{ColumnLayout, Phase, RowGenerator};
use crate::geometry::{BoundingBox, Point};
use crate::obstacles::ObstacleIndex;
use crate::zone::Zone;

/// Row generator for grid-style runs.
///
/// Centering and maximize both lay columns out over intervals inset by
/// the boundary margin; the plain grid uses the raw coverage.
pub(crate) fn generator<'a>(
    zone: &'a Zone,
    params: &PlacementParams,
    bounds: BoundingBox,
    pitch: (i64, i64),
    maximize: bool,
) -> RowGenerator<'a> {
    let layout = if params.center_segments {
        ColumnLayout::Centered
    } else {
        ColumnLayout::Aligned
    };
    let inset = if params.center_segments || maximize {
        params.boundary_margin() as f64
    } else {
        0.0
    };
    RowGenerator::new(&zone.regions, bounds, pitch.0, pitch.1, layout, inset)
}

/// The user's offset reduced into one pitch.
pub fn default_phase(params: &PlacementParams, pitch: (i64, i64)) -> Phase {
    Phase::new(
        params.offset_x.rem_euclid(pitch.0.max(1)),
        params.offset_y.rem_euclid(pitch.1.max(1)),
    )
}

/// One pass over every row of `generator` at `phase`.
///
/// Candidates are tested in row order; each acceptance is reserved in
/// `index` before the next candidate. `jitter` moves every candidate by a
/// random amount up to the given (x, y) before it is tested.
pub fn run_grid(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    generator: &RowGenerator<'_>,
    phase: Phase,
    jitter: Option<(i64, i64)>,
    cancel: &CancelFlag,
) -> StrategyRun {
    let scan = RowScan {
        generator,
        phase,
        stagger: 0,
        jitter,
        origin: CandidateOrigin::Grid { phase },
    };
    scan.run(zone, index, params, cancel)
}

/// A configured pass over a row generator.
pub(crate) struct RowScan<'g, 'z> {
    pub generator: &'g RowGenerator<'z>,
    pub phase: Phase,
    /// Extra x shift applied to every other row.
    pub stagger: i64,
    pub jitter: Option<(i64, i64)>,
    pub origin: CandidateOrigin,
}

impl RowScan<'_, '_> {
    pub(crate) fn run(
        &self,
        zone: &Zone,
        index: &mut ObstacleIndex,
        params: &PlacementParams,
        cancel: &CancelFlag,
    ) -> StrategyRun {
        index.clear_reservations();
        let evaluator = Evaluator::new(zone, params);
        let mut rng = self.jitter.map(|_| rand::thread_rng());
        let mut run = StrategyRun {
            phase: self.phase,
            ..Default::default()
        };

        'rows: for (row, y) in self.generator.row_ys(self.phase).enumerate() {
            if cancel.is_cancelled() {
                run.cancelled = true;
                break;
            }
            let shift = if row % 2 == 1 { self.stagger } else { 0 };
            let row_phase = Phase::new(self.phase.x + shift, self.phase.y);
            for x in self.generator.columns(y, row_phase) {
                if cancel.is_cancelled() {
                    run.cancelled = true;
                    break 'rows;
                }
                let position = match (self.jitter, rng.as_mut()) {
                    (Some((jx, jy)), Some(rng)) => Point::new(
                        x + rng.gen_range(-jx..=jx),
                        y + rng.gen_range(-jy..=jy),
                    ),
                    _ => Point::new(x, y),
                };
                let outcome = evaluator.evaluate(index, position);
                run.stats.record(outcome);
                if outcome == CandidateOutcome::Accepted {
                    run.accepted.push(Candidate {
                        position,
                        origin: self.origin,
                    });
                }
            }
        }
        run
    }
}

/// Plain grid mode: the user's pitch and offset, optional jitter.
pub(crate) fn run_default(
    zone: &Zone,
    index: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    cancel: &CancelFlag,
) -> StrategyRun {
    let pitch = params.effective_pitch();
    let generator = generator(zone, params, bounds, pitch, false);
    let jitter = params
        .randomize
        .then_some(((pitch.0 / 5).max(0), (pitch.1 / 5).max(0)));
    let phase = default_phase(params, pitch);
    tracing::debug!(
        "Grid run in zone {}: pitch {}x{}, phase ({}, {}), up to {} candidates",
        zone.label(),
        pitch.0,
        pitch.1,
        phase.x,
        phase.y,
        generator.estimated_candidates()
    );
    run_grid(zone, index, params, &generator, phase, jitter, cancel)
}

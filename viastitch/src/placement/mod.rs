//! Via placement engine.
//!
//! [`place_vias`] validates the parameters, picks a strategy and returns
//! the accepted points with their statistics. The engine never touches the
//! board: callers apply the returned [`ViaPlacement`]s themselves.
//!
//! # Strategies
//! - `grid` - one pass over the phase-aligned (or centered) grid
//! - `phase` - grid trials over several origin offsets, best score wins
//! - `pack` - dense lattice plus greedy independent-set packing
//! - `target` - exact-count patterns with spread-subset selection

pub mod grid;
pub mod pack;
pub mod params;
pub mod phase;
pub mod stats;
pub mod target;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::StitchError;
use crate::geometry::{BoundingBox, Point};
use crate::obstacles::ObstacleIndex;
use crate::zone::Zone;

pub use crate::candidates::Phase;
pub use params::{PlacementParams, TargetPattern, TargetSpec};
pub use stats::{CandidateOutcome, PlacementStats, ZeroPlacementDiagnosis};
pub use target::{TargetReport, TargetShortfall};

/// Cooperative cancellation shared between a running placement and the
/// caller. Checked once per row and once per candidate.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Decides whether target mode may fall back to packing after a shortfall.
pub type FallbackDecision<'a> = Box<dyn FnMut(&TargetShortfall) -> bool + 'a>;

/// Per-run switches that are not part of the persisted settings.
#[derive(Default)]
pub struct RunOptions<'a> {
    pub cancel: CancelFlag,
    /// Without a callback the fallback is declined.
    pub fallback: Option<FallbackDecision<'a>>,
}

impl<'a> RunOptions<'a> {
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_fallback<F>(mut self, decide: F) -> Self
    where
        F: FnMut(&TargetShortfall) -> bool + 'a,
    {
        self.fallback = Some(Box::new(decide));
        self
    }

    /// Fixed answer, as configured by `AllowHeuristicFallback`.
    pub fn allow_fallback(self, allow: bool) -> Self {
        self.with_fallback(move |_| allow)
    }

    fn offer_fallback(&mut self, shortfall: &TargetShortfall) -> bool {
        match self.fallback.as_mut() {
            Some(decide) => decide(shortfall),
            None => false,
        }
    }
}

impl fmt::Debug for RunOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cancel", &self.cancel)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Which pass produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateOrigin {
    Grid { phase: Phase },
    Pack { pass: usize },
    Pattern { pattern: TargetPattern, phase: Phase },
}

/// A trial point and its lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub position: Point,
    pub origin: CandidateOrigin,
}

/// A via the caller should create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaPlacement {
    pub position: Point,
    pub diameter: i64,
    pub drill: i64,
    pub net: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Grid,
    MaximizeGrid,
    Pack,
    Target,
    TargetFallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Grid => "grid",
            Strategy::MaximizeGrid => "maximize-grid",
            Strategy::Pack => "pack",
            Strategy::Target => "target",
            Strategy::TargetFallback => "target-fallback",
        };
        f.write_str(name)
    }
}

/// Output of one strategy before it is turned into vias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyRun {
    pub accepted: Vec<Candidate>,
    pub stats: PlacementStats,
    pub phase: Phase,
    pub cancelled: bool,
}

impl StrategyRun {
    pub fn points(&self) -> Vec<Point> {
        self.accepted.iter().map(|c| c.position).collect()
    }
}

/// Final result of a placement call. Not mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub strategy: Strategy,
    pub accepted: Vec<Candidate>,
    pub vias: Vec<ViaPlacement>,
    pub stats: PlacementStats,
    /// Grid origin used by grid-based strategies.
    pub phase: Option<Phase>,
    pub target: Option<TargetReport>,
    pub cancelled: bool,
}

impl PlacementResult {
    fn from_run(
        strategy: Strategy,
        run: StrategyRun,
        params: &PlacementParams,
        net: &str,
        phase: Option<Phase>,
    ) -> Self {
        let vias = run
            .accepted
            .iter()
            .map(|c| ViaPlacement {
                position: c.position,
                diameter: params.via_diameter,
                drill: params.drill_diameter,
                net: net.to_string(),
            })
            .collect();
        Self {
            strategy,
            accepted: run.accepted,
            vias,
            stats: run.stats,
            phase,
            target: None,
            cancelled: run.cancelled,
        }
    }

    pub fn len(&self) -> usize {
        self.vias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vias.is_empty()
    }

    pub fn points(&self) -> Vec<Point> {
        self.accepted.iter().map(|c| c.position).collect()
    }

    pub fn diagnosis(&self) -> Option<ZeroPlacementDiagnosis> {
        if self.is_empty() {
            self.stats.diagnose()
        } else {
            None
        }
    }
}

/// Containment and overlap checks shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Evaluator<'a> {
    zone: &'a Zone,
    margin: f64,
    via_radius: i64,
    pad_margin: i64,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(zone: &'a Zone, params: &PlacementParams) -> Self {
        Self {
            zone,
            margin: params.boundary_margin() as f64,
            via_radius: params.via_radius(),
            pad_margin: params.pad_margin,
        }
    }

    /// `None` when the point passes the boundary margin test.
    pub(crate) fn containment(&self, p: Point) -> Option<CandidateOutcome> {
        if self.zone.contains_with_margin(p, self.margin) {
            None
        } else if self.zone.contains(p) {
            Some(CandidateOutcome::RejectedEdge)
        } else {
            Some(CandidateOutcome::Outside)
        }
    }

    /// Full check against board items and earlier acceptances. Accepted
    /// points are reserved in `index`.
    pub(crate) fn evaluate(&self, index: &mut ObstacleIndex, p: Point) -> CandidateOutcome {
        if let Some(rejected) = self.containment(p) {
            return rejected;
        }
        if index.conflicts(p, self.via_radius, self.pad_margin) {
            return CandidateOutcome::RejectedOverlap;
        }
        index.reserve(p, self.via_radius);
        CandidateOutcome::Accepted
    }

    /// Check against board items only.
    pub(crate) fn evaluate_static(&self, index: &ObstacleIndex, p: Point) -> CandidateOutcome {
        if let Some(rejected) = self.containment(p) {
            return rejected;
        }
        if index.conflicts_static(p, self.via_radius, self.pad_margin) {
            return CandidateOutcome::RejectedOverlap;
        }
        CandidateOutcome::Accepted
    }
}

/// Filled-copper bounds or a typed error when the zone has no fill.
pub(crate) fn usable_bounds(zone: &Zone) -> Result<BoundingBox, StitchError> {
    if !zone.is_filled() {
        return Err(StitchError::NoUsableZoneGeometry(zone.label().to_string()));
    }
    zone.bounds()
        .ok_or_else(|| StitchError::NoUsableZoneGeometry(zone.label().to_string()))
}

/// Place stitching vias in `zone`.
///
/// `obstacles` must describe the board without the zone's own array. Its
/// reservations are cleared before each trial, so the same index can be
/// reused across calls.
pub fn place_vias(
    zone: &Zone,
    obstacles: &mut ObstacleIndex,
    params: &PlacementParams,
    options: &mut RunOptions<'_>,
) -> Result<PlacementResult, StitchError> {
    params.validate()?;
    let bounds = usable_bounds(zone)?;

    let result = if let Some(spec) = params.target {
        target::place_target(zone, obstacles, params, bounds, spec, options)
    } else if params.maximize {
        place_maximize(zone, obstacles, params, bounds, &options.cancel)
    } else {
        let run = grid::run_default(zone, obstacles, params, bounds, &options.cancel);
        let phase = run.phase;
        PlacementResult::from_run(Strategy::Grid, run, params, &zone.net, Some(phase))
    };

    if result.cancelled {
        tracing::warn!(
            "Placement in zone {} cancelled after {} candidates",
            zone.label(),
            result.stats.tested
        );
    }
    tracing::info!(
        "Placed {} vias in zone {} ({}): tested={} inside={} overlap={} edge={}",
        result.len(),
        zone.label(),
        result.strategy,
        result.stats.tested,
        result.stats.inside,
        result.stats.rejected_overlap,
        result.stats.rejected_edge
    );
    Ok(result)
}

/// Phase-searched grid and pack; the larger wins, ties go to the grid.
fn place_maximize(
    zone: &Zone,
    obstacles: &mut ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    cancel: &CancelFlag,
) -> PlacementResult {
    let grid_run = phase::search_maximize_grid(zone, obstacles, params, bounds, cancel);
    if grid_run.cancelled {
        let phase = grid_run.phase;
        return PlacementResult::from_run(
            Strategy::MaximizeGrid,
            grid_run,
            params,
            &zone.net,
            Some(phase),
        );
    }

    let pack_run = pack::run_pack(zone, obstacles, params, bounds, cancel);
    tracing::debug!(
        "Maximize in zone {}: grid={} pack={}",
        zone.label(),
        grid_run.accepted.len(),
        pack_run.accepted.len()
    );
    if pack_run.accepted.len() > grid_run.accepted.len() {
        PlacementResult::from_run(Strategy::Pack, pack_run, params, &zone.net, None)
    } else {
        let phase = grid_run.phase;
        PlacementResult::from_run(
            Strategy::MaximizeGrid,
            grid_run,
            params,
            &zone.net,
            Some(phase),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::obstacles::Obstacle;
    use crate::zone::{FilledRegion, LayerSet};

    fn square_zone(size: i64) -> Zone {
        Zone {
            id: "z".into(),
            net: "GND".into(),
            layers: LayerSet::new(["F.Cu"]),
            outline: Polygon::rect(0, 0, size, size),
            regions: vec![FilledRegion::new(Polygon::rect(0, 0, size, size))],
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_params_fail_fast() {
        let zone = square_zone(10_000_000);
        let mut index = ObstacleIndex::new(500_000);
        let params = PlacementParams {
            drill_diameter: 600_000,
            ..Default::default()
        };
        let err = place_vias(&zone, &mut index, &params, &mut RunOptions::default()).unwrap_err();
        assert!(matches!(err, StitchError::InvalidParameters(_)));
    }

    #[test]
    fn test_unfilled_zone_reported() {
        let mut zone = square_zone(10_000_000);
        zone.regions.clear();
        let mut index = ObstacleIndex::new(500_000);
        let err = place_vias(
            &zone,
            &mut index,
            &PlacementParams::default(),
            &mut RunOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StitchError::NoUsableZoneGeometry(_)));
    }

    #[test]
    fn test_grid_vias_carry_net_and_sizes() {
        let zone = square_zone(3_000_000);
        let mut index = ObstacleIndex::new(500_000);
        let result = place_vias(
            &zone,
            &mut index,
            &PlacementParams::default(),
            &mut RunOptions::default(),
        )
        .unwrap();
        // Rows and columns 1mm and 2mm are the only interior grid points
        assert_eq!(result.len(), 4);
        assert_eq!(result.strategy, Strategy::Grid);
        for via in &result.vias {
            assert_eq!(via.net, "GND");
            assert_eq!(via.diameter, 500_000);
            assert_eq!(via.drill, 300_000);
        }
    }

    #[test]
    fn test_zero_placement_diagnosis() {
        let zone = square_zone(3_000_000);
        let mut index = ObstacleIndex::new(500_000);
        index.insert(Obstacle::Area {
            regions: zone.regions.clone(),
            bounds: BoundingBox::new(0, 0, 3_000_000, 3_000_000),
        });
        let result = place_vias(
            &zone,
            &mut index,
            &PlacementParams::default(),
            &mut RunOptions::default(),
        )
        .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.diagnosis(), Some(ZeroPlacementDiagnosis::AllOverlap));
    }

    #[test]
    fn test_cancelled_before_start() {
        let zone = square_zone(10_000_000);
        let mut index = ObstacleIndex::new(500_000);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut options = RunOptions::default().with_cancel(cancel);
        let result =
            place_vias(&zone, &mut index, &PlacementParams::default(), &mut options).unwrap();
        assert!(result.cancelled);
        assert!(result.is_empty());
    }

    #[test]
    fn test_maximize_never_below_plain_grid() {
        let zone = square_zone(10_000_000);
        let mut index = ObstacleIndex::new(500_000);
        let plain = place_vias(
            &zone,
            &mut index,
            &PlacementParams::default(),
            &mut RunOptions::default(),
        )
        .unwrap();
        let maximize = place_vias(
            &zone,
            &mut index,
            &PlacementParams {
                maximize: true,
                ..Default::default()
            },
            &mut RunOptions::default(),
        )
        .unwrap();
        assert!(maximize.len() >= plain.len());
    }
}

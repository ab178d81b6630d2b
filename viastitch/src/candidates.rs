//! Row/interval candidate generator.
//!
//! Rows step by the vertical pitch from a phase-aligned start. On each row
//! the zone's covered x-intervals are computed once, and candidate columns
//! are emitted per interval, either on the phase-aligned grid or centered
//! within the interval.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Interval};
use crate::zone::{row_coverage, FilledRegion};

/// Origin offset of a placement grid, in board units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Phase {
    pub x: i64,
    pub y: i64,
}

impl Phase {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// First grid coordinate at or after `min` that is congruent to `phase`
/// modulo `pitch`.
pub fn aligned_start(min: i64, phase: i64, pitch: i64) -> i64 {
    if pitch <= 0 {
        return min;
    }
    min + (phase - min).rem_euclid(pitch)
}

/// Grid points `start + k * pitch` that fall inside any interval.
pub fn aligned_columns(intervals: &[Interval], start: i64, pitch: i64) -> Vec<i64> {
    let mut columns = Vec::new();
    if pitch <= 0 {
        return columns;
    }
    let step = pitch as f64;
    for iv in intervals {
        if iv.end < iv.start {
            continue;
        }
        let k0 = ((iv.start - start as f64) / step).ceil() as i64;
        let k1 = ((iv.end - start as f64) / step).floor() as i64;
        columns.extend((k0..=k1).map(|k| start + k * pitch));
    }
    columns
}

/// `floor(width / pitch) + 1` points per interval, centered in it.
///
/// A zero-width interval still gets one point.
pub fn centered_columns(intervals: &[Interval], pitch: i64) -> Vec<i64> {
    let mut columns = Vec::new();
    if pitch <= 0 {
        return columns;
    }
    let step = pitch as f64;
    for iv in intervals {
        let span = iv.width();
        if span < 0.0 {
            continue;
        }
        let n = (span / step).floor() as i64 + 1;
        let first = iv.start + 0.5 * (span - (n - 1) as f64 * step);
        columns.extend((0..n).map(|i| (first + i as f64 * step).round() as i64));
    }
    columns
}

/// How columns are laid out inside each covered interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// Phase-aligned grid points.
    Aligned,
    /// `floor(width / pitch) + 1` points centered in each interval.
    Centered,
}

/// Generates candidate rows for one zone and one pitch.
///
/// A positive `inset` shrinks every covered interval from both ends
/// before columns are laid out.
#[derive(Debug, Clone)]
pub struct RowGenerator<'a> {
    regions: &'a [FilledRegion],
    bounds: BoundingBox,
    pitch_x: i64,
    pitch_y: i64,
    layout: ColumnLayout,
    inset: f64,
}

impl<'a> RowGenerator<'a> {
    pub fn new(
        regions: &'a [FilledRegion],
        bounds: BoundingBox,
        pitch_x: i64,
        pitch_y: i64,
        layout: ColumnLayout,
        inset: f64,
    ) -> Self {
        Self {
            regions,
            bounds,
            pitch_x: pitch_x.max(1),
            pitch_y: pitch_y.max(1),
            layout,
            inset,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Row heights for `phase`, ascending.
    pub fn row_ys(&self, phase: Phase) -> impl Iterator<Item = i64> {
        let start = aligned_start(self.bounds.min_y, phase.y, self.pitch_y);
        let (max_y, pitch) = (self.bounds.max_y, self.pitch_y);
        (0..)
            .map(move |k: i64| start + k * pitch)
            .take_while(move |y| *y <= max_y)
    }

    /// Candidate x positions on row `y` for `phase`, ascending.
    pub fn columns(&self, y: i64, phase: Phase) -> Vec<i64> {
        let mut coverage = row_coverage(self.regions, y as f64);
        if self.inset > 0.0 {
            coverage = coverage
                .iter()
                .filter_map(|iv| iv.inset(self.inset))
                .collect();
        }
        match self.layout {
            ColumnLayout::Aligned => {
                let start = aligned_start(self.bounds.min_x, phase.x, self.pitch_x);
                aligned_columns(&coverage, start, self.pitch_x)
            }
            ColumnLayout::Centered => centered_columns(&coverage, self.pitch_x),
        }
    }

    /// Upper bound on candidates for a phase, used for logging.
    pub fn estimated_candidates(&self) -> i64 {
        let cols = self.bounds.width() / self.pitch_x + 1;
        let rows = self.bounds.height() / self.pitch_y + 1;
        cols.saturating_mul(rows)
    }
}

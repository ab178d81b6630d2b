//! Zone model and the zone containment oracle.
//!
//! A zone is one net on one or more copper layers, filled as one or more
//! disjoint islands. Each island is an outline with optional holes
//! (copper voids). Containment is always evaluated against the filled
//! islands, never against the drawn outline.
//!
//! The boundary margin test is the edge-distance variant: a point passes
//! when it lies inside an island and its distance to that island's
//! outline and hole edges is at least `margin`. Within one island that is
//! the exact distance to the boundary, so the margin disk fits. Islands
//! are checked one at a time, so a disk that straddles two abutting
//! islands (e.g. fills from different layers) is rejected even though it
//! is fully covered by copper.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::geometry::{
    intervals_from_crossings, merge_intervals, min_edge_distance, point_in_polygon,
    ring_x_intersections, subtract_intervals, BoundingBox, Interval, Point, Polygon,
};

/// Copper layers an item lives on, by canonical name (e.g. `F.Cu`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSet(pub BTreeSet<String>);

impl LayerSet {
    pub fn new<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(layers.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn intersects(&self, other: &LayerSet) -> bool {
        self.0.iter().any(|l| other.0.contains(l))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "{}", names.join(","))
    }
}

/// One filled copper island: an outline minus its holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilledRegion {
    pub outline: Polygon,
    #[serde(default)]
    pub holes: Vec<Polygon>,
}

impl FilledRegion {
    pub fn new(outline: Polygon) -> Self {
        Self {
            outline,
            holes: Vec::new(),
        }
    }

    pub fn with_hole(mut self, hole: Polygon) -> Self {
        self.holes.push(hole);
        self
    }

    /// Inside the outline and outside every hole.
    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.outline.points)
            && !self.holes.iter().any(|h| point_in_polygon(p, &h.points))
    }

    /// Distance from `p` to the nearest boundary edge (outline or hole).
    pub fn boundary_distance(&self, p: Point) -> f64 {
        self.holes
            .iter()
            .map(|h| min_edge_distance(p, &h.points))
            .fold(min_edge_distance(p, &self.outline.points), f64::min)
    }

    /// Covered x-intervals of this island on the scanline `y`.
    pub fn row_coverage(&self, y: f64) -> Vec<Interval> {
        let outline = intervals_from_crossings(&ring_x_intersections(&self.outline.points, y));
        if outline.is_empty() || self.holes.is_empty() {
            return outline;
        }

        let holes: Vec<Interval> = self
            .holes
            .iter()
            .flat_map(|h| intervals_from_crossings(&ring_x_intersections(&h.points, y)))
            .collect();
        subtract_intervals(&outline, &holes)
    }
}

/// A copper zone as seen by the placement engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub net: String,
    #[serde(default)]
    pub layers: LayerSet,
    /// The drawn zone outline (not the fill).
    #[serde(default)]
    pub outline: Polygon,
    /// Filled copper islands, possibly on several layers.
    #[serde(default)]
    pub regions: Vec<FilledRegion>,
    #[serde(default)]
    pub keepout: bool,
}

impl Zone {
    pub fn is_filled(&self) -> bool {
        self.regions.iter().any(|r| r.outline.is_valid_ring())
    }

    /// Bounding box of the filled copper, or of the drawn outline when
    /// the zone is not filled.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let filled = self
            .regions
            .iter()
            .filter_map(|r| r.outline.bounds())
            .reduce(|a, b| a.union(&b));
        filled.or_else(|| self.outline.bounds())
    }

    pub fn contains(&self, p: Point) -> bool {
        contains_with_margin(p, &self.regions, 0.0)
    }

    pub fn contains_with_margin(&self, p: Point, margin: f64) -> bool {
        contains_with_margin(p, &self.regions, margin)
    }

    pub fn row_coverage(&self, y: f64) -> Vec<Interval> {
        row_coverage(&self.regions, y)
    }

    /// Human-facing label: the zone name when set, else its id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Stable fingerprint of the zone's layers, net and drawn outline.
    ///
    /// Stored next to the ownership record so a caller can tell that the
    /// zone was edited since the array was last generated.
    pub fn signature(&self) -> String {
        let corners = if self.outline.is_empty() {
            self.regions
                .first()
                .map(|r| r.outline.points.as_slice())
                .unwrap_or(&[])
        } else {
            self.outline.points.as_slice()
        };

        let mut parts = vec![
            self.layers.to_string(),
            self.net.clone(),
            corners.len().to_string(),
        ];
        parts.extend(corners.iter().map(|c| format!("{}:{}", c.x, c.y)));
        parts.join("|")
    }
}

/// Decide whether `p` lies in filled copper with at least `margin` of
/// clearance to every boundary of the island that contains it.
pub fn contains_with_margin(p: Point, regions: &[FilledRegion], margin: f64) -> bool {
    for region in regions {
        if !region.contains(p) {
            continue;
        }
        if margin <= 0.0 {
            return true;
        }
        if region.boundary_distance(p) >= margin {
            return true;
        }
    }
    false
}

/// Merged covered x-intervals across every island at height `y`.
pub fn row_coverage(regions: &[FilledRegion], y: f64) -> Vec<Interval> {
    let all: Vec<Interval> = regions.iter().flat_map(|r| r.row_coverage(y)).collect();
    merge_intervals(all)
}

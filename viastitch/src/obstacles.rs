//! Obstacle index for via overlap checks.
//!
//! Existing board items are reduced to simple primitives once per run:
//! vias and pads become circles, tracks become capsules, and foreign
//! zones become filled areas. Vias accepted during the run are added as
//! reservations so later candidates keep their distance to siblings.

use std::collections::HashSet;

use crate::board::BoardSnapshot;
use crate::geometry::{distance_point_to_segment, BoundingBox, Point};
use crate::spatial::SpatialHash;
use crate::zone::{FilledRegion, LayerSet, Zone};

/// A conflict primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    Via { center: Point, radius: i64 },
    Pad { center: Point, radius: i64 },
    Track { start: Point, end: Point, half_width: i64 },
    /// Copper or keepout area of another zone.
    Area { regions: Vec<FilledRegion>, bounds: BoundingBox },
}

impl Obstacle {
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Obstacle::Via { center, radius } | Obstacle::Pad { center, radius } => {
                BoundingBox::new(center.x, center.y, center.x, center.y).inflate(*radius)
            }
            Obstacle::Track { start, end, half_width } => {
                BoundingBox::new(start.x, start.y, end.x, end.y).inflate(*half_width)
            }
            Obstacle::Area { bounds, .. } => *bounds,
        }
    }

    /// True if a disk of radius `reach` centered at `p` hits this obstacle.
    pub fn conflicts(&self, p: Point, reach: f64) -> bool {
        match self {
            Obstacle::Via { center, radius } | Obstacle::Pad { center, radius } => {
                p.distance(center) < reach + *radius as f64
            }
            Obstacle::Track { start, end, half_width } => {
                distance_point_to_segment(p, *start, *end) < reach + *half_width as f64
            }
            Obstacle::Area { regions, bounds } => {
                if !bounds.inflate(reach.ceil() as i64).contains(p) {
                    return false;
                }
                regions
                    .iter()
                    .any(|r| r.contains(p) || r.boundary_distance(p) < reach)
            }
        }
    }
}

/// Which board items count as obstacles for a given zone.
#[derive(Debug, Clone, Default)]
pub struct ObstacleFilter {
    /// Check items on every copper layer, not only the zone's layers.
    pub include_other_layers: bool,
    /// Vias that are about to be replaced (the zone's own array).
    pub exclude_via_ids: HashSet<String>,
}

impl ObstacleFilter {
    fn on_target_layers(&self, item_layers: &LayerSet, zone_layers: &LayerSet) -> bool {
        if self.include_other_layers || item_layers.is_empty() || zone_layers.is_empty() {
            return true;
        }
        item_layers.intersects(zone_layers)
    }
}

/// Counts of indexed obstacles by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObstacleCounts {
    pub vias: usize,
    pub pads: usize,
    pub tracks: usize,
    pub areas: usize,
}

impl ObstacleCounts {
    pub fn total(&self) -> usize {
        self.vias + self.pads + self.tracks + self.areas
    }
}

/// Spatially hashed obstacle set with per-run via reservations.
#[derive(Debug, Clone)]
pub struct ObstacleIndex {
    obstacles: Vec<Obstacle>,
    grid: SpatialHash,
    reserved: Vec<(Point, i64)>,
    reserved_grid: SpatialHash,
    max_reserved_radius: i64,
    counts: ObstacleCounts,
}

impl ObstacleIndex {
    /// Empty index. `cell_size` should be the minimum via-to-via spacing.
    pub fn new(cell_size: i64) -> Self {
        Self {
            obstacles: Vec::new(),
            grid: SpatialHash::new(cell_size),
            reserved: Vec::new(),
            reserved_grid: SpatialHash::new(cell_size),
            max_reserved_radius: 0,
            counts: ObstacleCounts::default(),
        }
    }

    /// Collect obstacles around `zone` from a board snapshot.
    pub fn from_snapshot(
        snapshot: &BoardSnapshot,
        zone: &Zone,
        filter: &ObstacleFilter,
        cell_size: i64,
    ) -> Self {
        let mut index = Self::new(cell_size);
        let zone_layers = &zone.layers;

        for via in &snapshot.vias {
            if filter.exclude_via_ids.contains(&via.id) {
                continue;
            }
            if !filter.on_target_layers(&via.layers, zone_layers) {
                continue;
            }
            index.insert(Obstacle::Via {
                center: via.position,
                radius: via.radius(),
            });
        }

        for pad in &snapshot.pads {
            if !pad.is_through_hole() && !filter.on_target_layers(&pad.layers, zone_layers) {
                continue;
            }
            index.insert(Obstacle::Pad {
                center: pad.position,
                radius: pad.half_extent(),
            });
        }

        for track in &snapshot.tracks {
            if !filter.on_target_layers(&track.layers, zone_layers) {
                continue;
            }
            index.insert(Obstacle::Track {
                start: track.start,
                end: track.end,
                half_width: track.width / 2,
            });
        }

        let zone_bounds = zone.bounds();
        for other in &snapshot.zones {
            if other.id == zone.id || (other.net == zone.net && !other.keepout) {
                continue;
            }
            if !filter.on_target_layers(&other.layers, zone_layers) {
                continue;
            }
            // Keepouts have no fill; their drawn outline is the blocked area.
            let regions = if other.keepout && !other.is_filled() {
                vec![FilledRegion::new(other.outline.clone())]
            } else {
                other.regions.clone()
            };
            let Some(bounds) = regions
                .iter()
                .filter_map(|r| r.outline.bounds())
                .reduce(|a, b| a.union(&b))
            else {
                continue;
            };
            if zone_bounds.is_some_and(|zb| !zb.intersects(&bounds)) {
                continue;
            }
            index.insert(Obstacle::Area { regions, bounds });
        }

        tracing::debug!(
            "Obstacle index for zone {}: {} vias, {} pads, {} tracks, {} areas",
            zone.label(),
            index.counts.vias,
            index.counts.pads,
            index.counts.tracks,
            index.counts.areas
        );
        index
    }

    pub fn insert(&mut self, obstacle: Obstacle) {
        match obstacle {
            Obstacle::Via { .. } => self.counts.vias += 1,
            Obstacle::Pad { .. } => self.counts.pads += 1,
            Obstacle::Track { .. } => self.counts.tracks += 1,
            Obstacle::Area { .. } => self.counts.areas += 1,
        }
        let idx = self.obstacles.len();
        self.grid.insert_bounds(idx, &obstacle.bounds());
        self.obstacles.push(obstacle);
    }

    pub fn counts(&self) -> ObstacleCounts {
        self.counts
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Conflict with anything already on the board, ignoring reservations.
    pub fn conflicts_static(&self, p: Point, via_radius: i64, pad_margin: i64) -> bool {
        let reach = (via_radius + pad_margin) as f64;
        self.grid
            .query(p, reach)
            .any(|idx| self.obstacles[idx].conflicts(p, reach))
    }

    /// Conflict with board items or with vias reserved earlier in this run.
    pub fn conflicts(&self, p: Point, via_radius: i64, pad_margin: i64) -> bool {
        self.conflicts_static(p, via_radius, pad_margin)
            || self.conflicts_reserved(p, via_radius, pad_margin)
    }

    fn conflicts_reserved(&self, p: Point, via_radius: i64, pad_margin: i64) -> bool {
        if self.reserved.is_empty() {
            return false;
        }
        let reach = (via_radius + pad_margin) as f64;
        self.reserved_grid
            .query(p, reach + self.max_reserved_radius as f64)
            .any(|idx| {
                let (center, radius) = self.reserved[idx];
                p.distance(&center) < reach + radius as f64
            })
    }

    /// Record a via accepted in the current run.
    pub fn reserve(&mut self, center: Point, radius: i64) {
        let idx = self.reserved.len();
        self.reserved_grid.insert_point(idx, center);
        self.reserved.push((center, radius));
        self.max_reserved_radius = self.max_reserved_radius.max(radius);
    }

    pub fn reserved(&self) -> impl Iterator<Item = Point> + '_ {
        self.reserved.iter().map(|(p, _)| *p)
    }

    /// Drop every reservation, keeping the board obstacles.
    pub fn clear_reservations(&mut self) {
        self.reserved.clear();
        self.reserved_grid.clear();
        self.max_reserved_radius = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardPad, BoardTrack, BoardVia};
    use crate::geometry::Polygon;

    fn zone_on(layer: &str) -> Zone {
        Zone {
            id: "zone".into(),
            net: "GND".into(),
            layers: LayerSet::new([layer]),
            regions: vec![FilledRegion::new(Polygon::rect(0, 0, 10_000, 10_000))],
            ..Default::default()
        }
    }

    #[test]
    fn test_via_conflict_distance() {
        let mut index = ObstacleIndex::new(1000);
        index.insert(Obstacle::Via {
            center: Point::new(0, 0),
            radius: 250,
        });
        // Required center distance is 250 + 0 + 250
        assert!(index.conflicts(Point::new(499, 0), 250, 0));
        assert!(!index.conflicts(Point::new(500, 0), 250, 0));
        // Pad margin widens the test
        assert!(index.conflicts(Point::new(550, 0), 250, 100));
    }

    #[test]
    fn test_track_capsule_conflict() {
        let mut index = ObstacleIndex::new(1000);
        index.insert(Obstacle::Track {
            start: Point::new(0, 0),
            end: Point::new(20_000, 0),
            half_width: 100,
        });
        assert!(index.conflicts(Point::new(15_000, 300), 250, 0));
        assert!(!index.conflicts(Point::new(15_000, 350), 250, 0));
        assert!(index.conflicts(Point::new(-300, 0), 250, 0));
    }

    #[test]
    fn test_reservations_cleared() {
        let mut index = ObstacleIndex::new(500);
        index.reserve(Point::new(1000, 1000), 250);
        assert!(index.conflicts(Point::new(1200, 1000), 250, 0));
        assert!(!index.conflicts_static(Point::new(1200, 1000), 250, 0));
        index.clear_reservations();
        assert!(!index.conflicts(Point::new(1200, 1000), 250, 0));
    }

    #[test]
    fn test_area_conflict_near_edge() {
        let mut index = ObstacleIndex::new(500);
        let region = FilledRegion::new(Polygon::rect(0, 0, 1000, 1000));
        index.insert(Obstacle::Area {
            bounds: BoundingBox::new(0, 0, 1000, 1000),
            regions: vec![region],
        });
        assert!(index.conflicts(Point::new(500, 500), 250, 0));
        assert!(index.conflicts(Point::new(1200, 500), 250, 0));
        assert!(!index.conflicts(Point::new(1300, 500), 250, 0));
    }

    #[test]
    fn test_from_snapshot_filters_layers_and_excluded() {
        let snapshot = BoardSnapshot {
            vias: vec![
                BoardVia {
                    id: "mine".into(),
                    position: Point::new(100, 100),
                    diameter: 500,
                    drill: 300,
                    net: "GND".into(),
                    layers: LayerSet::default(),
                },
                BoardVia {
                    id: "other".into(),
                    position: Point::new(5000, 5000),
                    diameter: 500,
                    drill: 300,
                    net: "VCC".into(),
                    layers: LayerSet::default(),
                },
            ],
            pads: vec![
                BoardPad {
                    id: "smd".into(),
                    position: Point::new(2000, 2000),
                    width: 400,
                    height: 800,
                    net: "SIG".into(),
                    layers: LayerSet::new(["B.Cu"]),
                    drill: 0,
                },
                BoardPad {
                    id: "tht".into(),
                    position: Point::new(3000, 3000),
                    width: 1500,
                    height: 1500,
                    net: "SIG".into(),
                    layers: LayerSet::new(["B.Cu"]),
                    drill: 800,
                },
            ],
            tracks: vec![BoardTrack {
                id: "t".into(),
                start: Point::new(0, 8000),
                end: Point::new(9000, 8000),
                width: 250,
                net: "SIG".into(),
                layers: LayerSet::new(["B.Cu"]),
            }],
            zones: vec![],
        };

        let filter = ObstacleFilter {
            include_other_layers: false,
            exclude_via_ids: ["mine".to_string()].into_iter().collect(),
        };
        let index = ObstacleIndex::from_snapshot(&snapshot, &zone_on("F.Cu"), &filter, 500);
        assert_eq!(
            index.counts(),
            ObstacleCounts {
                vias: 1,
                pads: 1,
                tracks: 0,
                areas: 0
            }
        );

        let all_layers = ObstacleFilter {
            include_other_layers: true,
            ..filter
        };
        let index = ObstacleIndex::from_snapshot(&snapshot, &zone_on("F.Cu"), &all_layers, 500);
        // "mine" stays excluded; the B.Cu pad and track now count
        assert_eq!(
            index.counts(),
            ObstacleCounts {
                vias: 1,
                pads: 2,
                tracks: 1,
                areas: 0
            }
        );
    }

    #[test]
    fn test_foreign_zone_becomes_area() {
        let mut other = zone_on("F.Cu");
        other.id = "other".into();
        other.net = "VCC".into();
        other.regions = vec![FilledRegion::new(Polygon::rect(9000, 0, 12_000, 3000))];

        let mut same_net = zone_on("F.Cu");
        same_net.id = "same".into();

        let snapshot = BoardSnapshot {
            zones: vec![zone_on("F.Cu"), other, same_net],
            ..Default::default()
        };
        let index =
            ObstacleIndex::from_snapshot(&snapshot, &zone_on("F.Cu"), &ObstacleFilter::default(), 500);
        assert_eq!(index.counts().areas, 1);
        assert!(index.conflicts(Point::new(8800, 1000), 250, 0));
    }
}

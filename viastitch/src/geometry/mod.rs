//! Geometry kernel: board-unit primitives, polygon tests and scanline
//! interval algebra.
//!
//! # Submodules
//! - `types` - Point, Polygon, BoundingBox, Interval
//! - `kernel` - point-in-polygon, segment distance, ring crossings
//! - `intervals` - crossing pairing, merge and subtract

mod intervals;
mod kernel;
mod types;

pub use types::{BoundingBox, Interval, Point, Polygon};

pub use kernel::{
    distance_point_to_segment, min_edge_distance, point_in_polygon, ring_x_intersections,
    FAR_AWAY,
};

pub use intervals::{intervals_from_crossings, merge_intervals, subtract_intervals};

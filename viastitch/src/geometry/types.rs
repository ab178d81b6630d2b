//! Core geometric primitives in board units.
//!
//! Board coordinates are integers (nanometers). Distances and scanline
//! crossings are computed in `f64`.

use serde::{Deserialize, Serialize};

/// A point on the board, in board units (nm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Round a fractional position to the nearest board unit.
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i64,
            y: y.round() as i64,
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }

    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx * dx + dy * dy
    }
}

/// A closed ring of points. The last->first edge is implicit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle with corners `(x0, y0)` and `(x1, y1)`.
    pub fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A ring needs at least three vertices to enclose anything.
    pub fn is_valid_ring(&self) -> bool {
        self.points.len() >= 3
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }
}

/// Axis-aligned bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BoundingBox {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bbox.include(*p);
        }
        Some(bbox)
    }

    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow the box by `amount` on every side.
    pub fn inflate(&self, amount: i64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + self.width() / 2,
            self.min_y + self.height() / 2,
        )
    }
}

/// A closed range `[start, end]` on a scanline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    /// Shrink both ends by `amount`. Returns `None` when nothing is left.
    pub fn inset(&self, amount: f64) -> Option<Interval> {
        let start = self.start + amount;
        let end = self.end - amount;
        (end >= start).then_some(Interval { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let pts = [Point::new(5, -2), Point::new(-1, 7), Point::new(3, 3)];
        let bbox = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bbox, BoundingBox::new(-1, -2, 5, 7));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_bbox_intersects_touching() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 10, 20, 20);
        let c = BoundingBox::new(11, 0, 20, 5);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_interval_inset() {
        let i = Interval::new(0.0, 10.0);
        assert_eq!(i.inset(2.0), Some(Interval::new(2.0, 8.0)));
        assert_eq!(i.inset(5.0), Some(Interval::new(5.0, 5.0)));
        assert!(i.inset(6.0).is_none());
    }
}

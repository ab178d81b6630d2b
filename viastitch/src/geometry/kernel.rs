//! Stateless geometry routines used by the containment oracle and the
//! obstacle index.
//!
//! Every function here is total: malformed rings (fewer than three
//! vertices) simply never contain anything.

use super::types::Point;

/// Returned by [`min_edge_distance`] for rings with fewer than two points.
pub const FAR_AWAY: f64 = f64::INFINITY;

/// Crossing-number point-in-polygon test over a closed ring.
///
/// Horizontal edges never toggle. Points lying exactly on an edge are
/// classified by whichever side the crossing rule happens to put them.
pub fn point_in_polygon(p: Point, ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let x = p.x as f64;
    let y = p.y as f64;
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i].x as f64, ring[i].y as f64);
        let (xj, yj) = (ring[j].x as f64, ring[j].y as f64);
        if (yi > y) != (yj > y) {
            let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Euclidean distance from `p` to the segment `a`-`b`.
pub fn distance_point_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let vx = (b.x - a.x) as f64;
    let vy = (b.y - a.y) as f64;
    let wx = (p.x - a.x) as f64;
    let wy = (p.y - a.y) as f64;

    let c2 = vx * vx + vy * vy;
    if c2 <= 0.0 {
        return wx.hypot(wy);
    }

    let t = ((vx * wx + vy * wy) / c2).clamp(0.0, 1.0);
    let px = a.x as f64 + t * vx;
    let py = a.y as f64 + t * vy;
    (p.x as f64 - px).hypot(p.y as f64 - py)
}

/// Minimum distance from `p` to any edge of the ring, including the
/// closing edge.
pub fn min_edge_distance(p: Point, ring: &[Point]) -> f64 {
    if ring.len() < 2 {
        return FAR_AWAY;
    }

    let mut best = FAR_AWAY;
    let mut last = ring[ring.len() - 1];
    for &cur in ring {
        let d = distance_point_to_segment(p, last, cur);
        if d < best {
            best = d;
        }
        last = cur;
    }
    best
}

/// Sorted x positions where the ring's edges cross the horizontal line `y`.
///
/// Uses the half-open rule `y1 <= y < y2` (or its mirror) so that a vertex
/// shared by two edges is counted once. Horizontal edges are skipped.
pub fn ring_x_intersections(ring: &[Point], y: f64) -> Vec<f64> {
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }

    let mut xs = Vec::new();
    let mut prev = ring[n - 1];
    for &cur in ring {
        let (x1, y1) = (prev.x as f64, prev.y as f64);
        let (x2, y2) = (cur.x as f64, cur.y as f64);
        if (y1 <= y && y < y2) || (y2 <= y && y < y1) {
            xs.push(x1 + (y - y1) * (x2 - x1) / (y2 - y1));
        }
        prev = cur;
    }
    xs.sort_by(f64::total_cmp);
    xs
}

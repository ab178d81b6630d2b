//! Sparse spatial hash over board coordinates.
//!
//! Cells are keyed by `floor(coord / cell_size)`. Items are registered in
//! every cell their bounding box touches, and queries scan a square window
//! of cells around the query point wide enough to cover the query reach.

use std::collections::HashMap;

use crate::geometry::{BoundingBox, Point};

/// Items whose bounds cover more cells than this are kept out of the grid
/// and scanned linearly instead.
const MAX_CELLS_PER_ITEM: i64 = 4096;

#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: i64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    oversized: Vec<usize>,
}

impl SpatialHash {
    pub fn new(cell_size: i64) -> Self {
        Self {
            cell_size: cell_size.max(1),
            cells: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> i64 {
        self.cell_size
    }

    #[inline]
    fn cell_of(&self, x: i64, y: i64) -> (i64, i64) {
        (x.div_euclid(self.cell_size), y.div_euclid(self.cell_size))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
    }

    pub fn insert_point(&mut self, item: usize, p: Point) {
        let key = self.cell_of(p.x, p.y);
        self.cells.entry(key).or_default().push(item);
    }

    pub fn insert_bounds(&mut self, item: usize, bounds: &BoundingBox) {
        let (cx0, cy0) = self.cell_of(bounds.min_x, bounds.min_y);
        let (cx1, cy1) = self.cell_of(bounds.max_x, bounds.max_y);
        if (cx1 - cx0 + 1) * (cy1 - cy0 + 1) > MAX_CELLS_PER_ITEM {
            self.oversized.push(item);
            return;
        }
        for cx in cx0..=cx1 {
            for cy in cy0..=cy1 {
                self.cells.entry((cx, cy)).or_default().push(item);
            }
        }
    }

    /// Half-width of the cell window needed to find anything within
    /// `reach` of a point. A reach up to one cell gives a 3x3 window.
    pub fn window_radius(&self, reach: f64) -> i64 {
        ((reach / self.cell_size as f64).ceil() as i64).max(1)
    }

    /// Candidate items near `p`. May contain duplicates when an item spans
    /// several cells; callers run the exact test themselves.
    pub fn query(&self, p: Point, reach: f64) -> impl Iterator<Item = usize> + '_ {
        let (cx, cy) = self.cell_of(p.x, p.y);
        let k = self.window_radius(reach);
        (-k..=k)
            .flat_map(move |dx| {
                (-k..=k).flat_map(move |dy| {
                    self.cells
                        .get(&(cx + dx, cy + dy))
                        .into_iter()
                        .flatten()
                        .copied()
                })
            })
            .chain(self.oversized.iter().copied())
    }
}

//! Sorted interval algebra for scanline coverage.

use super::types::Interval;

/// Pair sorted crossings `(0,1), (2,3), ...` into inside-intervals.
///
/// A trailing odd crossing comes from a malformed ring and is dropped.
pub fn intervals_from_crossings(xs: &[f64]) -> Vec<Interval> {
    xs.chunks_exact(2)
        .map(|pair| Interval::new(pair[0], pair[1]))
        .collect()
}

/// Sort and coalesce overlapping or touching intervals.
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|i| i.end >= i.start);
    if intervals.len() < 2 {
        return intervals;
    }

    intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for cur in intervals {
        match merged.last_mut() {
            Some(last) if cur.start <= last.end => {
                if cur.end > last.end {
                    last.end = cur.end;
                }
            }
            _ => merged.push(cur),
        }
    }
    merged
}

/// Remove every `cut` from `base`. Both inputs may be unsorted.
///
/// The result keeps the cut boundaries as fractional endpoints; callers
/// round when they turn positions into board coordinates.
pub fn subtract_intervals(base: &[Interval], cuts: &[Interval]) -> Vec<Interval> {
    let base = merge_intervals(base.to_vec());
    let cuts = merge_intervals(cuts.to_vec());
    if cuts.is_empty() {
        return base;
    }

    let mut out = Vec::new();
    for b in base {
        let mut start = b.start;
        let end = b.end;
        let mut consumed = false;

        for c in &cuts {
            if c.end < start {
                continue;
            }
            if c.start > end {
                break;
            }
            if c.start > start {
                out.push(Interval::new(start, c.start));
            }
            if c.end >= end {
                consumed = true;
                break;
            }
            start = c.end;
        }

        if !consumed && start < end {
            out.push(Interval::new(start, end));
        }
    }
    out
}

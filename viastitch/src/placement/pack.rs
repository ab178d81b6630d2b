//! Maximize/pack strategy.
//!
//! Candidates come from a staggered lattice whose step is half the minimum
//! via-to-via spacing, independent of the user pitch. Points that fail
//! containment or hit a board item are dropped; the survivors form a
//! conflict graph (edge when two centers are closer than the pack
//! spacing) and a greedy maximal independent set is taken over several
//! orderings. The first pass orders by ascending degree; later passes
//! perturb the degrees with a generator seeded from the zone bounds and
//! the via parameters, so results are reproducible.

use petgraph::graph::{NodeIndex, UnGraph};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{
    CancelFlag, Candidate, CandidateOrigin, CandidateOutcome, Evaluator, PlacementParams,
    StrategyRun,
};
use crate::geometry::{BoundingBox, Point};
use crate::obstacles::ObstacleIndex;
use crate::spatial::SpatialHash;
use crate::zone::Zone;

/// Greedy passes per pack run.
pub const PACK_PASSES: usize = 28;

/// Center distance the packed vias must keep from each other.
///
/// Never below the via-to-via minimum, and never below the smaller user
/// pitch when one is set.
pub fn pack_spacing(params: &PlacementParams) -> i64 {
    let min_spacing = params.min_spacing().max(1);
    let pitch = [params.pitch_x, params.pitch_y]
        .into_iter()
        .filter(|p| *p > 0)
        .min();
    pitch.map_or(min_spacing, |p| p.max(min_spacing))
}

/// Staggered lattice over `bounds`: rows `step * sqrt(3) / 2` apart,
/// every other row shifted by half a step.
pub fn lattice(bounds: &BoundingBox, step: i64) -> Vec<Vec<Point>> {
    let step = step.max(1);
    let row_step = ((step as f64) * 3f64.sqrt() / 2.0).round().max(1.0) as i64;
    let mut rows = Vec::new();
    let mut y = bounds.min_y;
    let mut odd = false;
    while y <= bounds.max_y {
        let mut x = bounds.min_x + if odd { step / 2 } else { 0 };
        let mut row = Vec::new();
        while x <= bounds.max_x {
            row.push(Point::new(x, y));
            x += step;
        }
        rows.push(row);
        y += row_step;
        odd = !odd;
    }
    rows
}

/// Conflict graph over `points`; node weights index into `points`.
pub fn conflict_graph(points: &[Point], spacing: i64) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::with_capacity(points.len(), points.len() * 3);
    let nodes: Vec<NodeIndex> = (0..points.len()).map(|i| graph.add_node(i)).collect();

    let mut hash = SpatialHash::new(spacing);
    for (i, p) in points.iter().enumerate() {
        hash.insert_point(i, *p);
    }

    let limit = spacing as f64;
    for (i, p) in points.iter().enumerate() {
        for j in hash.query(*p, limit) {
            if j > i && p.distance(&points[j]) < limit {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }
    graph
}

/// Greedy independent set in the given visiting order. Returned indices
/// are ascending.
pub fn greedy_independent_set(graph: &UnGraph<usize, ()>, order: &[NodeIndex]) -> Vec<usize> {
    let mut taken = vec![false; graph.node_count()];
    for &node in order {
        if graph.neighbors(node).any(|n| taken[n.index()]) {
            continue;
        }
        taken[node.index()] = true;
    }
    taken
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.then_some(graph[NodeIndex::new(i)]))
        .collect()
}

/// Visiting order for one pass.
fn pass_order(graph: &UnGraph<usize, ()>, pass: usize, rng: &mut ChaCha8Rng) -> Vec<NodeIndex> {
    let mut keyed: Vec<(f64, NodeIndex)> = graph
        .node_indices()
        .map(|n| {
            let degree = graph.neighbors(n).count() as f64;
            let key = if pass == 0 {
                degree
            } else {
                degree * rng.gen_range(0.6..1.4) + rng.gen_range(0.0..1.0)
            };
            (key, n)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, n)| n).collect()
}

/// Run the packer. Board obstacles are read, reservations are not used.
pub fn run_pack(
    zone: &Zone,
    index: &ObstacleIndex,
    params: &PlacementParams,
    bounds: BoundingBox,
    cancel: &CancelFlag,
) -> StrategyRun {
    let evaluator = Evaluator::new(zone, params);
    let spacing = pack_spacing(params);
    let step = (params.min_spacing() / 2).max(1);
    let mut run = StrategyRun::default();

    let mut survivors = Vec::new();
    for row in lattice(&bounds, step) {
        if cancel.is_cancelled() {
            run.cancelled = true;
            return run;
        }
        for p in row {
            match evaluator.evaluate_static(index, p) {
                CandidateOutcome::Accepted => survivors.push(p),
                rejected => run.stats.record(rejected),
            }
        }
    }

    let graph = conflict_graph(&survivors, spacing);
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed(&[
        bounds.min_x,
        bounds.min_y,
        bounds.max_x,
        bounds.max_y,
    ]));

    let mut best: Vec<usize> = Vec::new();
    let mut best_pass = 0;
    for pass in 0..PACK_PASSES {
        if cancel.is_cancelled() {
            run.cancelled = true;
            break;
        }
        let order = pass_order(&graph, pass, &mut rng);
        let chosen = greedy_independent_set(&graph, &order);
        if chosen.len() > best.len() {
            best_pass = pass;
            best = chosen;
        }
    }
    tracing::debug!(
        "Pack in zone {}: {} lattice survivors, {} conflicts, best pass {} with {}",
        zone.label(),
        survivors.len(),
        graph.edge_count(),
        best_pass,
        best.len()
    );

    let origin = CandidateOrigin::Pack { pass: best_pass };
    let mut chosen = best.into_iter().peekable();
    for (i, p) in survivors.iter().enumerate() {
        if chosen.peek() == Some(&i) {
            chosen.next();
            run.stats.record(CandidateOutcome::Accepted);
            run.accepted.push(Candidate {
                position: *p,
                origin,
            });
        } else {
            run.stats.record(CandidateOutcome::RejectedOverlap);
        }
    }
    run
}

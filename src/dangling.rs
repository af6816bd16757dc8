use crate::dbg::{DeBruijnGraph, Step};
use crate::types_structs::*;
use itertools::Itertools;
use rayon::prelude::*;

/// Traces the dead-end path starting at `tip`. Returns `None` if the path
/// reaches `limit` nodes or loops back on itself before meeting a junction.
fn trace_dangling_link(graph: &DeBruijnGraph, tip: usize, limit: usize) -> Option<DeBruijnPath> {
    let node = graph.node(tip);
    let side = if node.is_palindrome || node.degree(Side::Right) > 0 {
        Side::Right
    } else {
        Side::Left
    };
    let mut path = DeBruijnPath::new(tip, side);
    let mut prev = None;
    let (mut current, mut current_side) = (tip, side);
    loop {
        if path.len() >= limit {
            return None;
        }
        match graph.step(current, current_side, prev) {
            Step::Next { node, side } => {
                if path.contains(node) {
                    return None;
                }
                path.push(node, side);
                prev = Some(current);
                current = node;
                current_side = side;
            }
            Step::DeadEnd | Step::Converge { .. } => return Some(path),
            //a tip that is itself a junction joins the branches behind it
            Step::Fork if path.len() == 1 => return None,
            Step::Fork | Step::SelfLoop => {
                //the branching node belongs to the rest of the graph
                if path.len() > 1 {
                    path.steps.pop();
                }
                return Some(path);
            }
        }
    }
}

/// Dead-end paths with fewer than `limit` nodes.
pub fn detect_dangling_links(graph: &DeBruijnGraph, limit: usize) -> Vec<DeBruijnPath> {
    let mut links: Vec<DeBruijnPath> = graph
        .par_live_nodes()
        .filter(|&n| graph.is_terminal(n))
        .filter_map(|n| trace_dangling_link(graph, n, limit))
        .collect();
    //an isolated chain is found from both of its ends
    links.sort_by_key(|p| p.nodes().min());
    links.dedup_by(|a, b| {
        let mut x: Vec<usize> = a.nodes().collect();
        let mut y: Vec<usize> = b.nodes().collect();
        x.sort_unstable();
        y.sort_unstable();
        x == y
    });
    links
}

fn remove_round(graph: &mut DeBruijnGraph, limit: usize) -> usize {
    let links = detect_dangling_links(graph, limit);
    if links.is_empty() {
        return 0;
    }
    let doomed: Vec<usize> = links.iter().flat_map(|p| p.nodes()).collect();
    let removed = graph.remove_nodes(doomed);
    log::trace!(
        "Removed {} dangling links ({} nodes) shorter than {}",
        links.len(),
        removed,
        limit
    );
    removed
}

/// Distinct node counts of the dead-end paths shorter than `limit`.
pub fn dangling_link_lengths(graph: &DeBruijnGraph, limit: usize) -> Vec<usize> {
    detect_dangling_links(graph, limit)
        .iter()
        .map(|p| p.len())
        .sorted()
        .dedup()
        .collect()
}

fn sweep(graph: &mut DeBruijnGraph, threshold: usize, limits: impl Iterator<Item = usize>) -> usize {
    let mut removed = 0;
    for limit in limits {
        if graph.live_count() < limit {
            continue;
        }
        removed += remove_round(graph, limit);
    }
    loop {
        let round = remove_round(graph, threshold);
        if round == 0 {
            break;
        }
        removed += round;
    }
    log::debug!("Dangling link removal deleted {} nodes", removed);
    removed
}

/// Removes dead-end paths shorter than `threshold` nodes. Short limits are
/// swept first so that long tips are not cut where a short spur meets them.
pub fn remove_dangling_links(graph: &mut DeBruijnGraph, threshold: usize) -> usize {
    sweep(graph, threshold, 2..=threshold)
}

/// Like [`remove_dangling_links`], but only sweeps the limits that remove
/// links of the given `lengths`, as measured after erosion.
pub fn remove_observed_dangling_links(
    graph: &mut DeBruijnGraph,
    threshold: usize,
    lengths: &[usize],
) -> usize {
    let limits: Vec<usize> = lengths
        .iter()
        .map(|&l| l + 1)
        .filter(|l| (2..=threshold).contains(l))
        .sorted()
        .dedup()
        .collect();
    log::trace!("Sweeping dangling limits {:?}", limits);
    sweep(graph, threshold, limits.into_iter())
}

use crate::dbg::{DeBruijnGraph, Edge};
use crate::types_structs::*;
use fxhash::{FxHashMap, FxHashSet};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

/// One arm of a bubble: the interior nodes between the divergence and the
/// convergence node.
#[derive(Clone, Debug)]
struct Branch {
    interior: DeBruijnPath,
    end: (usize, Side),
    coverage: OrderedFloat<f64>,
    min_node: usize,
}

#[derive(Clone, Debug)]
struct Bubble {
    divergence: (usize, Side),
    end: (usize, Side),
    branches: Vec<Branch>,
}

impl Branch {
    //higher coverage first, then the lowest node index
    fn rank(&self) -> (OrderedFloat<f64>, std::cmp::Reverse<usize>) {
        (self.coverage, std::cmp::Reverse(self.min_node))
    }
}

fn follow_branch(
    graph: &DeBruijnGraph,
    divergence: usize,
    side: Side,
    first: &Edge,
    threshold: usize,
) -> Option<Branch> {
    let mut interior = DeBruijnPath::default();
    let mut edge = *first;
    let mut current_side = side;
    loop {
        let target = edge.target;
        let landing = edge.landing_side(current_side);
        if target == divergence || interior.contains(target) {
            return None;
        }
        let node = graph.node(target);
        if node.is_palindrome {
            return None;
        }
        if node.degree(landing.flip()) > 1 {
            //a direct edge competes with its own multiplicity
            let (coverage, min_node) = if interior.is_empty() {
                (edge.count as f64, usize::MAX)
            } else {
                (
                    graph.mean_coverage(&interior),
                    interior.nodes().min().unwrap_or(usize::MAX),
                )
            };
            return Some(Branch {
                interior,
                end: (target, landing),
                coverage: OrderedFloat(coverage),
                min_node,
            });
        }
        if interior.len() + 1 >= threshold {
            return None;
        }
        interior.push(target, landing);
        let next = node.edges(landing);
        if next.len() != 1 {
            return None;
        }
        edge = next[0];
        current_side = landing;
    }
}

fn bubbles_at(graph: &DeBruijnGraph, divergence: usize, side: Side, threshold: usize) -> Vec<Bubble> {
    let mut by_end: FxHashMap<(usize, Side), Vec<Branch>> = FxHashMap::default();
    for edge in graph.node(divergence).edges(side) {
        if let Some(branch) = follow_branch(graph, divergence, side, edge, threshold) {
            by_end.entry(branch.end).or_default().push(branch);
        }
    }
    let mut bubbles: Vec<Bubble> = by_end
        .into_iter()
        .filter(|(_, branches)| branches.len() > 1)
        .map(|(end, branches)| Bubble {
            divergence: (divergence, side),
            end,
            branches,
        })
        .collect();
    bubbles.sort_by_key(|b| b.end);
    bubbles
}

/// Interior paths of the losing arms of every bubble shorter than `threshold`.
pub fn detect_redundant_paths(graph: &DeBruijnGraph, threshold: usize) -> Vec<DeBruijnPath> {
    let mut bubbles: Vec<Bubble> = graph
        .par_live_nodes()
        .filter(|&n| !graph.node(n).is_palindrome)
        .flat_map_iter(|n| {
            [Side::Right, Side::Left]
                .into_iter()
                .filter(move |&side| graph.node(n).degree(side) > 1)
                .flat_map(move |side| bubbles_at(graph, n, side, threshold))
        })
        .collect();
    bubbles.sort_by_key(|b| (b.divergence, b.end));

    //the same bubble is seen from both ends; never remove a kept arm
    let mut kept: FxHashSet<usize> = FxHashSet::default();
    let mut doomed: FxHashSet<usize> = FxHashSet::default();
    let mut redundant = vec![];
    for mut bubble in bubbles {
        bubble.branches.sort_by(|a, b| b.rank().cmp(&a.rank()));
        let winner = &bubble.branches[0];
        if winner.interior.nodes().any(|n| doomed.contains(&n)) {
            continue;
        }
        kept.extend(winner.interior.nodes());
        kept.insert(bubble.divergence.0);
        kept.insert(bubble.end.0);
        for loser in bubble.branches.iter().skip(1) {
            if loser.interior.is_empty()
                || loser.interior.nodes().any(|n| kept.contains(&n))
                || loser.interior.nodes().all(|n| doomed.contains(&n))
            {
                continue;
            }
            doomed.extend(loser.interior.nodes());
            redundant.push(loser.interior.clone());
        }
    }
    redundant
}

/// Pops bubbles until none with arms shorter than `threshold` remain.
pub fn remove_redundant_paths(graph: &mut DeBruijnGraph, threshold: usize) -> usize {
    let mut removed = 0;
    loop {
        let paths = detect_redundant_paths(graph, threshold);
        if paths.is_empty() {
            break;
        }
        let round = graph.remove_nodes(paths.iter().flat_map(|p| p.nodes()).collect::<Vec<_>>());
        log::trace!("Popped {} bubble arms ({} nodes)", paths.len(), round);
        if round == 0 {
            break;
        }
        removed += round;
    }
    log::debug!("Redundant path removal deleted {} nodes", removed);
    removed
}

use crate::dangling;
use crate::dbg::DeBruijnGraph;
use rayon::prelude::*;

/// Nodes removed in each erosion round, in order, and the lengths of the
/// dead ends left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErosionReport {
    pub eroded_per_round: Vec<usize>,
    pub dangling_lengths: Vec<usize>,
}

impl ErosionReport {
    pub fn total(&self) -> usize {
        self.eroded_per_round.iter().sum()
    }
}

/// Repeatedly trims terminal nodes with coverage below `threshold`.
pub fn erode_graph_ends(
    graph: &mut DeBruijnGraph,
    threshold: u32,
    max_rounds: usize,
) -> ErosionReport {
    let mut report = ErosionReport::default();
    for round in 0..max_rounds {
        let tips: Vec<usize> = graph
            .par_live_nodes()
            .filter(|&n| graph.node(n).coverage < threshold && graph.is_terminal(n))
            .collect();
        if tips.is_empty() {
            break;
        }
        let removed = graph.remove_nodes(tips);
        log::trace!("Erosion round {} removed {} nodes", round + 1, removed);
        report.eroded_per_round.push(removed);
    }
    log::debug!(
        "Erosion removed {} nodes in {} rounds",
        report.total(),
        report.eroded_per_round.len()
    );
    report
}

/// Erodes, then records the lengths of the dangling links shorter than
/// `dangling_threshold` that erosion did not reach.
pub fn erode_and_measure(
    graph: &mut DeBruijnGraph,
    threshold: u32,
    max_rounds: usize,
    dangling_threshold: usize,
) -> ErosionReport {
    let mut report = erode_graph_ends(graph, threshold, max_rounds);
    report.dangling_lengths = dangling::dangling_link_lengths(graph, dangling_threshold);
    report
}

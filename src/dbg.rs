use crate::errors::{AssemblyError, Result};
use crate::kmer::{self, PackedKmer};
use crate::kmer_index::{self, KmerIndex};
use crate::types_structs::*;
use fxhash::{FxHashMap, FxHashSet};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub target: usize,
    /// True when both endpoints are read in the same orientation across the edge.
    pub same_orientation: bool,
    pub count: u32,
}

impl Edge {
    /// Side of the target we arrive on when leaving through `side`.
    #[inline]
    pub fn landing_side(&self, side: Side) -> Side {
        if self.same_orientation {
            side
        } else {
            side.flip()
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub kmer: PackedKmer,
    pub coverage: u32,
    pub is_palindrome: bool,
    edges: [Vec<Edge>; 2],
    deleted: bool,
    marked: AtomicBool,
}

impl Node {
    fn new(kmer: PackedKmer, coverage: u32, is_palindrome: bool) -> Node {
        Node {
            kmer,
            coverage,
            is_palindrome,
            edges: [vec![], vec![]],
            deleted: false,
            marked: AtomicBool::new(false),
        }
    }

    pub fn edges(&self, side: Side) -> &[Edge] {
        &self.edges[side.index()]
    }

    pub fn degree(&self, side: Side) -> usize {
        self.edges[side.index()].len()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    /// Claims the node. Returns false if another walk already holds it.
    pub fn try_mark(&self) -> bool {
        self.marked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unmark(&self) {
        self.marked.store(false, Ordering::Release);
    }

    /// Distinct neighbours over both sides.
    pub fn neighbours(&self) -> Vec<usize> {
        let mut targets: Vec<usize> = self.edges[0]
            .iter()
            .chain(self.edges[1].iter())
            .map(|e| e.target)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }
}

/// Outcome of trying to extend a walk by one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Next { node: usize, side: Side },
    DeadEnd,
    Fork,
    /// The only successor has other incoming edges.
    Converge { node: usize },
    SelfLoop,
}

#[derive(Debug)]
pub struct DeBruijnGraph {
    kmer_length: usize,
    nodes: Vec<Node>,
    index: FxHashMap<PackedKmer, usize>,
    live: usize,
}

type EdgeKey = (usize, Side, usize, bool);

fn count_adjacency(
    map: &mut FxHashMap<EdgeKey, u32>,
    from: (usize, bool),
    to: (usize, bool),
    palindromes: &[bool],
) {
    let (a, a_forward) = from;
    let (b, b_forward) = to;
    let same = a_forward == b_forward;
    let a_side = Side::from_forward(a_forward);
    let b_side = Side::from_forward(!b_forward);
    *map.entry((a, a_side, b, same)).or_insert(0) += 1;
    *map.entry((b, b_side, a, same)).or_insert(0) += 1;
    //a palindrome reads the same from both sides, so its edges are mirrored
    if palindromes[a] {
        *map.entry((a, a_side.flip(), b, !same)).or_insert(0) += 1;
    }
    if palindromes[b] {
        *map.entry((b, b_side.flip(), a, !same)).or_insert(0) += 1;
    }
}

impl DeBruijnGraph {
    pub fn from_reads<S: AsRef<[u8]> + Sync>(
        reads: &[S],
        kmer_length: usize,
    ) -> Result<(DeBruijnGraph, KmerIndex)> {
        let index = KmerIndex::build(reads, kmer_length)?;
        let graph = DeBruijnGraph::build(reads, &index)?;
        Ok((graph, index))
    }

    pub fn build<S: AsRef<[u8]> + Sync>(reads: &[S], kmer_index: &KmerIndex) -> Result<DeBruijnGraph> {
        let k = kmer_index.kmer_length();
        let kmers = kmer_index.sorted_kmers();
        let index: FxHashMap<PackedKmer, usize> =
            kmers.iter().enumerate().map(|(i, &kmer)| (kmer, i)).collect();
        let mut nodes: Vec<Node> = kmers
            .iter()
            .map(|&kmer| {
                Node::new(
                    kmer,
                    kmer_index.coverage(kmer) as u32,
                    kmer::is_palindrome(kmer, k),
                )
            })
            .collect();
        let palindromes: Vec<bool> = nodes.iter().map(|n| n.is_palindrome).collect();

        let edge_counts = reads
            .par_iter()
            .enumerate()
            .try_fold(FxHashMap::default, |mut local, (read_index, read)| {
                let mut prev: Option<(usize, bool)> = None;
                for (canonical, forward) in kmer_index::read_kmers(read.as_ref(), k)? {
                    let node = *index
                        .get(&canonical)
                        .ok_or(AssemblyError::KmerNotIndexed { read_index })?;
                    if let Some(p) = prev {
                        count_adjacency(&mut local, p, (node, forward), &palindromes);
                    }
                    prev = Some((node, forward));
                }
                Ok::<_, AssemblyError>(local)
            })
            .try_reduce(FxHashMap::default, |mut a, b| {
                for (key, count) in b {
                    *a.entry(key).or_insert(0) += count;
                }
                Ok(a)
            })?;

        let mut edge_keys: Vec<(EdgeKey, u32)> = edge_counts.into_iter().collect();
        edge_keys.par_sort_unstable();
        for ((from, side, target, same_orientation), count) in edge_keys {
            let edges = &mut nodes[from].edges[side.index()];
            //both orientations into a palindrome lead to the same k-mer
            if palindromes[target] {
                if let Some(existing) = edges.iter_mut().find(|e| e.target == target) {
                    existing.count += count;
                    continue;
                }
            }
            edges.push(Edge {
                target,
                same_orientation,
                count,
            });
        }

        let graph = DeBruijnGraph {
            kmer_length: k,
            live: nodes.len(),
            nodes,
            index,
        };
        log::debug!(
            "Built de Bruijn graph with {} nodes and {} edges (k = {})",
            graph.live,
            graph.edge_count(),
            k
        );
        Ok(graph)
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.deleted)
            .map(|n| n.edges[0].len() + n.edges[1].len())
            .sum::<usize>()
            / 2
    }

    pub fn node(&self, n: usize) -> &Node {
        &self.nodes[n]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn find(&self, canonical: PackedKmer) -> Option<usize> {
        self.index
            .get(&canonical)
            .copied()
            .filter(|&n| !self.nodes[n].deleted)
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(move |&n| !self.nodes[n].deleted)
    }

    pub fn par_live_nodes(&self) -> impl ParallelIterator<Item = usize> + '_ {
        (0..self.nodes.len())
            .into_par_iter()
            .filter(move |&n| !self.nodes[n].deleted)
    }

    /// A node with no way out on at least one side.
    pub fn is_terminal(&self, n: usize) -> bool {
        let node = &self.nodes[n];
        if node.is_palindrome {
            return node.neighbours().len() <= 1;
        }
        node.degree(Side::Right) == 0 || node.degree(Side::Left) == 0
    }

    fn accepts_single_entry(&self, target: usize, landing: Side) -> bool {
        let node = &self.nodes[target];
        if node.is_palindrome {
            return node.neighbours().len() <= 2;
        }
        node.degree(landing.flip()) == 1
    }

    /// Follows the unique edge out of `side` of `n`, if the walk can continue
    /// unambiguously. `prev` is the node the walk came from.
    pub fn step(&self, n: usize, side: Side, prev: Option<usize>) -> Step {
        let node = &self.nodes[n];
        let mut candidates = node.edges(side).iter().filter(|e| {
            !(node.is_palindrome && Some(e.target) == prev)
        });
        let edge = match (candidates.next(), candidates.next()) {
            (None, _) => return Step::DeadEnd,
            (Some(_), Some(_)) => return Step::Fork,
            (Some(edge), None) => edge,
        };
        if edge.target == n {
            return Step::SelfLoop;
        }
        let landing = edge.landing_side(side);
        if !self.accepts_single_entry(edge.target, landing) {
            return Step::Converge { node: edge.target };
        }
        Step::Next {
            node: edge.target,
            side: landing,
        }
    }

    /// True for nodes strictly inside a non-branching chain.
    pub fn is_interior(&self, n: usize) -> bool {
        let node = &self.nodes[n];
        if node.is_palindrome {
            if node.neighbours().len() != 2 {
                return false;
            }
            return node.edges(Side::Right).iter().all(|e| {
                e.target != n && self.accepts_single_entry(e.target, e.landing_side(Side::Right))
            });
        }
        matches!(self.step(n, Side::Right, None), Step::Next { .. })
            && matches!(self.step(n, Side::Left, None), Step::Next { .. })
    }

    /// Walks from `start` through `side` until the chain ends, branches or loops.
    /// With `skip_marked`, already claimed nodes also stop the walk.
    pub fn walk(&self, start: usize, side: Side, skip_marked: bool) -> DeBruijnPath {
        let mut path = DeBruijnPath::new(start, side);
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut prev = None;
        let (mut current, mut current_side) = (start, side);
        while let Step::Next { node, side } = self.step(current, current_side, prev) {
            if seen.contains(&node) || (skip_marked && self.nodes[node].is_marked()) {
                break;
            }
            seen.insert(node);
            path.push(node, side);
            prev = Some(current);
            current = node;
            current_side = side;
        }
        path
    }

    /// The k-mer of `n` as read when walking through `side`.
    pub fn oriented_kmer(&self, n: usize, side: Side) -> Vec<u8> {
        let k = self.kmer_length;
        kmer::decode(kmer::orient(self.nodes[n].kmer, k, side.is_forward()), k)
    }

    pub fn path_sequence(&self, path: &DeBruijnPath) -> Vec<u8> {
        let mut steps = path.steps.iter();
        let mut sequence = match steps.next() {
            Some(first) => self.oriented_kmer(first.node, first.side),
            None => return vec![],
        };
        for step in steps {
            sequence.push(kmer::last_symbol(
                self.nodes[step.node].kmer,
                self.kmer_length,
                step.side.is_forward(),
            ));
        }
        sequence
    }

    pub fn mean_coverage(&self, path: &DeBruijnPath) -> f64 {
        if path.is_empty() {
            return 0.;
        }
        let total: f64 = path.nodes().map(|n| self.nodes[n].coverage as f64).sum();
        total / path.len() as f64
    }

    /// Deletes the given nodes and every edge touching them. Returns how many
    /// live nodes were removed.
    pub fn remove_nodes<I: IntoIterator<Item = usize>>(&mut self, doomed: I) -> usize {
        let doomed: FxHashSet<usize> = doomed
            .into_iter()
            .filter(|&n| !self.nodes[n].deleted)
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        let mut touched = FxHashSet::default();
        for &n in doomed.iter() {
            for side in [Side::Right, Side::Left] {
                for e in self.nodes[n].edges(side) {
                    if !doomed.contains(&e.target) {
                        touched.insert(e.target);
                    }
                }
            }
        }
        for &n in touched.iter() {
            for edges in self.nodes[n].edges.iter_mut() {
                edges.retain(|e| !doomed.contains(&e.target));
            }
        }
        for &n in doomed.iter() {
            let node = &mut self.nodes[n];
            node.deleted = true;
            node.edges = [vec![], vec![]];
        }
        self.live -= doomed.len();
        doomed.len()
    }

    pub fn clear_marks(&self) {
        self.nodes.par_iter().for_each(|n| n.unmark());
    }

    pub fn to_dot(&self) -> String {
        let k = self.kmer_length;
        let label = |n: usize| {
            format!(
                "{}:{}",
                String::from_utf8_lossy(&kmer::decode(self.nodes[n].kmer, k)),
                self.nodes[n].coverage
            )
        };
        let mut dot = String::from("digraph G {\n");
        for n in self.live_nodes() {
            let node = &self.nodes[n];
            if node.degree(Side::Right) == 0 && node.degree(Side::Left) == 0 {
                dot.push_str(&format!("    \"{}\";\n", label(n)));
            }
            for side in [Side::Right, Side::Left] {
                for e in node.edges(side) {
                    //each edge is stored on both endpoints; print it once
                    if e.target < n {
                        continue;
                    }
                    dot.push_str(&format!(
                        "    \"{}\" -> \"{}\" [label=\"{}{}x{}\"];\n",
                        label(n),
                        label(e.target),
                        if side == Side::Right { "R" } else { "L" },
                        if e.same_orientation { "=" } else { "~" },
                        e.count
                    ));
                }
            }
        }
        dot.push_str("}\n");
        dot
    }

    pub fn write_dot(&self, file_name: &str) -> Result<()> {
        if self.live == 0 {
            log::warn!("Empty graph.");
        }
        std::fs::write(file_name, self.to_dot())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_of(graph: &DeBruijnGraph, kmer: &[u8]) -> usize {
        let k = graph.kmer_length();
        let canonical = kmer::canonicalize(kmer::encode(kmer).unwrap(), k).0;
        graph.find(canonical).unwrap()
    }

    #[test]
    fn linear_read_is_a_chain() {
        let (graph, _) = DeBruijnGraph::from_reads(&[b"ACGGTCA".to_vec()], 4).unwrap();
        assert_eq!(graph.live_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        let first = node_of(&graph, b"ACGG");
        let last = node_of(&graph, b"GTCA");
        assert!(graph.is_terminal(first));
        assert!(graph.is_terminal(last));
        assert!(graph.is_interior(node_of(&graph, b"CGGT")));
        assert!(!graph.is_interior(first));
    }

    #[test]
    fn walk_reconstructs_read_in_either_direction() {
        let read = b"ACGGTCATTG";
        let (graph, _) = DeBruijnGraph::from_reads(&[read.to_vec()], 5).unwrap();
        let first = node_of(&graph, b"ACGGT");
        let side = if graph.oriented_kmer(first, Side::Right) == b"ACGGT".to_vec() {
            Side::Right
        } else {
            Side::Left
        };
        let path = graph.walk(first, side, false);
        assert_eq!(path.len(), 6);
        assert_eq!(graph.path_sequence(&path), read.to_vec());
        assert_eq!(
            graph.path_sequence(&path.reversed()),
            bio::alphabets::dna::revcomp(read)
        );
    }

    #[test]
    fn reads_must_match_their_index() {
        let indexed = vec![b"ACGGTCATTG".to_vec()];
        let index = KmerIndex::build(&indexed, 5).unwrap();
        let other = vec![b"ACGGTCATTG".to_vec(), b"TTTTTAAAAA".to_vec()];
        assert!(matches!(
            DeBruijnGraph::build(&other, &index),
            Err(AssemblyError::KmerNotIndexed { read_index: 1 })
        ));
        assert!(DeBruijnGraph::build(&indexed, &index).is_ok());
    }

    #[test]
    fn palindrome_edges_are_mirrored() {
        let (graph, _) = DeBruijnGraph::from_reads(&[b"CGATATG".to_vec()], 4).unwrap();
        let atat = node_of(&graph, b"ATAT");
        let node = graph.node(atat);
        assert!(node.is_palindrome);
        assert_eq!(node.coverage, 1);
        assert_eq!(node.neighbours().len(), 2);
        assert_eq!(node.degree(Side::Right), 2);
        assert_eq!(node.degree(Side::Left), 2);
        assert!(graph.is_interior(atat));
    }

    #[test]
    fn branching_stops_steps() {
        let reads = vec![b"AACTGATTA".to_vec(), b"AACTGATCC".to_vec()];
        let (graph, _) = DeBruijnGraph::from_reads(&reads, 5).unwrap();
        let fork = node_of(&graph, b"CTGAT");
        let towards = |kmer: &[u8]| {
            if graph.oriented_kmer(fork, Side::Right) == kmer.to_vec() {
                Side::Right
            } else {
                Side::Left
            }
        };
        assert_eq!(graph.step(fork, towards(b"CTGAT"), None), Step::Fork);
        assert!(!graph.is_interior(fork));
    }

    #[test]
    fn read_order_does_not_change_graph() {
        let reads = vec![
            b"ATCGCTAGCAT".to_vec(),
            b"CTAGCATCGAA".to_vec(),
            b"ATCGAACGATCATT".to_vec(),
        ];
        let mut shuffled = reads.clone();
        shuffled.reverse();
        let (a, _) = DeBruijnGraph::from_reads(&reads, 6).unwrap();
        let (b, _) = DeBruijnGraph::from_reads(&shuffled, 6).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        for n in 0..a.node_count() {
            assert_eq!(a.node(n).kmer, b.node(n).kmer);
            assert_eq!(a.node(n).coverage, b.node(n).coverage);
            assert_eq!(a.node(n).edges(Side::Right), b.node(n).edges(Side::Right));
            assert_eq!(a.node(n).edges(Side::Left), b.node(n).edges(Side::Left));
        }
    }

    #[test]
    fn removing_nodes_drops_edges() {
        let (mut graph, _) = DeBruijnGraph::from_reads(&[b"ACGGTCA".to_vec()], 4).unwrap();
        let middle = node_of(&graph, b"CGGT");
        assert_eq!(graph.remove_nodes(vec![middle, middle]), 1);
        assert_eq!(graph.live_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.node(middle).is_deleted());
        let first = node_of(&graph, b"ACGG");
        assert_eq!(graph.node(first).neighbours().len(), 0);
        assert_eq!(graph.remove_nodes(vec![middle]), 0);
    }

    #[test]
    fn marks_are_exclusive() {
        let (graph, _) = DeBruijnGraph::from_reads(&[b"ACGGTCA".to_vec()], 4).unwrap();
        assert!(graph.node(0).try_mark());
        assert!(!graph.node(0).try_mark());
        graph.clear_marks();
        assert!(!graph.node(0).is_marked());
    }

    #[test]
    fn dot_output_lists_edges() {
        let (graph, _) = DeBruijnGraph::from_reads(&[b"ACGGTCA".to_vec()], 4).unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph G {"));
        assert_eq!(dot.matches("->").count(), 3);
    }
}

use crate::constants::*;
use crate::contig_graph::ContigGraph;
use crate::errors::{AssemblyError, Result};
use crate::mate_pairs::{
    CloneLibraries, ContigAligner, DistanceEstimator, MatePairKey, MatePairMap, PairedRead,
};
use fxhash::FxHashMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WalkDirection {
    /// Each step is appended after the previous contig.
    Rightward,
    /// Each step is prepended before the previous contig.
    Leftward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScaffoldStep {
    pub contig: usize,
    /// For the first step, the orientation the contig is read in. For later
    /// steps, whether the contig keeps the orientation of the step before it.
    pub same_orientation: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScaffoldPath {
    pub direction: WalkDirection,
    pub steps: Vec<ScaffoldStep>,
}

type Oriented = Vec<(usize, bool)>;

impl ScaffoldPath {
    /// Builds a rightward path from absolute contig orientations.
    pub fn from_oriented(oriented: &[(usize, bool)]) -> ScaffoldPath {
        let mut steps = Vec::with_capacity(oriented.len());
        let mut previous = None;
        for &(contig, orientation) in oriented {
            let same_orientation = match previous {
                Some(p) => p == orientation,
                None => orientation,
            };
            steps.push(ScaffoldStep {
                contig,
                same_orientation,
            });
            previous = Some(orientation);
        }
        ScaffoldPath {
            direction: WalkDirection::Rightward,
            steps,
        }
    }

    /// Absolute orientation of every contig in walk order.
    pub fn oriented(&self) -> Oriented {
        let mut accumulated = true;
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                accumulated = if i == 0 {
                    step.same_orientation
                } else {
                    !(accumulated ^ step.same_orientation)
                };
                (step.contig, accumulated)
            })
            .collect()
    }

    /// Absolute orientations in sequence order, left to right.
    fn rightward_oriented(&self) -> Oriented {
        let mut oriented = self.oriented();
        if self.direction == WalkDirection::Leftward {
            oriented.reverse();
        }
        oriented
    }

    pub fn contigs(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().map(|s| s.contig)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScaffoldSequence {
    Built(Vec<u8>),
    /// The path cannot be turned into a longer sequence; its contigs stay available.
    Unresolvable,
}

/// Breadth first search over the contig overlap graph, keeping only
/// extensions that the mate pairs agree with.
#[derive(Clone, Debug)]
pub struct PathFinder {
    search_depth: usize,
    redundancy: usize,
}

impl PathFinder {
    pub fn new(search_depth: usize, redundancy: usize) -> Result<PathFinder> {
        if search_depth == 0 {
            return Err(AssemblyError::InvalidSearchDepth(search_depth));
        }
        Ok(PathFinder {
            search_depth,
            redundancy,
        })
    }

    /// Whether some contig on `path` has enough mate pairs to `next` at a
    /// distance consistent with the path in between.
    fn is_supported(
        &self,
        graph: &ContigGraph,
        mate_pairs: &MatePairMap,
        path: &[(usize, bool)],
        next: (usize, bool),
    ) -> bool {
        let overlap = graph.kmer_length().saturating_sub(1) as f64;
        for (i, &(contig, orientation)) in path.iter().enumerate() {
            let key = MatePairKey::new(contig, orientation, next.0, next.1);
            let pair = match mate_pairs.get(&key) {
                Some(pair) => pair,
                None => continue,
            };
            if pair.observations() < self.redundancy {
                continue;
            }
            let between: f64 = path[i + 1..]
                .iter()
                .map(|&(c, _)| graph.contig_length(c) as f64)
                .sum();
            let junctions = (path.len() - i) as f64;
            let gap = between - junctions * overlap;
            let tolerance = MATE_PAIR_TOLERANCE_SD * pair.std_dev.max(pair.library_std_dev);
            if (gap - pair.mean).abs() <= tolerance {
                return true;
            }
        }
        false
    }

    fn paths_from(&self, graph: &ContigGraph, mate_pairs: &MatePairMap, start: usize) -> Vec<ScaffoldPath> {
        let mut found = vec![ScaffoldPath::from_oriented(&[(start, true)])];
        for orientation in [true, false] {
            let mut queue: VecDeque<Oriented> = VecDeque::new();
            queue.push_back(vec![(start, orientation)]);
            while let Some(path) = queue.pop_front() {
                if path.len() > 1 {
                    found.push(ScaffoldPath::from_oriented(&path));
                }
                if path.len() > self.search_depth {
                    continue;
                }
                let (end, end_orientation) = path[path.len() - 1];
                for &next in graph.successors(end, end_orientation) {
                    if path.iter().any(|&(c, _)| c == next.0) {
                        continue;
                    }
                    if self.is_supported(graph, mate_pairs, &path, next) {
                        let mut extended = path.clone();
                        extended.push(next);
                        queue.push_back(extended);
                    }
                }
            }
        }
        found
    }

    /// Candidate scaffold paths from every contig; each contig yields at
    /// least its own single step path.
    pub fn find_paths(&self, graph: &ContigGraph, mate_pairs: &MatePairMap) -> Vec<ScaffoldPath> {
        let paths: Vec<ScaffoldPath> = (0..graph.len())
            .into_par_iter()
            .flat_map_iter(|start| self.paths_from(graph, mate_pairs, start))
            .collect();
        log::debug!("Found {} candidate scaffold paths", paths.len());
        paths
    }
}

fn reverse_oriented(path: &[(usize, bool)]) -> Oriented {
    path.iter().rev().map(|&(c, o)| (c, !o)).collect()
}

//a path and its reverse complement describe the same scaffold; prefer the
//lower first contig, read forward
fn canonical(path: Oriented) -> Oriented {
    let reversed = reverse_oriented(&path);
    let key = |p: &Oriented| p.iter().map(|&(c, o)| (c, !o)).collect::<Vec<_>>();
    if key(&reversed) < key(&path) {
        reversed
    } else {
        path
    }
}

fn contains(outer: &[(usize, bool)], inner: &[(usize, bool)]) -> bool {
    if inner.len() > outer.len() {
        return false;
    }
    let reversed = reverse_oriented(inner);
    outer
        .windows(inner.len())
        .any(|w| w == inner || w == reversed.as_slice())
}

fn merge_ends(a: &[(usize, bool)], b: &[(usize, bool)]) -> Option<Oriented> {
    for candidate in [b.to_vec(), reverse_oriented(b)] {
        for overlap in (1..a.len().min(candidate.len())).rev() {
            if a[a.len() - overlap..] != candidate[..overlap] {
                continue;
            }
            let merged: Oriented = a
                .iter()
                .chain(candidate[overlap..].iter())
                .copied()
                .collect();
            if merged.iter().map(|&(c, _)| c).all_unique() {
                return Some(merged);
            }
        }
    }
    None
}

fn sort_for_merging(paths: &mut [Oriented]) {
    paths.sort_by(|a, b| {
        a[0].0
            .cmp(&b[0].0)
            .then(b.len().cmp(&a.len()))
            .then(a.cmp(b))
    });
}

/// Drops every path that lies inside a longer one. Only paths sharing the
/// first contig of a path can contain it.
fn remove_contained(paths: Vec<Oriented>) -> (Vec<Oriented>, bool) {
    let mut by_contig: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (i, path) in paths.iter().enumerate() {
        for contig in path.iter().map(|&(c, _)| c).unique() {
            by_contig.entry(contig).or_default().push(i);
        }
    }
    let keep: Vec<bool> = paths
        .par_iter()
        .map(|path| {
            by_contig.get(&path[0].0).map_or(true, |candidates| {
                !candidates
                    .iter()
                    .any(|&j| paths[j].len() > path.len() && contains(&paths[j], path))
            })
        })
        .collect();
    let removed = keep.iter().any(|k| !k);
    let kept = paths
        .into_iter()
        .zip(keep)
        .filter_map(|(path, k)| if k { Some(path) } else { None })
        .collect();
    (kept, removed)
}

//steps another path can be joined on: the first step of the path and of its reverse
fn heads(path: &[(usize, bool)]) -> [(usize, bool); 2] {
    let (last, orientation) = path[path.len() - 1];
    [path[0], (last, !orientation)]
}

fn find_partner(
    paths: &[Oriented],
    alive: &[bool],
    by_head: &FxHashMap<(usize, bool), Vec<usize>>,
    i: usize,
) -> Option<(usize, Oriented)> {
    for a in [paths[i].clone(), reverse_oriented(&paths[i])] {
        for step in a.iter() {
            for &j in by_head.get(step).map(|v| v.as_slice()).unwrap_or(&[]) {
                if j == i || !alive[j] {
                    continue;
                }
                if let Some(merged) = merge_ends(&a, &paths[j]) {
                    return Some((j, merged));
                }
            }
        }
    }
    None
}

/// Joins paths whose ends overlap, in a single pass. A path keeps growing
/// until no partner is left; partners are looked up by their head steps.
fn merge_overlapping(mut paths: Vec<Oriented>) -> (Vec<Oriented>, bool) {
    let mut by_head: FxHashMap<(usize, bool), Vec<usize>> = FxHashMap::default();
    for (i, path) in paths.iter().enumerate() {
        for head in heads(path) {
            by_head.entry(head).or_default().push(i);
        }
    }
    let mut alive = vec![true; paths.len()];
    let mut merged_any = false;
    for i in 0..paths.len() {
        if !alive[i] {
            continue;
        }
        while let Some((j, merged)) = find_partner(&paths, &alive, &by_head, i) {
            alive[j] = false;
            paths[i] = canonical(merged);
            //earlier heads of i stay indexed; merge_ends checks the actual overlap
            for head in heads(&paths[i]) {
                by_head.entry(head).or_default().push(i);
            }
            merged_any = true;
        }
    }
    let merged = paths
        .into_iter()
        .zip(alive)
        .filter_map(|(path, a)| if a { Some(path) } else { None })
        .collect();
    (merged, merged_any)
}

/// Drops duplicated and contained paths and merges paths that overlap at
/// their ends, until nothing changes.
pub fn purge_paths(paths: Vec<ScaffoldPath>) -> Vec<ScaffoldPath> {
    let mut oriented: Vec<Oriented> = paths
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| canonical(p.rightward_oriented()))
        .sorted()
        .dedup()
        .collect();

    loop {
        sort_for_merging(&mut oriented);
        oriented.dedup();
        let (kept, contained) = remove_contained(oriented);
        let (merged, joined) = merge_overlapping(kept);
        oriented = merged;
        if !contained && !joined {
            break;
        }
    }

    sort_for_merging(&mut oriented);
    log::debug!("{} scaffold paths after purging", oriented.len());
    oriented
        .iter()
        .map(|p| ScaffoldPath::from_oriented(p))
        .collect()
}

/// Concatenates the contigs of `path`, trimming the k-1 bases shared by
/// neighbours. Contigs of a built path are marked consumed.
pub fn build_sequence(path: &ScaffoldPath, graph: &ContigGraph) -> Result<ScaffoldSequence> {
    if path.is_empty() {
        return Err(AssemblyError::EmptyPath);
    }
    if path.len() == 1 {
        return Ok(ScaffoldSequence::Unresolvable);
    }
    let overlap = graph.kmer_length().saturating_sub(1);
    let mut pieces = Vec::with_capacity(path.len());
    for (contig, orientation) in path.oriented() {
        match graph.oriented_sequence(contig, orientation) {
            Some(piece) if piece.len() >= overlap => pieces.push(piece),
            _ => return Ok(ScaffoldSequence::Unresolvable),
        }
    }

    for contig in path.contigs() {
        graph.try_consume(contig);
    }

    let mut pieces = pieces.into_iter();
    let mut sequence = pieces.next().unwrap_or_default();
    for next in pieces {
        match path.direction {
            WalkDirection::Rightward => sequence.extend_from_slice(&next[overlap..]),
            WalkDirection::Leftward => {
                let mut joined = next[..next.len() - overlap].to_vec();
                joined.extend_from_slice(&sequence);
                sequence = joined;
            }
        }
    }
    Ok(ScaffoldSequence::Built(sequence))
}

pub struct Scaffolder {
    kmer_length: usize,
    finder: PathFinder,
}

impl Scaffolder {
    pub fn new(kmer_length: usize, search_depth: usize, redundancy: usize) -> Result<Scaffolder> {
        Ok(Scaffolder {
            kmer_length,
            finder: PathFinder::new(search_depth, redundancy)?,
        })
    }

    /// Orders contigs into scaffolds. Every contig ends up in exactly one
    /// scaffold, so there are never more scaffolds than contigs.
    pub fn scaffold<A: ContigAligner>(
        &self,
        contigs: Vec<Vec<u8>>,
        pairs: &[PairedRead],
        libraries: &CloneLibraries,
        aligner: &A,
    ) -> Result<Vec<Vec<u8>>> {
        let lengths = contigs.iter().map(|c| c.len()).collect();
        let mate_pairs = DistanceEstimator::new(aligner, libraries, lengths).estimate(pairs)?;
        let graph = ContigGraph::new(contigs, self.kmer_length);
        let paths = purge_paths(self.finder.find_paths(&graph, &mate_pairs));

        let mut scaffolds = vec![];
        for path in paths.iter() {
            if path.contigs().any(|c| graph.is_consumed(c)) {
                continue;
            }
            if let ScaffoldSequence::Built(sequence) = build_sequence(path, &graph)? {
                scaffolds.push(sequence);
            }
        }
        let joined = scaffolds.len();
        for contig in 0..graph.len() {
            if graph.try_consume(contig) {
                if let Some(sequence) = graph.sequence(contig) {
                    scaffolds.push(sequence.to_vec());
                }
            }
        }
        log::info!(
            "Built {} scaffolds ({} joining several contigs) from {} contigs",
            scaffolds.len(),
            joined,
            graph.len()
        );
        Ok(scaffolds)
    }
}

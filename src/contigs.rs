use crate::dbg::{DeBruijnGraph, Step};
use crate::kmer_index::KmerIndex;
use crate::types_structs::*;
use rayon::prelude::*;

/// Marks every node of `path`, or none of them if any is already taken.
fn claim(graph: &DeBruijnGraph, path: &DeBruijnPath) -> bool {
    let mut claimed = Vec::with_capacity(path.len());
    for n in path.nodes() {
        if graph.node(n).try_mark() {
            claimed.push(n);
        } else {
            for c in claimed {
                graph.node(c).unmark();
            }
            return false;
        }
    }
    true
}

fn boundary_walks(graph: &DeBruijnGraph, n: usize) -> Vec<DeBruijnPath> {
    let sides: &[Side] = if graph.node(n).is_palindrome {
        &[Side::Right]
    } else {
        &[Side::Right, Side::Left]
    };
    let walks: Vec<DeBruijnPath> = sides
        .iter()
        .filter(|&&side| matches!(graph.step(n, side, None), Step::Next { .. }))
        .map(|&side| graph.walk(n, side, false))
        .collect();
    if walks.is_empty() {
        return vec![DeBruijnPath::new(n, Side::Right)];
    }
    walks
}

/// Maximal non-branching paths of the live graph. Every live node ends up in
/// exactly one path and stays marked.
pub fn build_paths(graph: &DeBruijnGraph) -> Vec<DeBruijnPath> {
    let walks: Vec<DeBruijnPath> = graph
        .par_live_nodes()
        .filter(|&n| !graph.is_interior(n))
        .flat_map_iter(|n| boundary_walks(graph, n))
        .collect();

    let mut paths = vec![];
    for walk in walks {
        if claim(graph, &walk) {
            paths.push(walk);
        }
    }

    //whatever is left lies on cycles
    for n in graph.live_nodes() {
        if graph.node(n).is_marked() {
            continue;
        }
        let walk = graph.walk(n, Side::Right, true);
        if claim(graph, &walk) {
            paths.push(walk);
        }
    }
    paths
}

/// Reads agree on an orientation through the k-mers they share with the path.
fn orient_by_reads(graph: &DeBruijnGraph, index: &KmerIndex, path: DeBruijnPath) -> DeBruijnPath {
    let mut forward = 0;
    let mut reverse = 0;
    for step in path.steps.iter() {
        let node = graph.node(step.node);
        if node.is_palindrome {
            continue;
        }
        for position in index.positions(node.kmer) {
            if position.was_forward == step.side.is_forward() {
                forward += 1;
            } else {
                reverse += 1;
            }
        }
    }
    if reverse > forward {
        path.reversed()
    } else {
        path
    }
}

fn assembled_reads(graph: &DeBruijnGraph, index: &KmerIndex, path: &DeBruijnPath) -> Vec<AssembledRead> {
    let k = graph.kmer_length() as i64;
    let mut reads = vec![];
    for (offset, step) in path.steps.iter().enumerate() {
        let node = graph.node(step.node);
        if node.is_palindrome {
            continue;
        }
        for position in index.positions(node.kmer) {
            let read_length = match index.read_length(position.read_index) {
                Some(l) => l as i64,
                None => continue,
            };
            let forward = position.was_forward == step.side.is_forward();
            let start = if forward {
                offset as i64 - position.offset as i64
            } else {
                offset as i64 - (read_length - k - position.offset as i64)
            };
            reads.push(AssembledRead {
                read_index: position.read_index,
                position: start,
                is_complemented: !forward,
                is_reversed: !forward,
            });
        }
    }
    reads.sort();
    reads.dedup();
    reads
}

pub fn path_to_contig(graph: &DeBruijnGraph, index: &KmerIndex, path: DeBruijnPath) -> Contig {
    let path = orient_by_reads(graph, index, path);
    Contig {
        sequence: graph.path_sequence(&path),
        coverage: graph.mean_coverage(&path),
        reads: assembled_reads(graph, index, &path),
    }
}

pub fn build_contigs(graph: &DeBruijnGraph, index: &KmerIndex) -> Vec<Contig> {
    let paths = build_paths(graph);
    let contigs: Vec<Contig> = paths
        .into_par_iter()
        .map(|path| path_to_contig(graph, index, path))
        .collect();
    log::debug!(
        "Built {} contigs from {} live nodes",
        contigs.len(),
        graph.live_count()
    );
    contigs
}

/// Deletes the nodes of every provisional contig whose mean coverage is below
/// `threshold`.
pub fn remove_low_coverage_contigs(graph: &mut DeBruijnGraph, threshold: f64) -> usize {
    let paths = build_paths(graph);
    graph.clear_marks();
    let doomed: Vec<usize> = paths
        .par_iter()
        .filter(|p| graph.mean_coverage(p) < threshold)
        .flat_map_iter(|p| p.nodes().collect::<Vec<usize>>())
        .collect();
    let removed = graph.remove_nodes(doomed);
    log::debug!(
        "Low coverage contig removal deleted {} nodes (threshold {:.2})",
        removed,
        threshold
    );
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contigs_of(reads: &[&[u8]], k: usize) -> Vec<Contig> {
        let reads: Vec<Vec<u8>> = reads.iter().map(|r| r.to_vec()).collect();
        let (graph, index) = DeBruijnGraph::from_reads(&reads, k).unwrap();
        build_contigs(&graph, &index)
    }

    #[test]
    fn overlapping_reads_make_one_contig() {
        let contigs = contigs_of(&[b"ATCGCTAGCAT", b"CTAGCATCGAA", b"ATCGAACGATCATT"], 6);
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].sequence, b"ATCGCTAGCATCGAACGATCATT".to_vec());
        let positions: Vec<(usize, i64, bool)> = contigs[0]
            .reads
            .iter()
            .map(|r| (r.read_index, r.position, r.is_complemented))
            .collect();
        assert_eq!(positions, vec![(0, 0, false), (1, 4, false), (2, 9, false)]);
    }

    #[test]
    fn palindrome_inside_a_read() {
        let contigs = contigs_of(&[b"CGATATG"], 4);
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].sequence, b"CGATATG".to_vec());
    }

    #[test]
    fn contig_follows_read_orientation() {
        let read = b"TTTGCAGGACC";
        let rc = bio::alphabets::dna::revcomp(read);
        assert_eq!(contigs_of(&[read], 5)[0].sequence, read.to_vec());
        let contigs = contigs_of(&[&rc], 5);
        assert_eq!(contigs[0].sequence, rc);
        assert_eq!(contigs[0].reads[0].position, 0);
    }

    #[test]
    fn every_node_used_once() {
        let reads: Vec<Vec<u8>> = vec![b"AACTGATTA".to_vec(), b"AACTGATCC".to_vec()];
        let (graph, index) = DeBruijnGraph::from_reads(&reads, 5).unwrap();
        let contigs = build_contigs(&graph, &index);
        //a shared stem and two branches
        assert_eq!(contigs.len(), 3);
        let total_kmers: usize = contigs.iter().map(|c| c.len() - 4).sum();
        assert_eq!(total_kmers, graph.live_count());
        assert!(graph.nodes().iter().all(|n| n.is_marked()));
    }

    #[test]
    fn cycle_becomes_a_contig() {
        let circle = b"GATTCCAGTACG";
        let mut read = circle.to_vec();
        read.extend_from_slice(&circle[..5]);
        let contigs = contigs_of(&[&read], 5);
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].len(), 16);
        let tripled = [&circle[..], &circle[..], &circle[..]].concat();
        let rc = bio::alphabets::dna::revcomp(&tripled);
        let found = |haystack: &[u8]| haystack.windows(16).any(|w| w == contigs[0].sequence.as_slice());
        assert!(found(&tripled) || found(&rc));
    }

    #[test]
    fn low_coverage_contigs_are_removed() {
        let mut reads = vec![b"GATTCCAGTACGCATGGACT".to_vec(); 3];
        reads.push(b"CCCAAACTTTGT".to_vec());
        let (mut graph, index) = DeBruijnGraph::from_reads(&reads, 5).unwrap();
        let before = graph.live_count();
        assert_eq!(remove_low_coverage_contigs(&mut graph, 0.), 0);
        assert_eq!(remove_low_coverage_contigs(&mut graph, 2.), 8);
        assert_eq!(graph.live_count(), before - 8);
        assert!(graph.nodes().iter().all(|n| !n.is_marked()));
        let contigs = build_contigs(&graph, &index);
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].coverage, 3.);
    }
}

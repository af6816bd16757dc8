//Two bits per base in a u64.
pub const MAX_KMER_LENGTH: usize = 32;

pub const DEFAULT_SEARCH_DEPTH: usize = 10;
pub const DEFAULT_REDUNDANCY: usize = 2;

//Coverage threshold used when the graph has no node above the noise floor.
pub const LOW_COVERAGE_DEFAULT_THRESHOLD: f64 = 2.;
pub const COVERAGE_NOISE_FLOOR: u32 = 2;

//Mate pair distances further than this many std devs away from the path are rejected.
pub const MATE_PAIR_TOLERANCE_SD: f64 = 3.5;

pub const CONTIG_FILE: &str = "contigs.fasta";
pub const SCAFFOLD_FILE: &str = "scaffolds.fasta";
pub const PROVENANCE_FILE: &str = "contig_reads.tsv";
pub const GRAPH_DOT_FILE: &str = "graph.dot";
pub const PROVENANCE_HEADER: &str = "contig\tread_index\tposition\tcomplemented\treversed\n";

pub fn default_dangling_threshold(kmer_length: usize) -> usize {
    kmer_length + 1
}

// Bubbles shorter than 3(k+1) are popped.
pub fn default_redundant_threshold(kmer_length: usize) -> usize {
    3 * (kmer_length + 1)
}

use crate::constants::*;
use crate::contigs;
use crate::dangling;
use crate::dbg::DeBruijnGraph;
use crate::erosion;
use crate::errors::{AssemblyError, Result};
use crate::kmer_index::KmerIndex;
use crate::mate_pairs::{CloneLibraries, PairedRead, SeedAligner};
use crate::redundant_paths;
use crate::scaffold::Scaffolder;
use crate::types_structs::*;
use statrs::statistics::{Data, Median};
use std::time::Instant;

/// Every knob of the assembly pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyConfig {
    pub kmer_length: usize,
    pub erosion_threshold: u32,
    pub dangling_links_threshold: usize,
    pub redundant_path_length_threshold: usize,
    pub coverage_threshold_for_contigs: f64,
    pub search_depth: usize,
    pub redundancy: usize,
    pub estimate_coverage_thresholds: bool,
    pub erosion_rounds: usize,
}

impl AssemblyConfig {
    pub fn new(kmer_length: usize) -> AssemblyConfig {
        AssemblyConfig {
            kmer_length,
            erosion_threshold: 0,
            dangling_links_threshold: default_dangling_threshold(kmer_length),
            redundant_path_length_threshold: default_redundant_threshold(kmer_length),
            coverage_threshold_for_contigs: 0.,
            search_depth: DEFAULT_SEARCH_DEPTH,
            redundancy: DEFAULT_REDUNDANCY,
            estimate_coverage_thresholds: false,
            erosion_rounds: kmer_length,
        }
    }

    pub fn validate(&self) -> Result<()> {
        crate::kmer::check_kmer_length(self.kmer_length)?;
        let coverage = self.coverage_threshold_for_contigs;
        if !coverage.is_finite() || coverage < 0. {
            return Err(AssemblyError::InvalidThreshold {
                name: "coverage_threshold_for_contigs",
                value: coverage,
            });
        }
        if self.search_depth == 0 {
            return Err(AssemblyError::InvalidSearchDepth(self.search_depth));
        }
        Ok(())
    }
}

/// Picks k from the read length distribution when none is given.
pub fn estimate_kmer_length<S: AsRef<[u8]>>(reads: &[S]) -> Result<usize> {
    let lengths = reads.iter().map(|r| r.as_ref().len());
    let (min, max) = match (lengths.clone().min(), lengths.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Err(AssemblyError::InvalidKmerLength {
                length: 0,
                reason: "no reads to estimate from".to_string(),
            })
        }
    };
    let half_max = max as f64 / 2.;
    let estimate = if half_max < min as f64 {
        ((half_max + min as f64) / 2.).ceil() as usize
    } else {
        min
    };
    let estimate = estimate.min(MAX_KMER_LENGTH);
    if estimate == 0 {
        return Err(AssemblyError::InvalidKmerLength {
            length: 0,
            reason: "the shortest read is empty".to_string(),
        });
    }
    Ok(estimate)
}

/// Square root of the median node coverage above the noise floor.
pub fn estimate_coverage_threshold(graph: &DeBruijnGraph) -> f64 {
    let coverages: Vec<f64> = graph
        .live_nodes()
        .map(|n| graph.node(n).coverage)
        .filter(|&c| c > COVERAGE_NOISE_FLOOR)
        .map(|c| c as f64)
        .collect();
    if coverages.is_empty() {
        return LOW_COVERAGE_DEFAULT_THRESHOLD;
    }
    Data::new(coverages).median().sqrt()
}

#[derive(Clone, Debug, Default)]
pub struct Assembly {
    pub contigs: Vec<Contig>,
    pub stats: SimplificationStats,
}

pub struct Assembler {
    config: AssemblyConfig,
}

impl Assembler {
    pub fn new(config: AssemblyConfig) -> Result<Assembler> {
        config.validate()?;
        Ok(Assembler { config })
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn build_graph<S: AsRef<[u8]> + Sync>(&self, reads: &[S]) -> Result<(DeBruijnGraph, KmerIndex)> {
        let start_t = Instant::now();
        let (graph, index) = DeBruijnGraph::from_reads(reads, self.config.kmer_length)?;
        log::info!(
            "Built graph with {} nodes and {} edges from {} reads in {:?}",
            graph.node_count(),
            graph.edge_count(),
            reads.len(),
            Instant::now() - start_t
        );
        Ok((graph, index))
    }

    /// Runs the simplification passes in their fixed order.
    pub fn simplify(&self, graph: &mut DeBruijnGraph) -> SimplificationStats {
        let start_t = Instant::now();
        let config = &self.config;
        let (erosion_threshold, coverage_threshold) = if config.estimate_coverage_thresholds {
            let estimate = estimate_coverage_threshold(graph);
            log::info!("Estimated coverage threshold {:.2}", estimate);
            (estimate.round() as u32, estimate)
        } else {
            (config.erosion_threshold, config.coverage_threshold_for_contigs)
        };

        let report = erosion::erode_and_measure(
            graph,
            erosion_threshold,
            config.erosion_rounds,
            config.dangling_links_threshold,
        );
        let mut dangling_removed = dangling::remove_observed_dangling_links(
            graph,
            config.dangling_links_threshold,
            &report.dangling_lengths,
        );
        let redundant_removed =
            redundant_paths::remove_redundant_paths(graph, config.redundant_path_length_threshold);
        dangling_removed += dangling::remove_dangling_links(graph, config.dangling_links_threshold);
        let low_coverage_removed = contigs::remove_low_coverage_contigs(graph, coverage_threshold);

        let stats = SimplificationStats {
            eroded_per_round: report.eroded_per_round,
            dangling_nodes_removed: dangling_removed,
            redundant_nodes_removed: redundant_removed,
            low_coverage_nodes_removed: low_coverage_removed,
            erosion_threshold,
            coverage_threshold,
        };
        log::info!(
            "Simplification removed {} nodes ({} live) in {:?}",
            stats.total_removed(),
            graph.live_count(),
            Instant::now() - start_t
        );
        stats
    }

    pub fn contigs(&self, graph: &DeBruijnGraph, index: &KmerIndex) -> Vec<Contig> {
        let start_t = Instant::now();
        let contigs = contigs::build_contigs(graph, index);
        log::info!("Built {} contigs in {:?}", contigs.len(), Instant::now() - start_t);
        contigs
    }

    pub fn assemble<S: AsRef<[u8]> + Sync>(&self, reads: &[S]) -> Result<Assembly> {
        let (mut graph, index) = self.build_graph(reads)?;
        let stats = self.simplify(&mut graph);
        Ok(Assembly {
            contigs: self.contigs(&graph, &index),
            stats,
        })
    }

    /// Joins contigs with mate pair evidence, mapping pairs with a seed
    /// aligner keyed on k.
    pub fn scaffold(
        &self,
        contigs: &[Contig],
        pairs: &[PairedRead],
        libraries: &CloneLibraries,
    ) -> Result<Vec<Vec<u8>>> {
        let start_t = Instant::now();
        let sequences: Vec<Vec<u8>> = contigs.iter().map(|c| c.sequence.clone()).collect();
        let aligner = SeedAligner::new(&sequences, self.config.kmer_length)?;
        let scaffolder = Scaffolder::new(
            self.config.kmer_length,
            self.config.search_depth,
            self.config.redundancy,
        )?;
        let scaffolds = scaffolder.scaffold(sequences.clone(), pairs, libraries, &aligner)?;
        log::info!("Scaffolding took {:?}", Instant::now() - start_t);
        Ok(scaffolds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_k() {
        let config = AssemblyConfig::new(21);
        assert_eq!(config.dangling_links_threshold, 22);
        assert_eq!(config.redundant_path_length_threshold, 66);
        assert_eq!(config.search_depth, 10);
        assert_eq!(config.redundancy, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        assert!(matches!(
            Assembler::new(AssemblyConfig::new(0)),
            Err(AssemblyError::InvalidKmerLength { .. })
        ));
        assert!(Assembler::new(AssemblyConfig::new(33)).is_err());

        let mut config = AssemblyConfig::new(5);
        config.coverage_threshold_for_contigs = -1.;
        assert!(matches!(
            config.validate(),
            Err(AssemblyError::InvalidThreshold { .. })
        ));
        config.coverage_threshold_for_contigs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AssemblyConfig::new(5);
        config.search_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(AssemblyError::InvalidSearchDepth(0))
        ));
    }

    #[test]
    fn kmer_length_estimate() {
        //max/2 < min: ceil((50 + 80) / 2)
        assert_eq!(estimate_kmer_length(&[vec![b'A'; 80], vec![b'A'; 100]]).unwrap(), 32);
        assert_eq!(estimate_kmer_length(&[vec![b'A'; 20], vec![b'A'; 30]]).unwrap(), 18);
        assert_eq!(estimate_kmer_length(&[vec![b'A'; 10], vec![b'A'; 30]]).unwrap(), 10);
        assert!(estimate_kmer_length::<Vec<u8>>(&[]).is_err());
    }

    #[test]
    fn coverage_threshold_estimate() {
        let reads = vec![b"ATCGCTAGCAT".to_vec(); 9];
        let (graph, _) = DeBruijnGraph::from_reads(&reads, 6).unwrap();
        assert_eq!(estimate_coverage_threshold(&graph), 3.);

        let (graph, _) = DeBruijnGraph::from_reads(&[b"ATCGCTAGCAT".to_vec()], 6).unwrap();
        assert_eq!(estimate_coverage_threshold(&graph), LOW_COVERAGE_DEFAULT_THRESHOLD);
    }

    #[test]
    fn assembles_overlapping_reads() {
        let reads = vec![
            b"ATCGCTAGCAT".to_vec(),
            b"CTAGCATCGAA".to_vec(),
            b"ATCGAACGATCATT".to_vec(),
        ];
        let assembler = Assembler::new(AssemblyConfig::new(6)).unwrap();
        let assembly = assembler.assemble(&reads).unwrap();
        assert_eq!(assembly.contigs.len(), 1);
        assert_eq!(assembly.contigs[0].sequence, b"ATCGCTAGCATCGAACGATCATT".to_vec());
        assert_eq!(assembly.stats.total_removed(), 0);
    }

    const GENOME: &[u8] = b"ATCGCTAGCATCGAACGATCATTGG";

    //copies of the genome plus one read with a substitution two bases from the end
    fn reads_with_error_tip(copies: usize) -> Vec<Vec<u8>> {
        let mut reads = vec![GENOME.to_vec(); copies];
        let mut error = GENOME.to_vec();
        let last = error.len() - 2;
        error[last] = b'A';
        reads.push(error);
        reads
    }

    #[test]
    fn simplification_cleans_error_tip() {
        let genome = GENOME.to_vec();
        let reads = reads_with_error_tip(4);
        let mut config = AssemblyConfig::new(7);
        config.erosion_threshold = 2;
        let assembly = Assembler::new(config).unwrap().assemble(&reads).unwrap();
        assert_eq!(assembly.contigs.len(), 1);
        assert_eq!(assembly.contigs[0].sequence, genome);
        assert!(assembly.stats.total_removed() > 0);
    }

    #[test]
    fn estimated_thresholds_drive_simplification() {
        let reads = reads_with_error_tip(9);
        let mut config = AssemblyConfig::new(7);
        config.estimate_coverage_thresholds = true;
        //leave the tip to erosion
        config.dangling_links_threshold = 0;
        let assembly = Assembler::new(config).unwrap().assemble(&reads).unwrap();

        //median coverage is 10 on the shared k-mers
        assert_eq!(assembly.stats.erosion_threshold, 3);
        assert!((assembly.stats.coverage_threshold - 10f64.sqrt()).abs() < 1e-9);
        assert_eq!(assembly.stats.eroded_per_round, vec![1, 1]);
        assert_eq!(assembly.stats.low_coverage_nodes_removed, 0);
        assert_eq!(assembly.contigs.len(), 1);
        assert_eq!(assembly.contigs[0].sequence, GENOME.to_vec());
    }

    #[test]
    fn empty_input_gives_no_contigs() {
        let assembler = Assembler::new(AssemblyConfig::new(5)).unwrap();
        let assembly = assembler.assemble::<Vec<u8>>(&[]).unwrap();
        assert!(assembly.contigs.is_empty());
    }
}

use dbgasm::assembler::{Assembler, AssemblyConfig};
use dbgasm::dangling;
use dbgasm::dbg::DeBruijnGraph;
use dbgasm::errors::AssemblyError;
use dbgasm::kmer;
use dbgasm::mate_pairs::{CloneLibraries, CloneLibrary, PairedRead, SeedAligner};
use dbgasm::scaffold::Scaffolder;
use dbgasm::types_structs::Side;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn random_genome(rng: &mut StdRng, length: usize) -> Vec<u8> {
    (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn tile(genome: &[u8], read_length: usize, step: usize) -> Vec<Vec<u8>> {
    (0..=genome.len() - read_length)
        .step_by(step)
        .map(|s| genome[s..s + read_length].to_vec())
        .collect()
}

fn library(name: &str, mean: f64, sd: f64) -> CloneLibraries {
    vec![CloneLibrary {
        name: name.to_string(),
        mean_insert: mean,
        std_dev: sd,
    }]
    .into_iter()
    .collect()
}

type NodeSummary = (kmer::PackedKmer, u32, bool, Vec<(usize, bool, u32)>, Vec<(usize, bool, u32)>);

fn graph_by_value(graph: &DeBruijnGraph) -> Vec<NodeSummary> {
    let edges = |n: usize, side: Side| {
        graph
            .node(n)
            .edges(side)
            .iter()
            .map(|e| (e.target, e.same_orientation, e.count))
            .collect::<Vec<_>>()
    };
    (0..graph.node_count())
        .map(|n| {
            let node = graph.node(n);
            (
                node.kmer,
                node.coverage,
                node.is_palindrome,
                edges(n, Side::Right),
                edges(n, Side::Left),
            )
        })
        .collect()
}

#[test]
fn overlapping_reads_assemble_into_one_contig() {
    let reads = vec![
        b"ATCGCTAGCAT".to_vec(),
        b"CTAGCATCGAA".to_vec(),
        b"ATCGAACGATCATT".to_vec(),
    ];
    let assembly = Assembler::new(AssemblyConfig::new(6))
        .unwrap()
        .assemble(&reads)
        .unwrap();
    assert_eq!(assembly.contigs.len(), 1);
    assert_eq!(
        assembly.contigs[0].sequence,
        b"ATCGCTAGCATCGAACGATCATT".to_vec()
    );
}

#[test]
fn zero_kmer_length_is_rejected_before_building() {
    assert!(matches!(
        Assembler::new(AssemblyConfig::new(0)),
        Err(AssemblyError::InvalidKmerLength { .. })
    ));
    let reads = vec![b"ACGTACGT".to_vec()];
    assert!(matches!(
        DeBruijnGraph::from_reads(&reads, 0),
        Err(AssemblyError::InvalidKmerLength { .. })
    ));
}

#[test]
fn unknown_symbol_is_rejected() {
    let reads = vec![b"ACGTACGT".to_vec(), b"ACGNTACG".to_vec()];
    let assembler = Assembler::new(AssemblyConfig::new(4)).unwrap();
    assert!(matches!(
        assembler.assemble(&reads),
        Err(AssemblyError::UnsupportedSymbol { symbol: 'N', .. })
    ));
}

#[test]
fn too_few_mate_pairs_leave_contigs_apart() {
    let left = b"GATTCCAGTACGCATGGACTTGCAAG".to_vec();
    let right = b"CAAGGTCTATCGGCTTAACGTCCTAG".to_vec();
    let mut genome = left.clone();
    genome.extend_from_slice(&right[4..]);
    let pair = |start: usize| PairedRead {
        name: format!("p{}", start),
        forward: genome[start..start + 8].to_vec(),
        reverse: bio::alphabets::dna::revcomp(&genome[start + 22..start + 30]),
        library: "lib".to_string(),
    };
    let contigs = vec![left.clone(), right.clone()];
    let aligner = SeedAligner::new(&contigs, 6).unwrap();
    let libraries = library("lib", 30., 3.);
    let scaffolder = Scaffolder::new(5, 10, 2).unwrap();

    let scaffolds = scaffolder
        .scaffold(contigs.clone(), &[pair(10)], &libraries, &aligner)
        .unwrap();
    assert_eq!(scaffolds, vec![left, right]);

    let pairs = vec![pair(6), pair(10), pair(14)];
    let scaffolds = scaffolder
        .scaffold(contigs.clone(), &pairs, &libraries, &aligner)
        .unwrap();
    assert_eq!(scaffolds, vec![genome]);
}

#[test]
fn palindromic_kmer_is_stored_once() {
    let read = b"CGATATG".to_vec();
    let reads = vec![read.clone(), bio::alphabets::dna::revcomp(&read)];
    let (graph, _) = DeBruijnGraph::from_reads(&reads, 4).unwrap();
    let atat = kmer::encode(b"ATAT").unwrap();
    assert!(kmer::is_palindrome(atat, 4));
    let n = graph.find(atat).unwrap();
    assert!(graph.node(n).is_palindrome);
    assert_eq!(graph.node(n).coverage, 2);
    assert_eq!(graph.node_count(), 4);

    //the whole graph is one short chain
    let mut config = AssemblyConfig::new(4);
    config.dangling_links_threshold = 0;
    let assembly = Assembler::new(config).unwrap().assemble(&reads).unwrap();
    assert_eq!(assembly.contigs.len(), 1);
    let contig = &assembly.contigs[0].sequence;
    assert!(*contig == read || *contig == bio::alphabets::dna::revcomp(&read));
}

#[test]
fn graph_does_not_depend_on_read_order() {
    let mut rng = StdRng::seed_from_u64(7);
    let genome = random_genome(&mut rng, 300);
    let mut reads = tile(&genome, 40, 3);
    reads.extend(tile(&bio::alphabets::dna::revcomp(&genome), 40, 7));
    let (graph, _) = DeBruijnGraph::from_reads(&reads, 15).unwrap();
    let expected = graph_by_value(&graph);
    for _ in 0..3 {
        reads.shuffle(&mut rng);
        let (shuffled, _) = DeBruijnGraph::from_reads(&reads, 15).unwrap();
        assert_eq!(graph_by_value(&shuffled), expected);
    }
}

#[test]
fn no_short_dead_ends_survive() {
    let mut rng = StdRng::seed_from_u64(11);
    let genome = random_genome(&mut rng, 400);
    let mut reads = tile(&genome, 50, 4);
    //error reads sprout short tips
    for _ in 0..20 {
        let start = rng.gen_range(0..genome.len() - 50);
        let mut read = genome[start..start + 50].to_vec();
        let position = rng.gen_range(40..50);
        read[position] = match read[position] {
            b'A' => b'C',
            b'C' => b'G',
            b'G' => b'T',
            _ => b'A',
        };
        reads.push(read);
    }
    let k = 13;
    let threshold = k + 1;
    let (mut graph, _) = DeBruijnGraph::from_reads(&reads, k).unwrap();
    dangling::remove_dangling_links(&mut graph, threshold);
    assert!(dangling::detect_dangling_links(&graph, threshold).is_empty());
    assert!(graph.live_count() > 0);
}

#[test]
fn scaffolding_never_adds_sequences() {
    let mut rng = StdRng::seed_from_u64(3);
    let genome = random_genome(&mut rng, 300);
    //a second haplotype keeps a long bubble in the graph
    let mut variant = genome.clone();
    variant[150] = if genome[150] == b'A' { b'T' } else { b'A' };
    let mut reads = tile(&genome, 50, 2);
    reads.extend(tile(&variant, 50, 5));

    let mut config = AssemblyConfig::new(15);
    config.redundant_path_length_threshold = 1;
    let assembler = Assembler::new(config).unwrap();
    let assembly = assembler.assemble(&reads).unwrap();
    assert!(assembly.contigs.len() > 1);

    let pairs: Vec<PairedRead> = (0..genome.len() - 100)
        .step_by(5)
        .map(|s| PairedRead {
            name: format!("mp{}", s),
            forward: genome[s..s + 20].to_vec(),
            reverse: bio::alphabets::dna::revcomp(&genome[s + 80..s + 100]),
            library: "short".to_string(),
        })
        .collect();
    let scaffolds = assembler
        .scaffold(&assembly.contigs, &pairs, &library("short", 100., 5.))
        .unwrap();
    assert!(!scaffolds.is_empty());
    assert!(scaffolds.len() <= assembly.contigs.len());
    for contig in assembly.contigs.iter() {
        let rc = bio::alphabets::dna::revcomp(&contig.sequence);
        assert!(scaffolds.iter().any(|s| {
            s.windows(contig.len())
                .any(|w| w == contig.sequence.as_slice() || w == rc.as_slice())
        }));
    }
}

#[test]
fn unknown_library_is_an_error() {
    let contigs = vec![b"GATTCCAGTACGCATGGACT".to_vec()];
    let aligner = SeedAligner::new(&contigs, 5).unwrap();
    let pair = PairedRead {
        name: "p".to_string(),
        forward: b"GATTCCAG".to_vec(),
        reverse: b"AGTCCATG".to_vec(),
        library: "missing".to_string(),
    };
    let result = Scaffolder::new(5, 10, 2)
        .unwrap()
        .scaffold(contigs.clone(), &[pair], &CloneLibraries::new(), &aligner);
    assert!(matches!(result, Err(AssemblyError::UnknownLibrary(_))));
}

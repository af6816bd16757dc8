use clap::Parser;
use dbgasm::assembler::{self, Assembler, AssemblyConfig};
use dbgasm::constants::*;
use dbgasm::errors::Result;
use dbgasm::file_reader;
use dbgasm::file_writer;
use dbgasm::mate_pairs::{self, CloneLibraries, CloneLibrary};
use dbgasm::parse_cmd_line::Options;
use std::fs;
use std::path::Path;
use std::time::Instant;

//This makes statically compiled musl library
//much much faster. Set to default for x86 systems...
#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn config_from_options(options: &Options, kmer_length: usize) -> AssemblyConfig {
    let mut config = AssemblyConfig::new(kmer_length);
    config.erosion_threshold = options.erosion_threshold;
    config.coverage_threshold_for_contigs = options.coverage_threshold;
    config.estimate_coverage_thresholds = options.estimate_thresholds;
    config.search_depth = options.search_depth;
    config.redundancy = options.redundancy;
    if let Some(rounds) = options.erosion_rounds {
        config.erosion_rounds = rounds;
    }
    if let Some(threshold) = options.dangling_threshold {
        config.dangling_links_threshold = threshold;
    }
    if let Some(threshold) = options.redundant_threshold {
        config.redundant_path_length_threshold = threshold;
    }
    config
}

fn prepare_output_dir(options: &Options) -> Result<()> {
    let out_dir = Path::new(&options.output_dir);
    let outputs = [CONTIG_FILE, SCAFFOLD_FILE, PROVENANCE_FILE, GRAPH_DOT_FILE];
    let existing: Vec<_> = outputs
        .iter()
        .map(|f| out_dir.join(f))
        .filter(|p| p.exists())
        .collect();
    if !existing.is_empty() {
        if !options.overwrite {
            log::error!(
                "Output directory {} already exists. Use --overwrite to overwrite.",
                &options.output_dir
            );
            std::process::exit(1);
        }
        for path in existing {
            fs::remove_file(path)?;
        }
    }
    fs::create_dir_all(out_dir)?;
    Ok(())
}

fn run(options: &Options) -> Result<()> {
    let start_t_initial = Instant::now();
    prepare_output_dir(options)?;
    let out = |file: &str| format!("{}/{}", options.output_dir, file);

    let start_t = Instant::now();
    let records = file_reader::read_sequences(&options.input)?;
    log::info!("Read {} reads in {:?}", records.len(), Instant::now() - start_t);
    if records.is_empty() {
        log::warn!("No reads found in {}", options.input);
        file_writer::write_contigs(&[], &out(CONTIG_FILE))?;
        return Ok(());
    }

    let kmer_length = match options.k {
        Some(k) => k,
        None => {
            let k = assembler::estimate_kmer_length(&records)?;
            log::info!("Using k = {}", k);
            k
        }
    };
    let assembler = Assembler::new(config_from_options(options, kmer_length))?;

    let (mut graph, index) = assembler.build_graph(&records)?;
    let stats = assembler.simplify(&mut graph);
    log::debug!("{:?}", stats);
    if options.dot {
        graph.write_dot(&out(GRAPH_DOT_FILE))?;
    }
    let contigs = assembler.contigs(&graph, &index);
    file_writer::write_contigs(&contigs, &out(CONTIG_FILE))?;
    file_writer::write_provenance(&contigs, &out(PROVENANCE_FILE))?;

    if options.scaffold {
        let libraries = options
            .libraries
            .iter()
            .map(|l| l.parse::<CloneLibrary>())
            .collect::<Result<CloneLibraries>>()?;
        let pairs = match &options.mates {
            Some(mates) => {
                let mate_records = file_reader::read_sequences(mates)?;
                mate_pairs::pair_reads(&mate_records, options.default_library.as_deref())
            }
            None => mate_pairs::pair_reads(&records, options.default_library.as_deref()),
        };
        log::info!("Found {} mate pairs", pairs.len());
        if pairs.is_empty() {
            log::warn!("No mate pairs found; every contig becomes its own scaffold.");
        }
        let scaffolds = assembler.scaffold(&contigs, &pairs, &libraries)?;
        file_writer::write_scaffolds(&scaffolds, &out(SCAFFOLD_FILE))?;
    }

    log::info!("Total time taken is {:?}", Instant::now() - start_t_initial);
    Ok(())
}

fn main() {
    let options = Options::parse();
    //set threads
    rayon::ThreadPoolBuilder::new()
        .num_threads(options.num_threads)
        .build_global()
        .unwrap();
    if options.trace {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Trace)
            .init()
            .unwrap();
    } else if options.debug {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init()
            .unwrap();
    } else {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Info)
            .init()
            .unwrap();
    }

    if let Err(e) = run(&options) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

pub mod file_reader;

pub mod file_writer;

pub mod types_structs;

pub mod constants;

pub mod errors;

pub mod parse_cmd_line;

pub mod kmer;

pub mod kmer_index;

pub mod dbg;

pub mod erosion;

pub mod dangling;

pub mod redundant_paths;

pub mod contigs;

pub mod mate_pairs;

pub mod contig_graph;

pub mod scaffold;

pub mod assembler;

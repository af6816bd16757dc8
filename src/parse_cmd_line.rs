use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dbgasm", version, about = "De Bruijn graph assembly and mate-pair scaffolding of short reads.", long_about = None)]
pub struct Options{

    /// Number of threads to use.
    #[arg(short='t', long="threads", default_value_t = 10)]
    pub num_threads: usize,

    /// Reads to assemble (FASTA or FASTQ).
    #[arg(short, long, help_heading = "INPUT")]
    pub input: String,

    /// Mate pair reads (FASTA or FASTQ). Pairs are looked for in --input if not given.
    #[arg(short, long, help_heading = "INPUT")]
    pub mates: Option<String>,

    /// Output directory.
    #[arg(short, long, default_value = "dbgasm_output", help_heading = "OUTPUT")]
    pub output_dir: String,

    /// Overwrite output directory if it exists.
    #[arg(short='O',long, help_heading = "OUTPUT")]
    pub overwrite: bool,

    /// Also write the simplified graph in DOT format.
    #[arg(long, help_heading = "OUTPUT")]
    pub dot: bool,

    /// Value of "k". Set automatically from read lengths if not provided.
    #[arg(short, help_heading = "ALGORITHM")]
    pub k: Option<usize>,

    /// Terminal k-mers with coverage below this are eroded.
    #[arg(long, default_value_t = 0, help_heading = "ALGORITHM")]
    pub erosion_threshold: u32,

    /// Maximum number of erosion rounds. Defaults to k.
    #[arg(long, help_heading = "ALGORITHM")]
    pub erosion_rounds: Option<usize>,

    /// Dead-end paths shorter than this many k-mers are removed. Defaults to k + 1.
    #[arg(long, help_heading = "ALGORITHM")]
    pub dangling_threshold: Option<usize>,

    /// Bubble arms shorter than this many k-mers are popped. Defaults to 3(k + 1).
    #[arg(long, help_heading = "ALGORITHM")]
    pub redundant_threshold: Option<usize>,

    /// Contigs with mean k-mer coverage below this are removed.
    #[arg(long, default_value_t = 0., help_heading = "ALGORITHM")]
    pub coverage_threshold: f64,

    /// Estimate the erosion and contig coverage thresholds from the k-mer coverage.
    #[arg(long, help_heading = "ALGORITHM")]
    pub estimate_thresholds: bool,

    /// Scaffold contigs using mate pairs.
    #[arg(long, help_heading = "SCAFFOLDING")]
    pub scaffold: bool,

    /// Clone library as NAME:MEAN:SD. Can be given several times.
    #[arg(short='l', long="library", help_heading = "SCAFFOLDING")]
    pub libraries: Vec<String>,

    /// Library for pairs named READ/1 and READ/2.
    #[arg(long, help_heading = "SCAFFOLDING")]
    pub default_library: Option<String>,

    /// Maximum number of contigs added to a scaffold path.
    #[arg(long, default_value_t = crate::constants::DEFAULT_SEARCH_DEPTH, help_heading = "SCAFFOLDING")]
    pub search_depth: usize,

    /// Minimum number of mate pairs supporting a join.
    #[arg(long, default_value_t = crate::constants::DEFAULT_REDUNDANCY, help_heading = "SCAFFOLDING")]
    pub redundancy: usize,

    /// Trace logging (VERY VERBOSE).
    #[arg(long)]
    pub trace: bool,

    /// Debug logging.
    #[arg(long)]
    pub debug: bool,
}

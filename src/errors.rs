use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssemblyError>;

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Invalid k-mer length {length}: {reason}")]
    InvalidKmerLength { length: usize, reason: String },

    #[error("Unsupported symbol '{symbol}' at position {position}")]
    UnsupportedSymbol { symbol: char, position: usize },

    #[error("Invalid value {value} for {name}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Search depth must be positive, got {0}")]
    InvalidSearchDepth(usize),

    #[error("Cannot build a sequence from an empty scaffold path")]
    EmptyPath,

    #[error("Unknown clone library '{0}'")]
    UnknownLibrary(String),

    #[error("Invalid clone library description '{0}', expected NAME:MEAN:SD")]
    InvalidLibrary(String),

    #[error("A k-mer of read {read_index} is missing from the k-mer index")]
    KmerNotIndexed { read_index: usize },

    #[error("Could not parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

use crate::errors::{AssemblyError, Result};
use crate::types_structs::SequenceRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};

fn parse_error(path: &str, message: impl ToString) -> AssemblyError {
    AssemblyError::Parse {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// Reads every record of a FASTA or FASTQ file. The format is decided by the
/// first byte; an empty file has no records.
pub fn read_sequences(path: &str) -> Result<Vec<SequenceRecord>> {
    let mut reader = BufReader::new(File::open(path)?);
    let first = reader.fill_buf()?.first().copied();
    let records = match first {
        None => vec![],
        Some(b'>') => {
            let mut records = vec![];
            for record in bio::io::fasta::Reader::new(reader).records() {
                let record = record.map_err(|e| parse_error(path, e))?;
                records.push(SequenceRecord {
                    id: record.id().to_string(),
                    seq: record.seq().to_vec(),
                });
            }
            records
        }
        Some(b'@') => {
            let mut records = vec![];
            for record in bio::io::fastq::Reader::new(reader).records() {
                let record = record.map_err(|e| parse_error(path, e))?;
                records.push(SequenceRecord {
                    id: record.id().to_string(),
                    seq: record.seq().to_vec(),
                });
            }
            records
        }
        Some(c) => {
            return Err(parse_error(
                path,
                format!("expected FASTA or FASTQ, found '{}' at the start", c as char),
            ))
        }
    };
    log::debug!("Read {} records from {}", records.len(), path);
    Ok(records)
}

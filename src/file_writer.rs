use crate::constants::PROVENANCE_HEADER;
use crate::errors::Result;
use crate::types_structs::Contig;
use std::fs::File;
use std::io::{BufWriter, Write};

pub fn write_contigs(contigs: &[Contig], file_name: &str) -> Result<()> {
    let bufwriter = BufWriter::new(File::create(file_name)?);
    let mut writer = bio::io::fasta::Writer::from_bufwriter(bufwriter);
    for (i, contig) in contigs.iter().enumerate() {
        let desc = format!("len={} cov={:.2}", contig.len(), contig.coverage);
        writer.write(&format!("contig_{}", i), Some(desc.as_str()), &contig.sequence)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_scaffolds(scaffolds: &[Vec<u8>], file_name: &str) -> Result<()> {
    let bufwriter = BufWriter::new(File::create(file_name)?);
    let mut writer = bio::io::fasta::Writer::from_bufwriter(bufwriter);
    for (i, scaffold) in scaffolds.iter().enumerate() {
        let desc = format!("len={}", scaffold.len());
        writer.write(&format!("scaffold_{}", i), Some(desc.as_str()), scaffold)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per read placed on a contig.
pub fn write_provenance(contigs: &[Contig], file_name: &str) -> Result<()> {
    let mut writer = BufWriter::new(File::create(file_name)?);
    write!(writer, "{}", PROVENANCE_HEADER)?;
    for (i, contig) in contigs.iter().enumerate() {
        for read in contig.reads.iter() {
            writeln!(
                writer,
                "contig_{}\t{}\t{}\t{}\t{}",
                i, read.read_index, read.position, read.is_complemented, read.is_reversed
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

use crate::errors::{AssemblyError, Result};
use crate::kmer::{self, CanonicalKmers, PackedKmer};
use fxhash::FxHashMap;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KmerPosition {
    pub read_index: usize,
    pub offset: usize,
    pub was_forward: bool,
}

/// Positional index of every canonical k-mer over a read set.
#[derive(Debug, Default)]
pub struct KmerIndex {
    kmer_length: usize,
    read_lengths: Vec<usize>,
    positions: FxHashMap<PackedKmer, Vec<KmerPosition>>,
}

pub fn validate_kmer_length<S: AsRef<[u8]>>(reads: &[S], kmer_length: usize) -> Result<()> {
    kmer::check_kmer_length(kmer_length)?;
    if let Some(shortest) = reads.iter().map(|r| r.as_ref().len()).min() {
        if shortest < kmer_length {
            return Err(AssemblyError::InvalidKmerLength {
                length: kmer_length,
                reason: format!("longer than the shortest read ({} bases)", shortest),
            });
        }
    }
    Ok(())
}

/// Canonical k-mers of one read in order, with their native orientation.
pub fn read_kmers(read: &[u8], kmer_length: usize) -> Result<Vec<(PackedKmer, bool)>> {
    CanonicalKmers::new(read, kmer_length)?
        .map(|item| item.map(|(_, canonical, forward)| (canonical, forward)))
        .collect()
}

impl KmerIndex {
    pub fn build<S: AsRef<[u8]> + Sync>(reads: &[S], kmer_length: usize) -> Result<KmerIndex> {
        validate_kmer_length(reads, kmer_length)?;

        let mut positions = reads
            .par_iter()
            .enumerate()
            .try_fold(
                FxHashMap::default,
                |mut local: FxHashMap<PackedKmer, Vec<KmerPosition>>, (read_index, read)| {
                    for item in CanonicalKmers::new(read.as_ref(), kmer_length)? {
                        let (offset, canonical, was_forward) = item?;
                        local.entry(canonical).or_default().push(KmerPosition {
                            read_index,
                            offset,
                            was_forward,
                        });
                    }
                    Ok::<_, AssemblyError>(local)
                },
            )
            .try_reduce(FxHashMap::default, |mut a, b| {
                for (canonical, mut occurrences) in b {
                    a.entry(canonical).or_default().append(&mut occurrences);
                }
                Ok(a)
            })?;

        positions
            .par_iter_mut()
            .for_each(|(_, occurrences)| occurrences.sort_unstable());

        log::debug!(
            "Indexed {} distinct canonical {}-mers from {} reads",
            positions.len(),
            kmer_length,
            reads.len()
        );

        Ok(KmerIndex {
            kmer_length,
            read_lengths: reads.iter().map(|r| r.as_ref().len()).collect(),
            positions,
        })
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn num_reads(&self) -> usize {
        self.read_lengths.len()
    }

    pub fn read_length(&self, read_index: usize) -> Option<usize> {
        self.read_lengths.get(read_index).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self, canonical: PackedKmer) -> &[KmerPosition] {
        self.positions
            .get(&canonical)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn coverage(&self, canonical: PackedKmer) -> usize {
        self.positions(canonical).len()
    }

    /// Distinct canonical k-mers in ascending order.
    pub fn sorted_kmers(&self) -> Vec<PackedKmer> {
        let mut kmers: Vec<PackedKmer> = self.positions.keys().copied().collect();
        kmers.par_sort_unstable();
        kmers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_counts_occurrences() {
        let reads = vec![b"ACGTACGT".to_vec(), b"CGTACG".to_vec()];
        let index = KmerIndex::build(&reads, 4).unwrap();
        let acgt = kmer::encode(b"ACGT").unwrap();
        //ACGT occurs twice in the first read
        assert_eq!(index.coverage(acgt), 2);
        let cgta = kmer::canonicalize(kmer::encode(b"CGTA").unwrap(), 4).0;
        let occurrences = index.positions(cgta);
        assert_eq!(occurrences.len(), 4);
        assert_eq!(occurrences[0].read_index, 0);
        assert_eq!(occurrences[2].read_index, 1);
        assert_eq!(occurrences[2].offset, 0);
        assert_eq!(index.read_length(1), Some(6));
    }

    #[test]
    fn reverse_complement_reads_share_kmers() {
        let forward = KmerIndex::build(&[b"GATTACAGG".to_vec()], 5).unwrap();
        let reverse = KmerIndex::build(&[bio::alphabets::dna::revcomp(b"GATTACAGG")], 5).unwrap();
        assert_eq!(forward.sorted_kmers(), reverse.sorted_kmers());
        for canonical in forward.sorted_kmers() {
            assert_eq!(
                forward.positions(canonical)[0].was_forward,
                !reverse.positions(canonical)[0].was_forward
            );
        }
    }

    #[test]
    fn rejects_bad_lengths() {
        let reads = vec![b"ACGTAC".to_vec(), b"ACG".to_vec()];
        assert!(matches!(
            KmerIndex::build(&reads, 0),
            Err(AssemblyError::InvalidKmerLength { length: 0, .. })
        ));
        assert!(matches!(
            KmerIndex::build(&reads, 4),
            Err(AssemblyError::InvalidKmerLength { length: 4, .. })
        ));
        assert!(KmerIndex::build(&reads, 3).is_ok());
    }

    #[test]
    fn rejects_unsupported_symbols() {
        let reads = vec![b"ACGTAC".to_vec(), b"ACGNAC".to_vec()];
        assert!(matches!(
            KmerIndex::build(&reads, 3),
            Err(AssemblyError::UnsupportedSymbol { symbol: 'N', .. })
        ));
    }

    #[test]
    fn empty_read_set() {
        let reads: Vec<Vec<u8>> = vec![];
        let index = KmerIndex::build(&reads, 5).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.num_reads(), 0);
    }
}

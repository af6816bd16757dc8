use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Contigs joined where the (k-1)-suffix of one oriented contig equals the
/// (k-1)-prefix of another.
#[derive(Debug)]
pub struct ContigGraph {
    kmer_length: usize,
    contigs: Vec<Vec<u8>>,
    //indexed by contig, then [same orientation, flipped]
    successors: Vec<[Vec<(usize, bool)>; 2]>,
    consumed: Vec<AtomicBool>,
}

fn orientation_index(same_orientation: bool) -> usize {
    if same_orientation {
        0
    } else {
        1
    }
}

impl ContigGraph {
    pub fn new(contigs: Vec<Vec<u8>>, kmer_length: usize) -> ContigGraph {
        let overlap = kmer_length.saturating_sub(1);
        let oriented: Vec<[Vec<u8>; 2]> = contigs
            .iter()
            .map(|c| [c.clone(), bio::alphabets::dna::revcomp(c)])
            .collect();

        let mut by_prefix: FxHashMap<&[u8], Vec<(usize, bool)>> = FxHashMap::default();
        if overlap > 0 {
            for (c, strands) in oriented.iter().enumerate() {
                for (strand, same) in [(&strands[0], true), (&strands[1], false)] {
                    if strand.len() >= overlap {
                        by_prefix.entry(&strand[..overlap]).or_default().push((c, same));
                    }
                }
            }
        }

        let mut successors = Vec::with_capacity(contigs.len());
        for (c, strands) in oriented.iter().enumerate() {
            let mut next: [Vec<(usize, bool)>; 2] = [vec![], vec![]];
            for (strand, same) in [(&strands[0], true), (&strands[1], false)] {
                if overlap == 0 || strand.len() < overlap {
                    continue;
                }
                let suffix = &strand[strand.len() - overlap..];
                if let Some(targets) = by_prefix.get(suffix) {
                    let list = &mut next[orientation_index(same)];
                    list.extend(targets.iter().copied().filter(|&(t, _)| t != c));
                    list.sort_unstable();
                    list.dedup();
                }
            }
            successors.push(next);
        }

        let consumed = (0..contigs.len()).map(|_| AtomicBool::new(false)).collect();
        log::debug!(
            "Contig overlap graph: {} contigs, {} oriented adjacencies",
            contigs.len(),
            successors
                .iter()
                .map(|s| s[0].len() + s[1].len())
                .sum::<usize>()
        );
        ContigGraph {
            kmer_length,
            contigs,
            successors,
            consumed,
        }
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    pub fn sequence(&self, contig: usize) -> Option<&[u8]> {
        self.contigs.get(contig).map(|s| s.as_slice())
    }

    pub fn contig_length(&self, contig: usize) -> usize {
        self.contigs.get(contig).map_or(0, |s| s.len())
    }

    pub fn oriented_sequence(&self, contig: usize, same_orientation: bool) -> Option<Vec<u8>> {
        let sequence = self.sequence(contig)?;
        if same_orientation {
            Some(sequence.to_vec())
        } else {
            Some(bio::alphabets::dna::revcomp(sequence))
        }
    }

    /// Oriented contigs that can follow `contig` read in `same_orientation`.
    pub fn successors(&self, contig: usize, same_orientation: bool) -> &[(usize, bool)] {
        self.successors
            .get(contig)
            .map(|s| s[orientation_index(same_orientation)].as_slice())
            .unwrap_or(&[])
    }

    pub fn try_consume(&self, contig: usize) -> bool {
        self.consumed.get(contig).map_or(false, |c| {
            c.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    pub fn is_consumed(&self, contig: usize) -> bool {
        self.consumed
            .get(contig)
            .map_or(false, |c| c.load(Ordering::Acquire))
    }
}

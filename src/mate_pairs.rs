use crate::errors::{AssemblyError, Result};
use crate::kmer::{self, PackedKmer};
use crate::types_structs::SequenceRecord;
use fxhash::FxHashMap;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct CloneLibrary {
    pub name: String,
    pub mean_insert: f64,
    pub std_dev: f64,
}

impl FromStr for CloneLibrary {
    type Err = AssemblyError;

    /// Parses `NAME:MEAN:SD`.
    fn from_str(s: &str) -> Result<CloneLibrary> {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 3 || fields[0].is_empty() {
            return Err(AssemblyError::InvalidLibrary(s.to_string()));
        }
        let mean_insert: f64 = fields[1]
            .parse()
            .map_err(|_| AssemblyError::InvalidLibrary(s.to_string()))?;
        let std_dev: f64 = fields[2]
            .parse()
            .map_err(|_| AssemblyError::InvalidLibrary(s.to_string()))?;
        if !(mean_insert.is_finite() && std_dev.is_finite()) || mean_insert < 0. || std_dev < 0. {
            return Err(AssemblyError::InvalidLibrary(s.to_string()));
        }
        Ok(CloneLibrary {
            name: fields[0].to_string(),
            mean_insert,
            std_dev,
        })
    }
}

/// Insert size statistics for every mate pair library in use.
#[derive(Clone, Debug, Default)]
pub struct CloneLibraries {
    libraries: FxHashMap<String, CloneLibrary>,
}

impl CloneLibraries {
    pub fn new() -> CloneLibraries {
        CloneLibraries::default()
    }

    pub fn add(&mut self, library: CloneLibrary) {
        self.libraries.insert(library.name.clone(), library);
    }

    pub fn get(&self, name: &str) -> Result<&CloneLibrary> {
        self.libraries
            .get(name)
            .ok_or_else(|| AssemblyError::UnknownLibrary(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl FromIterator<CloneLibrary> for CloneLibraries {
    fn from_iter<I: IntoIterator<Item = CloneLibrary>>(iter: I) -> Self {
        let mut libraries = CloneLibraries::new();
        for library in iter {
            libraries.add(library);
        }
        libraries
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairedRead {
    pub name: String,
    pub forward: Vec<u8>,
    pub reverse: Vec<u8>,
    pub library: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mate {
    Forward,
    Reverse,
}

//NAME.F:LIB / NAME.R:LIB, or NAME/1 / NAME/2 with the default library
fn parse_mate_name(id: &str, default_library: Option<&str>) -> Option<(String, Mate, String)> {
    if let Some((prefix, library)) = id.rsplit_once(':') {
        if let Some(name) = prefix.strip_suffix(".F") {
            return Some((name.to_string(), Mate::Forward, library.to_string()));
        }
        if let Some(name) = prefix.strip_suffix(".R") {
            return Some((name.to_string(), Mate::Reverse, library.to_string()));
        }
    }
    let library = default_library?;
    if let Some(name) = id.strip_suffix("/1") {
        return Some((name.to_string(), Mate::Forward, library.to_string()));
    }
    if let Some(name) = id.strip_suffix("/2") {
        return Some((name.to_string(), Mate::Reverse, library.to_string()));
    }
    None
}

/// Groups records into mate pairs by name. Records without a mate are dropped.
pub fn pair_reads(records: &[SequenceRecord], default_library: Option<&str>) -> Vec<PairedRead> {
    let mut halves: FxHashMap<(String, String), (Option<&[u8]>, Option<&[u8]>)> =
        FxHashMap::default();
    let mut order = vec![];
    for record in records {
        let (name, mate, library) = match parse_mate_name(&record.id, default_library) {
            Some(parsed) => parsed,
            None => continue,
        };
        let key = (name, library);
        let entry = halves.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (None, None)
        });
        match mate {
            Mate::Forward => entry.0 = Some(record.seq.as_slice()),
            Mate::Reverse => entry.1 = Some(record.seq.as_slice()),
        }
    }
    let mut pairs = vec![];
    for key in order {
        if let Some((Some(forward), Some(reverse))) = halves.get(&key) {
            pairs.push(PairedRead {
                name: key.0.clone(),
                forward: forward.to_vec(),
                reverse: reverse.to_vec(),
                library: key.1.clone(),
            });
        }
    }
    log::debug!("Paired {} mate pairs from {} records", pairs.len(), records.len());
    pairs
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContigReadOverlap {
    /// The read lies wholly inside the contig.
    FullOverlap,
    /// The read hangs over one end of the contig.
    PartialOverlap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadMap {
    pub contig: usize,
    /// Start of the aligned stretch on the forward strand of the contig.
    pub contig_start: usize,
    /// Start of the aligned stretch on the (possibly complemented) read.
    pub read_start: usize,
    pub length: usize,
    pub same_strand: bool,
    pub overlap: ContigReadOverlap,
}

/// Places a read on contigs.
pub trait ContigAligner: Sync {
    fn map_read(&self, read: &[u8]) -> Vec<ReadMap>;
}

/// Exact matcher seeded by k-mers of the forward contig strands. Reads are
/// tried on both strands; a read matches where all of its overlapping bases
/// agree with the contig.
pub struct SeedAligner<'a> {
    seed_length: usize,
    contigs: &'a [Vec<u8>],
    seeds: FxHashMap<PackedKmer, Vec<(usize, usize)>>,
}

impl<'a> SeedAligner<'a> {
    pub fn new(contigs: &'a [Vec<u8>], seed_length: usize) -> Result<SeedAligner<'a>> {
        kmer::check_kmer_length(seed_length)?;
        let mut seeds: FxHashMap<PackedKmer, Vec<(usize, usize)>> = FxHashMap::default();
        for (c, contig) in contigs.iter().enumerate() {
            for (position, window) in contig.windows(seed_length).enumerate() {
                if let Ok(seed) = kmer::encode(window) {
                    seeds.entry(seed).or_default().push((c, position));
                }
            }
        }
        Ok(SeedAligner {
            seed_length,
            contigs,
            seeds,
        })
    }

    fn extend_hit(&self, read: &[u8], contig: usize, offset: i64, same_strand: bool) -> Option<ReadMap> {
        let sequence = &self.contigs[contig];
        let contig_start = offset.max(0) as usize;
        let read_start = (-offset).max(0) as usize;
        let length = (read.len() - read_start).min(sequence.len().checked_sub(contig_start)?);
        let agrees = read[read_start..read_start + length]
            .iter()
            .zip(sequence[contig_start..contig_start + length].iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !agrees || length == 0 {
            return None;
        }
        let overlap = if length == read.len() {
            ContigReadOverlap::FullOverlap
        } else {
            ContigReadOverlap::PartialOverlap
        };
        Some(ReadMap {
            contig,
            contig_start,
            read_start,
            length,
            same_strand,
            overlap,
        })
    }
}

impl<'a> ContigAligner for SeedAligner<'a> {
    fn map_read(&self, read: &[u8]) -> Vec<ReadMap> {
        let s = self.seed_length;
        if read.len() < s {
            return vec![];
        }
        let complemented = bio::alphabets::dna::revcomp(read);
        let mut maps = vec![];
        for (strand, same_strand) in [(read, true), (complemented.as_slice(), false)] {
            //seeds at both read ends catch reads hanging off either contig end
            for seed_start in [0, strand.len() - s] {
                let seed = match kmer::encode(&strand[seed_start..seed_start + s]) {
                    Ok(seed) => seed,
                    Err(_) => continue,
                };
                for &(contig, position) in self.seeds.get(&seed).map(|v| v.as_slice()).unwrap_or(&[]) {
                    let offset = position as i64 - seed_start as i64;
                    if let Some(map) = self.extend_hit(strand, contig, offset, same_strand) {
                        if !maps.contains(&map) {
                            maps.push(map);
                        }
                    }
                }
            }
        }
        maps
    }
}

/// A mate pair key `(A, a) -> (B, b)`: contig A read with orientation `a`
/// precedes contig B read with orientation `b`. The same relation viewed from
/// the other strand, `(B, !b) -> (A, !a)`, shares the key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatePairKey {
    pub first: usize,
    pub first_same: bool,
    pub second: usize,
    pub second_same: bool,
}

impl MatePairKey {
    pub fn new(a: usize, a_same: bool, b: usize, b_same: bool) -> MatePairKey {
        if a <= b {
            MatePairKey {
                first: a,
                first_same: a_same,
                second: b,
                second_same: b_same,
            }
        } else {
            MatePairKey {
                first: b,
                first_same: !b_same,
                second: a,
                second_same: !a_same,
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContigMatePair {
    pub distances: Vec<f64>,
    pub mean: f64,
    pub std_dev: f64,
    /// Mean insert size deviation of the libraries that contributed.
    pub library_std_dev: f64,
}

impl ContigMatePair {
    fn from_observations(distances: Vec<f64>, library_std_devs: Vec<f64>) -> ContigMatePair {
        let mean = distances.iter().mean();
        let std_dev = if distances.len() > 1 {
            distances.iter().std_dev()
        } else {
            0.
        };
        let library_std_dev = library_std_devs.iter().mean();
        ContigMatePair {
            distances,
            mean,
            std_dev,
            library_std_dev,
        }
    }

    pub fn observations(&self) -> usize {
        self.distances.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MatePairMap {
    pairs: FxHashMap<MatePairKey, ContigMatePair>,
}

impl MatePairMap {
    pub fn get(&self, key: &MatePairKey) -> Option<&ContigMatePair> {
        self.pairs.get(key)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatePairKey, &ContigMatePair)> {
        self.pairs.iter()
    }
}

type Observations = FxHashMap<MatePairKey, (Vec<f64>, Vec<f64>)>;

pub struct DistanceEstimator<'a, A: ContigAligner> {
    aligner: &'a A,
    libraries: &'a CloneLibraries,
    contig_lengths: Vec<usize>,
}

impl<'a, A: ContigAligner> DistanceEstimator<'a, A> {
    pub fn new(aligner: &'a A, libraries: &'a CloneLibraries, contig_lengths: Vec<usize>) -> Self {
        DistanceEstimator {
            aligner,
            libraries,
            contig_lengths,
        }
    }

    fn full_maps(&self, read: &[u8]) -> Vec<ReadMap> {
        self.aligner
            .map_read(read)
            .into_iter()
            .filter(|m| m.overlap == ContigReadOverlap::FullOverlap)
            .collect()
    }

    fn observe(&self, pair: &PairedRead, observations: &mut Observations) -> Result<()> {
        let library = self.libraries.get(&pair.library)?;
        let forward_maps = self.full_maps(&pair.forward);
        let reverse_maps = self.full_maps(&pair.reverse);
        //repeats give no usable distance
        if forward_maps.len() != 1 || reverse_maps.len() != 1 {
            return Ok(());
        }
        let (f, r) = (forward_maps[0], reverse_maps[0]);
        if f.contig == r.contig {
            return Ok(());
        }
        let (a, b) = (f.contig, r.contig);
        let (len_a, len_b) = (self.contig_lengths[a] as f64, self.contig_lengths[b] as f64);
        //A is oriented so the forward read reads forward on it
        let a_same = f.same_strand;
        let start_a = if a_same {
            f.contig_start as f64
        } else {
            len_a - (f.contig_start + pair.forward.len()) as f64
        };
        //the reverse read is the complement of the fragment's far end
        let b_same = !r.same_strand;
        let end_b = if b_same {
            (r.contig_start + pair.reverse.len()) as f64
        } else {
            len_b - r.contig_start as f64
        };
        let distance = library.mean_insert - (len_a - start_a) - end_b;
        let entry = observations
            .entry(MatePairKey::new(a, a_same, b, b_same))
            .or_default();
        entry.0.push(distance);
        entry.1.push(library.std_dev);
        Ok(())
    }

    /// Gap estimates for every ordered contig pair linked by at least one mate pair.
    pub fn estimate(&self, pairs: &[PairedRead]) -> Result<MatePairMap> {
        let observations = pairs
            .par_iter()
            .try_fold(Observations::default, |mut local, pair| {
                self.observe(pair, &mut local)?;
                Ok::<_, AssemblyError>(local)
            })
            .try_reduce(Observations::default, |mut a, b| {
                for (key, (mut distances, mut devs)) in b {
                    let entry = a.entry(key).or_default();
                    entry.0.append(&mut distances);
                    entry.1.append(&mut devs);
                }
                Ok(a)
            })?;
        let pairs: FxHashMap<MatePairKey, ContigMatePair> = observations
            .into_par_iter()
            .map(|(key, (mut distances, devs))| {
                distances.sort_by(|x, y| x.total_cmp(y));
                (key, ContigMatePair::from_observations(distances, devs))
            })
            .collect();
        log::debug!("Mate pairs link {} ordered contig pairs", pairs.len());
        Ok(MatePairMap { pairs })
    }
}

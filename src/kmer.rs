use crate::constants::*;
use crate::errors::{AssemblyError, Result};

pub type PackedKmer = u64;

const SYMBOLS: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub fn check_kmer_length(length: usize) -> Result<()> {
    if length == 0 {
        return Err(AssemblyError::InvalidKmerLength {
            length,
            reason: "k-mer length must be positive".to_string(),
        });
    }
    if length > MAX_KMER_LENGTH {
        return Err(AssemblyError::InvalidKmerLength {
            length,
            reason: format!("at most {} symbols fit in a packed k-mer", MAX_KMER_LENGTH),
        });
    }
    Ok(())
}

#[inline]
pub fn symbol_code(symbol: u8, position: usize) -> Result<u64> {
    match symbol {
        b'A' | b'a' => Ok(0),
        b'C' | b'c' => Ok(1),
        b'G' | b'g' => Ok(2),
        b'T' | b't' => Ok(3),
        _ => Err(AssemblyError::UnsupportedSymbol {
            symbol: symbol as char,
            position,
        }),
    }
}

#[inline]
fn mask(length: usize) -> u64 {
    if length >= MAX_KMER_LENGTH {
        u64::MAX
    } else {
        (1u64 << (2 * length)) - 1
    }
}

/// Packs `symbols` two bits per base, first symbol in the most significant position.
pub fn encode(symbols: &[u8]) -> Result<PackedKmer> {
    check_kmer_length(symbols.len())?;
    let mut packed = 0;
    for (position, &symbol) in symbols.iter().enumerate() {
        packed = (packed << 2) | symbol_code(symbol, position)?;
    }
    Ok(packed)
}

pub fn decode(packed: PackedKmer, length: usize) -> Vec<u8> {
    debug_assert!(length > 0 && length <= MAX_KMER_LENGTH);
    (0..length)
        .map(|i| SYMBOLS[((packed >> (2 * (length - 1 - i))) & 3) as usize])
        .collect()
}

#[inline]
pub fn reverse_complement(packed: PackedKmer, length: usize) -> PackedKmer {
    debug_assert!(length > 0 && length <= MAX_KMER_LENGTH);
    //complement every base then reverse the order of the 2-bit groups
    let mut seq = (!packed).swap_bytes();
    seq = ((seq & 0xF0F0_F0F0_F0F0_F0F0) >> 4) | ((seq & 0x0F0F_0F0F_0F0F_0F0F) << 4);
    seq = ((seq & 0xCCCC_CCCC_CCCC_CCCC) >> 2) | ((seq & 0x3333_3333_3333_3333) << 2);
    seq >> (64 - 2 * length)
}

#[inline]
pub fn is_palindrome(packed: PackedKmer, length: usize) -> bool {
    packed == reverse_complement(packed, length)
}

/// Returns the smaller of the k-mer and its reverse complement, and whether
/// the k-mer itself was the one kept.
#[inline]
pub fn canonicalize(packed: PackedKmer, length: usize) -> (PackedKmer, bool) {
    let rc = reverse_complement(packed, length);
    if packed <= rc {
        (packed, true)
    } else {
        (rc, false)
    }
}

#[inline]
pub fn orient(packed: PackedKmer, length: usize, forward: bool) -> PackedKmer {
    if forward {
        packed
    } else {
        reverse_complement(packed, length)
    }
}

pub fn first_symbol(packed: PackedKmer, length: usize, forward: bool) -> u8 {
    debug_assert!(length > 0 && length <= MAX_KMER_LENGTH);
    let oriented = orient(packed, length, forward);
    SYMBOLS[((oriented >> (2 * (length - 1))) & 3) as usize]
}

pub fn last_symbol(packed: PackedKmer, length: usize, forward: bool) -> u8 {
    debug_assert!(length > 0 && length <= MAX_KMER_LENGTH);
    let oriented = orient(packed, length, forward);
    SYMBOLS[(oriented & 3) as usize]
}

/// Rolling canonical k-mers of a read: yields `(offset, canonical, was_forward)`.
pub struct CanonicalKmers<'a> {
    read: &'a [u8],
    kmer_length: usize,
    position: usize,
    forward: u64,
    reverse: u64,
}

impl<'a> CanonicalKmers<'a> {
    pub fn new(read: &'a [u8], kmer_length: usize) -> Result<CanonicalKmers<'a>> {
        check_kmer_length(kmer_length)?;
        Ok(CanonicalKmers {
            read,
            kmer_length,
            position: 0,
            forward: 0,
            reverse: 0,
        })
    }
}

impl<'a> Iterator for CanonicalKmers<'a> {
    type Item = Result<(usize, PackedKmer, bool)>;

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.kmer_length;
        let m = mask(k);
        while self.position < self.read.len() {
            let position = self.position;
            self.position += 1;
            let code = match symbol_code(self.read[position], position) {
                Ok(code) => code,
                Err(e) => {
                    self.position = self.read.len();
                    return Some(Err(e));
                }
            };
            self.forward = ((self.forward << 2) | code) & m;
            self.reverse = (self.reverse >> 2) | ((3 - code) << (2 * (k - 1)));
            if position + 1 >= k {
                let offset = position + 1 - k;
                let item = if self.forward <= self.reverse {
                    (offset, self.forward, true)
                } else {
                    (offset, self.reverse, false)
                };
                return Some(Ok(item));
            }
        }
        None
    }
}

use std::fmt;

use crate::constants::GUIDE_LENGTH;

const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 2-bit code for an unambiguous uppercase nucleotide.
///
/// - A: 00
/// - C: 01
/// - G: 10
/// - T: 11
///
/// Anything else (lower case, `N`, IUPAC codes) has no code.
#[must_use]
pub const fn nucleotide_code(base: u8) -> Option<u64> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// A 23-nt guide packed into the low 46 bits of a `u64`.
///
/// The dedup sets hold one of these per distinct guide, so a genome-scale
/// run keeps 8 bytes per key rather than a heap string.
///
/// # Examples
///
/// ```rust
/// use crackle_core::sequence::packed::PackedGuide;
///
/// let guide = PackedGuide::from_bases(b"ACGTACGTACGTACGTACGTAGG").unwrap();
/// assert_eq!(guide.to_string(), "ACGTACGTACGTACGTACGTAGG");
/// assert!(PackedGuide::from_bases(b"ACGTN").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedGuide(u64);

impl PackedGuide {
    /// Pack exactly [`GUIDE_LENGTH`] unambiguous bases.
    #[must_use]
    pub fn from_bases(bases: &[u8]) -> Option<Self> {
        if bases.len() != GUIDE_LENGTH {
            return None;
        }
        let mut packed = 0u64;
        for &base in bases {
            packed = (packed << 2) | nucleotide_code(base)?;
        }
        Some(Self(packed))
    }

    /// Unpack into ASCII bases.
    #[must_use]
    pub fn to_bases(self) -> [u8; GUIDE_LENGTH] {
        let mut bases = [0u8; GUIDE_LENGTH];
        for (i, base) in bases.iter_mut().enumerate() {
            let shift = 2 * (GUIDE_LENGTH - 1 - i);
            *base = NUCLEOTIDES[((self.0 >> shift) & 0b11) as usize];
        }
        bases
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackedGuide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bases = self.to_bases();
        // Only ACGT are ever packed
        f.write_str(std::str::from_utf8(&bases).map_err(|_| fmt::Error)?)
    }
}

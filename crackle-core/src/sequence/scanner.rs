use bio::alphabets::dna::revcomp;
use bio::bio_types::strand::Strand;

use crate::constants::{FORWARD_PAM, GUIDE_LENGTH, REVERSE_PAM};
use crate::sequence::packed::nucleotide_code;

/// A motif-adjacent window found by the scanner.
///
/// `sequence` is always written 5'→3' with the PAM at the end; reverse-strand
/// hits are reverse complemented. `start`/`end` are 0-based half-open
/// offsets of the window on the forward strand.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideCandidate {
    pub sequence: Vec<u8>,
    pub header: String,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
}

/// Lazy iterator over every candidate window of one sequence.
///
/// All forward-strand hits are produced left to right, followed by all
/// reverse-strand hits left to right. Overlapping windows are reported
/// independently. Windows containing anything other than upper-case `ACGT`
/// are never candidates.
pub struct GuideScanner<'a> {
    sequence: &'a [u8],
    header: &'a str,
    position: usize,
    strand: Strand,
}

impl GuideScanner<'_> {
    fn matches(&self, window: &[u8]) -> bool {
        let motif = match self.strand {
            Strand::Forward => &window[GUIDE_LENGTH - FORWARD_PAM.len()..],
            _ => &window[..REVERSE_PAM.len()],
        };
        let expected = match self.strand {
            Strand::Forward => FORWARD_PAM,
            _ => REVERSE_PAM,
        };
        motif == expected && window.iter().all(|&b| nucleotide_code(b).is_some())
    }
}

impl Iterator for GuideScanner<'_> {
    type Item = GuideCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.position + GUIDE_LENGTH > self.sequence.len() {
                match self.strand {
                    Strand::Forward => {
                        self.strand = Strand::Reverse;
                        self.position = 0;
                        continue;
                    }
                    _ => return None,
                }
            }

            let start = self.position;
            let end = start + GUIDE_LENGTH;
            self.position += 1;

            let window = &self.sequence[start..end];
            if !self.matches(window) {
                continue;
            }

            let sequence = match self.strand {
                Strand::Forward => window.to_vec(),
                _ => revcomp(window),
            };
            return Some(GuideCandidate {
                sequence,
                header: self.header.to_string(),
                start,
                end,
                strand: self.strand,
            });
        }
    }
}

/// Scan one sequence for candidate guides on both strands.
///
/// # Examples
///
/// ```rust
/// use crackle_core::sequence::scanner::scan_sequence;
/// use bio::bio_types::strand::Strand;
///
/// let hits: Vec<_> = scan_sequence("chr1", b"AACGTACGTACGTACGTACGTGGACGT").collect();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].sequence, b"AACGTACGTACGTACGTACGTGG");
/// assert_eq!(hits[0].strand, Strand::Forward);
/// ```
#[must_use]
pub fn scan_sequence<'a>(header: &'a str, sequence: &'a [u8]) -> GuideScanner<'a> {
    GuideScanner {
        sequence,
        header,
        position: 0,
        strand: Strand::Forward,
    }
}

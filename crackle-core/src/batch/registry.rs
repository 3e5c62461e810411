use std::collections::HashSet;

use crate::sequence::packed::PackedGuide;

/// Result of showing a guide key to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this guide was seen in the run
    First,
    /// Seen before; the guide is now a duplicate
    Repeat,
}

/// Run-wide record of which guides and headers have been seen.
///
/// Only 2-bit packed keys are kept, so the registry stays small enough to
/// hold every distinct guide of a genome while full records live on disk.
///
/// # Examples
///
/// ```rust
/// use crackle_core::batch::{DedupRegistry, Sighting};
/// use crackle_core::sequence::PackedGuide;
///
/// let key = PackedGuide::from_bases(b"ACGTACGTACGTACGTACGGAGG").unwrap();
/// let mut registry = DedupRegistry::new();
///
/// assert_eq!(registry.observe(key), Sighting::First);
/// assert_eq!(registry.observe(key), Sighting::Repeat);
/// assert!(registry.is_duplicate(&key));
/// ```
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: HashSet<PackedGuide>,
    duplicates: HashSet<PackedGuide>,
    recorded_headers: HashSet<String>,
}

impl DedupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one occurrence of `key`.
    ///
    /// A second or later sighting marks the key as a duplicate for the rest
    /// of the run.
    pub fn observe(&mut self, key: PackedGuide) -> Sighting {
        if self.seen.insert(key) {
            Sighting::First
        } else {
            self.duplicates.insert(key);
            Sighting::Repeat
        }
    }

    #[must_use]
    pub fn is_duplicate(&self, key: &PackedGuide) -> bool {
        self.duplicates.contains(key)
    }

    /// Decide whether a sequence block should be scanned, recording its
    /// header.
    ///
    /// Blocks whose header was already scanned are skipped. Unnamed blocks
    /// are always scanned when they carry sequence.
    pub fn should_scan(&mut self, header: &str, has_sequence: bool) -> bool {
        if header.is_empty() {
            return has_sequence;
        }
        self.recorded_headers.insert(header.to_string())
    }

    /// Number of distinct guides seen.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }

    /// Number of distinct guides seen more than once.
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

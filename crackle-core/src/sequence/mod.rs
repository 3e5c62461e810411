//! Sequence input and candidate discovery.
//!
//! ## Modules
//!
//! - [`io`]: streaming, lenient multi-record FASTA reading
//! - [`scanner`]: motif-adjacent 23-nt window extraction on both strands
//! - [`packed`]: 2-bit packed guide keys for the dedup sets
//!
//! ## Examples
//!
//! ```rust
//! use crackle_core::sequence::{SequenceReader, scan_sequence};
//!
//! let fasta = b">chr1\nAACGTACGTACGTACG\nTACGTGGACGT\n";
//! for block in SequenceReader::new(&fasta[..]) {
//!     let block = block?;
//!     for guide in scan_sequence(&block.header, &block.sequence) {
//!         println!("{} {}-{}", block.header, guide.start, guide.end);
//!     }
//! }
//! # Ok::<(), crackle_core::types::CrackleError>(())
//! ```

pub mod io;
pub mod packed;
pub mod scanner;

pub use io::{SequenceBlock, SequenceReader, expand_inputs, open_fasta};
pub use packed::PackedGuide;
pub use scanner::{GuideCandidate, GuideScanner, scan_sequence};

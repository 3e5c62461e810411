//! Run-wide deduplication and disk-backed batching of candidates.
//!
//! During scanning every candidate is shown to the [`DedupRegistry`]; only
//! first sightings are written to the [`BatchStore`]. Duplicate status is
//! final once scanning ends, so it is applied when each batch is loaded back
//! for evaluation.

pub mod registry;
pub mod store;

pub use registry::{DedupRegistry, Sighting};
pub use store::{BatchFile, BatchStore};

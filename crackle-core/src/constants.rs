// =============================================================================
// Guide geometry
// =============================================================================

/// Length of a candidate guide including the PAM
pub const GUIDE_LENGTH: usize = 23;

/// Length of the protospacer (guide without PAM)
pub const PROTOSPACER_LENGTH: usize = 20;

/// Forward-strand PAM suffix (`NGG`, the `N` is free)
pub const FORWARD_PAM: &[u8] = b"GG";

/// Reverse-strand PAM prefix (`CCN` on the forward strand)
pub const REVERSE_PAM: &[u8] = b"CC";

// =============================================================================
// Built-in heuristics
// =============================================================================

/// Default lower AT% bound (inclusive)
pub const DEFAULT_AT_MIN: f64 = 20.0;

/// Default upper AT% bound (inclusive)
pub const DEFAULT_AT_MAX: f64 = 65.0;

/// Poly-T run terminating Pol III transcription
pub const POLY_T_MOTIF: &str = "TTTT";

/// 1-based position checked by the CHOPCHOP G20 rule
pub const G20_POSITION: usize = 20;

/// Number of one-hot features per protospacer base
pub const ONE_HOT_WIDTH: usize = 4;

/// Total classifier feature count
pub const CLASSIFIER_FEATURES: usize = PROTOSPACER_LENGTH * ONE_HOT_WIDTH;

// =============================================================================
// Batching and output
// =============================================================================

/// Default number of first-seen guides per spill file
pub const DEFAULT_BATCH_SIZE: usize = 5_000_000;

/// Default consensus threshold
pub const DEFAULT_CONSENSUS_N: usize = 2;

/// Prefix for spill files inside the work directory
pub const BATCH_FILE_PREFIX: &str = "batch_";

/// Placeholder replaced with the scratch input path in external commands
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced with the scratch output path in external commands
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

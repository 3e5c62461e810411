use std::fmt;
use std::path::PathBuf;

use bio::bio_types::strand::Strand;
use thiserror::Error;

/// Tri-state outcome of a single test, plus the ambiguity marker used for
/// provenance of duplicated guides.
///
/// # Examples
///
/// ```rust
/// use crackle_core::types::Outcome;
///
/// assert_eq!(Outcome::Accepted.code(), "1");
/// assert_eq!(Outcome::from_code("?"), Some(Outcome::Pending));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    /// The test ran and the guide passed
    Accepted,
    /// The test ran and the guide failed
    Rejected,
    /// The test has not run (skipped, or its tool failed)
    #[default]
    Pending,
    /// No single value exists (positional fields of duplicated guides)
    Ambiguous,
}

impl Outcome {
    /// Output code for this outcome.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Accepted => "1",
            Self::Rejected => "0",
            Self::Pending => "?",
            Self::Ambiguous => "-",
        }
    }

    /// Parse an output code back into an outcome.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Accepted),
            "0" => Some(Self::Rejected),
            "?" => Some(Self::Pending),
            "-" => Some(Self::Ambiguous),
            _ => None,
        }
    }

    #[must_use]
    pub const fn from_pass(passed: bool) -> Self {
        if passed { Self::Accepted } else { Self::Rejected }
    }

    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    #[must_use]
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// `true` once a test has produced a verdict.
    #[must_use]
    pub const fn is_assessed(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of one stage together with the raw score the module reported.
///
/// The score is stored for output only; decisions never look at it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageResult {
    pub outcome: Outcome,
    pub score: Option<f64>,
}

impl StageResult {
    pub const PENDING: Self = Self {
        outcome: Outcome::Pending,
        score: None,
    };

    #[must_use]
    pub const fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            score: None,
        }
    }

    #[must_use]
    pub const fn scored(outcome: Outcome, score: f64) -> Self {
        Self {
            outcome,
            score: Some(score),
        }
    }
}

/// One executable evaluation step.
///
/// Stages run in declaration order. The first five belong to the mm10db
/// family, whose composite acceptance is the logical AND of the four cheap
/// filters and the folding test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Reject guides that begin with `T`
    LeadingT,
    /// AT content of the protospacer within bounds
    AtPercent,
    /// Reject guides containing a `TTTT` run
    Tttt,
    /// Folding-energy / secondary structure test
    SecondaryStructure,
    /// mm10db composite acceptance
    Mm10db,
    /// CHOPCHOP `G` at position 20
    Chopchop,
    /// Trained classifier
    SgRnaScorer2,
    /// Short-read alignment prefilter
    Bowtie,
    /// Alignment-based off-target score
    OffTarget,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Self; 9] = [
        Self::LeadingT,
        Self::AtPercent,
        Self::Tttt,
        Self::SecondaryStructure,
        Self::Mm10db,
        Self::Chopchop,
        Self::SgRnaScorer2,
        Self::Bowtie,
        Self::OffTarget,
    ];

    /// The mm10db constituents checked by the composite short-circuit.
    pub const MM10DB_FAMILY: [Self; 5] = [
        Self::LeadingT,
        Self::AtPercent,
        Self::Tttt,
        Self::SecondaryStructure,
        Self::Mm10db,
    ];

    /// Consensus module this stage votes for, if any.
    #[must_use]
    pub const fn consensus_module(self) -> Option<ConsensusModule> {
        match self {
            Self::LeadingT | Self::AtPercent | Self::Tttt | Self::SecondaryStructure | Self::Mm10db => {
                Some(ConsensusModule::Mm10db)
            }
            Self::Chopchop => Some(ConsensusModule::Chopchop),
            Self::SgRnaScorer2 => Some(ConsensusModule::SgRnaScorer2),
            Self::Bowtie | Self::OffTarget => None,
        }
    }

    /// Position of this stage in [`Stage::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn is_specificity(self) -> bool {
        matches!(self, Self::Bowtie | Self::OffTarget)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeadingT => "leading_t",
            Self::AtPercent => "at_percent",
            Self::Tttt => "tttt",
            Self::SecondaryStructure => "secondary_structure",
            Self::Mm10db => "mm10db",
            Self::Chopchop => "chopchop",
            Self::SgRnaScorer2 => "sgrnascorer2",
            Self::Bowtie => "bowtie",
            Self::OffTarget => "off_target",
        }
    }

    /// Look a stage up by its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.name() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Modules that take part in the N-of-M vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsensusModule {
    Mm10db,
    Chopchop,
    SgRnaScorer2,
}

impl ConsensusModule {
    pub const ALL: [Self; 3] = [Self::Mm10db, Self::Chopchop, Self::SgRnaScorer2];
}

/// Where a guide was first found.
///
/// Guides seen more than once anywhere in the input have no single position
/// and carry [`Provenance::Ambiguous`].
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    Located {
        header: String,
        /// 0-based start offset on the forward strand
        start: usize,
        /// 0-based exclusive end offset on the forward strand
        end: usize,
        strand: Strand,
    },
    Ambiguous,
}

/// Strand symbol used in batch and output files.
#[must_use]
pub const fn strand_symbol(strand: Strand) -> &'static str {
    match strand {
        Strand::Forward => "+",
        Strand::Reverse => "-",
        Strand::Unknown => ".",
    }
}

/// Parse a strand symbol written by [`strand_symbol`].
#[must_use]
pub fn parse_strand(symbol: &str) -> Option<Strand> {
    match symbol {
        "+" => Some(Strand::Forward),
        "-" => Some(Strand::Reverse),
        "." => Some(Strand::Unknown),
        _ => None,
    }
}

/// Error types that abort a run
#[derive(Error, Debug)]
pub enum CrackleError {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A batch file could not be written or read back
    #[error("Batch file {}: {source}", path.display())]
    Batch {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// A batch row did not have the expected shape
    #[error("Corrupt batch file {} at row {row}: {reason}", path.display())]
    CorruptBatch {
        path: PathBuf,
        row: usize,
        reason: String,
    },
    /// Writing the result stream failed
    #[error("Output error: {0}")]
    Output(#[from] csv::Error),
    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Configuration file is not valid TOML for this schema
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// An enabled stage has no module registered
    #[error("No evaluation module registered for stage {0}")]
    MissingModule(Stage),
    /// Worker pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Non-fatal failure of a single evaluation.
///
/// The affected guide keeps a pending outcome for the stage.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The tool ran but reported failure
    #[error("{module} failed: {message}")]
    Tool {
        module: &'static str,
        message: String,
    },
    /// The tool could not be started or its scratch files handled
    #[error("Failed to run external tool: {0}")]
    Spawn(#[from] std::io::Error),
    /// Tool output line could not be parsed
    #[error("Malformed tool output at line {line}: {content:?}")]
    Malformed { line: usize, content: String },
    /// Tool produced a different number of results than inputs
    #[error("Expected {expected} results from tool, found {found}")]
    CountMismatch { expected: usize, found: usize },
    /// A composite could not be decided from its constituents
    #[error("Unresolved constituents: {0}")]
    Unresolved(&'static str),
    /// The guide cannot be evaluated by this module
    #[error("Invalid guide {0:?}")]
    InvalidGuide(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes_round_trip() {
        for outcome in [
            Outcome::Accepted,
            Outcome::Rejected,
            Outcome::Pending,
            Outcome::Ambiguous,
        ] {
            assert_eq!(Outcome::from_code(outcome.code()), Some(outcome));
        }
        assert_eq!(Outcome::from_code("x"), None);
    }

    #[test]
    fn test_pending_is_not_assessed() {
        assert!(!Outcome::Pending.is_assessed());
        assert!(!Outcome::Ambiguous.is_assessed());
        assert!(Outcome::Rejected.is_assessed());
        assert!(Outcome::Accepted.is_assessed());
    }

    #[test]
    fn test_stage_order_matches_all() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::ALL[0], Stage::LeadingT);
        assert_eq!(Stage::ALL[8], Stage::OffTarget);
        for (i, stage) in Stage::ALL.into_iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_stage_consensus_membership() {
        for stage in Stage::MM10DB_FAMILY {
            assert_eq!(stage.consensus_module(), Some(ConsensusModule::Mm10db));
        }
        assert_eq!(Stage::Bowtie.consensus_module(), None);
        assert!(Stage::OffTarget.is_specificity());
        assert!(!Stage::Chopchop.is_specificity());
    }

    #[test]
    fn test_stage_from_name() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(Stage::from_name("rnafold"), None);
    }

    #[test]
    fn test_strand_symbols() {
        assert_eq!(strand_symbol(Strand::Forward), "+");
        assert_eq!(parse_strand("-"), Some(Strand::Reverse));
        assert_eq!(parse_strand("x"), None);
    }

    #[test]
    fn test_error_display() {
        let err = CrackleError::MissingModule(Stage::Bowtie);
        assert_eq!(
            err.to_string(),
            "No evaluation module registered for stage bowtie"
        );
        let err = ModuleError::CountMismatch {
            expected: 3,
            found: 2,
        };
        assert!(err.to_string().contains("Expected 3"));
    }
}

//! Skip rules for each optimisation level.
//!
//! [`should_skip`] decides, for one guide and one stage, whether running the
//! stage could still change the final decision. Each level is a fixed list
//! of [`SkipRule`]s; a stage is skipped if any rule of the level applies.
//!
//! | Rule | ultralow | low | medium | high |
//! |---|:-:|:-:|:-:|:-:|
//! | [`SkipRule::AlreadyResolved`] | ✓ | ✓ | ✓ | ✓ |
//! | [`SkipRule::Duplicate`] | | ✓ | ✓ | ✓ |
//! | [`SkipRule::Mm10dbShortCircuit`] | | | ✓ | ✓ |
//! | [`SkipRule::ConsensusUnreachable`] | | | ✓ | ✓ |
//! | [`SkipRule::PrefilterRejected`] | | | ✓ | ✓ |
//! | [`SkipRule::ConsensusResolved`] | | | | ✓ |
//!
//! Every rule only fires when the skipped work cannot affect
//! [`GuideRecord::final_accepted`], so all levels accept the same guides.

use crate::config::{ConsensusConfig, OptimisationLevel};
use crate::guide::GuideRecord;
use crate::types::Stage;

/// A single reason to skip a stage for a guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipRule {
    /// The stage already produced a verdict for this guide
    AlreadyResolved,
    /// The guide occurs more than once and can never be accepted
    Duplicate,
    /// An mm10db constituent already rejected; the composite is decided
    Mm10dbShortCircuit,
    /// Specificity stages: fewer than `n` modules accepted
    ConsensusUnreachable,
    /// Off-target scoring: the alignment prefilter already rejected
    PrefilterRejected,
    /// Consensus stages: the vote is already won or provably lost.
    /// Specificity stages: the vote is provably lost.
    ConsensusResolved,
}

const ULTRALOW: &[SkipRule] = &[SkipRule::AlreadyResolved];

const LOW: &[SkipRule] = &[SkipRule::AlreadyResolved, SkipRule::Duplicate];

const MEDIUM: &[SkipRule] = &[
    SkipRule::AlreadyResolved,
    SkipRule::Duplicate,
    SkipRule::Mm10dbShortCircuit,
    SkipRule::ConsensusUnreachable,
    SkipRule::PrefilterRejected,
];

const HIGH: &[SkipRule] = &[
    SkipRule::AlreadyResolved,
    SkipRule::Duplicate,
    SkipRule::Mm10dbShortCircuit,
    SkipRule::ConsensusUnreachable,
    SkipRule::PrefilterRejected,
    SkipRule::ConsensusResolved,
];

/// Rules in force at `level`.
#[must_use]
pub const fn rules(level: OptimisationLevel) -> &'static [SkipRule] {
    match level {
        OptimisationLevel::UltraLow => ULTRALOW,
        OptimisationLevel::Low => LOW,
        OptimisationLevel::Medium => MEDIUM,
        OptimisationLevel::High => HIGH,
    }
}

impl SkipRule {
    /// Whether this rule skips `stage` for `record`.
    #[must_use]
    pub fn applies(self, record: &GuideRecord, stage: Stage, consensus: &ConsensusConfig) -> bool {
        match self {
            Self::AlreadyResolved => record.outcome(stage).is_assessed(),
            Self::Duplicate => record.is_duplicate(),
            Self::Mm10dbShortCircuit => {
                Stage::MM10DB_FAMILY.contains(&stage) && record.mm10db_rejected()
            }
            Self::ConsensusUnreachable => {
                stage.is_specificity() && !record.consensus_won(consensus)
            }
            Self::PrefilterRejected => {
                stage == Stage::OffTarget && record.outcome(Stage::Bowtie).is_rejected()
            }
            Self::ConsensusResolved => match stage.consensus_module() {
                Some(_) => record.consensus_won(consensus) || record.consensus_lost(consensus),
                None => record.consensus_lost(consensus),
            },
        }
    }
}

/// Decide whether `stage` can be skipped for `record` at `level`.
///
/// # Examples
///
/// ```rust
/// use crackle_core::config::{ConsensusConfig, OptimisationLevel};
/// use crackle_core::guide::GuideRecord;
/// use crackle_core::optimisation::should_skip;
/// use crackle_core::types::Stage;
///
/// let dup = GuideRecord::duplicate("ACGTACGTACGTACGTACGGAGG");
/// let consensus = ConsensusConfig::default();
///
/// assert!(!should_skip(&dup, Stage::Chopchop, OptimisationLevel::UltraLow, &consensus));
/// assert!(should_skip(&dup, Stage::Chopchop, OptimisationLevel::Low, &consensus));
/// ```
#[must_use]
pub fn should_skip(
    record: &GuideRecord,
    stage: Stage,
    level: OptimisationLevel,
    consensus: &ConsensusConfig,
) -> bool {
    rules(level)
        .iter()
        .any(|rule| rule.applies(record, stage, consensus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Outcome, StageResult};
    use bio::bio_types::strand::Strand;

    const SEQ: &str = "ACGTACGTACGTACGTACGGAGG";

    fn record() -> GuideRecord {
        GuideRecord::located(SEQ, "chr1", 0, 23, Strand::Forward)
    }

    fn set(record: &mut GuideRecord, stage: Stage, outcome: Outcome) {
        record.set_result(stage, StageResult::new(outcome));
    }

    fn consensus(n: usize) -> ConsensusConfig {
        ConsensusConfig {
            n,
            ..ConsensusConfig::default()
        }
    }

    #[test]
    fn test_levels_are_cumulative() {
        for pair in OptimisationLevel::ALL.windows(2) {
            let lower = rules(pair[0]);
            let higher = rules(pair[1]);
            assert!(lower.iter().all(|rule| higher.contains(rule)));
            assert!(higher.len() > lower.len());
        }
    }

    #[test]
    fn test_ultralow_runs_everything_once() {
        let mut dup = GuideRecord::duplicate(SEQ);
        set(&mut dup, Stage::LeadingT, Outcome::Rejected);
        let c = consensus(2);
        for stage in Stage::ALL {
            let skip = should_skip(&dup, stage, OptimisationLevel::UltraLow, &c);
            assert_eq!(skip, stage == Stage::LeadingT, "stage {stage}");
        }
    }

    #[test]
    fn test_low_skips_only_duplicates() {
        let c = consensus(2);
        let dup = GuideRecord::duplicate(SEQ);
        let mut unique = record();
        set(&mut unique, Stage::LeadingT, Outcome::Rejected);
        for stage in Stage::ALL {
            assert!(should_skip(&dup, stage, OptimisationLevel::Low, &c));
        }
        assert!(!should_skip(&unique, Stage::AtPercent, OptimisationLevel::Low, &c));
        assert!(!should_skip(&unique, Stage::Bowtie, OptimisationLevel::Low, &c));
    }

    #[test]
    fn test_medium_mm10db_short_circuit() {
        let c = consensus(2);
        let mut r = record();
        set(&mut r, Stage::AtPercent, Outcome::Rejected);
        for stage in Stage::MM10DB_FAMILY {
            assert!(should_skip(&r, stage, OptimisationLevel::Medium, &c));
        }
        assert!(!should_skip(&r, Stage::Chopchop, OptimisationLevel::Medium, &c));
        assert!(!should_skip(&r, Stage::SgRnaScorer2, OptimisationLevel::Medium, &c));
    }

    #[test]
    fn test_medium_specificity_requires_consensus() {
        let c = consensus(2);
        let mut r = record();
        set(&mut r, Stage::Mm10db, Outcome::Accepted);
        assert!(should_skip(&r, Stage::Bowtie, OptimisationLevel::Medium, &c));
        assert!(!should_skip(&r, Stage::Bowtie, OptimisationLevel::Low, &c));

        set(&mut r, Stage::Chopchop, Outcome::Accepted);
        assert!(!should_skip(&r, Stage::Bowtie, OptimisationLevel::Medium, &c));

        set(&mut r, Stage::Bowtie, Outcome::Rejected);
        assert!(should_skip(&r, Stage::OffTarget, OptimisationLevel::Medium, &c));
    }

    #[test]
    fn test_high_stops_voting_once_won() {
        let c = consensus(1);
        let mut r = record();
        set(&mut r, Stage::Mm10db, Outcome::Accepted);
        assert!(should_skip(&r, Stage::Chopchop, OptimisationLevel::High, &c));
        assert!(should_skip(&r, Stage::SgRnaScorer2, OptimisationLevel::High, &c));
        assert!(!should_skip(&r, Stage::Chopchop, OptimisationLevel::Medium, &c));
        assert!(!should_skip(&r, Stage::Bowtie, OptimisationLevel::High, &c));
    }

    #[test]
    fn test_high_stops_voting_once_lost() {
        let c = consensus(2);
        let mut r = record();
        set(&mut r, Stage::Tttt, Outcome::Rejected);
        // mm10db lost; chopchop and sgrnascorer2 could still reach two
        assert!(!should_skip(&r, Stage::Chopchop, OptimisationLevel::High, &c));

        set(&mut r, Stage::Chopchop, Outcome::Rejected);
        assert!(should_skip(&r, Stage::SgRnaScorer2, OptimisationLevel::High, &c));
        assert!(should_skip(&r, Stage::Bowtie, OptimisationLevel::High, &c));
        assert!(!should_skip(&r, Stage::SgRnaScorer2, OptimisationLevel::Medium, &c));
    }

    #[test]
    fn test_high_needs_remaining_votes() {
        let c = consensus(2);
        let mut r = record();
        set(&mut r, Stage::Mm10db, Outcome::Accepted);
        // one accepted, two untested: undecided
        assert!(!should_skip(&r, Stage::Chopchop, OptimisationLevel::High, &c));
        set(&mut r, Stage::Chopchop, Outcome::Rejected);
        // one accepted, one untested, need one more: still undecided
        assert!(!should_skip(&r, Stage::SgRnaScorer2, OptimisationLevel::High, &c));
    }
}

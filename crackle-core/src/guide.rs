use bio::bio_types::strand::Strand;

use crate::config::{ConsensusConfig, CrackleConfig};
use crate::constants::PROTOSPACER_LENGTH;
use crate::sequence::scanner::GuideCandidate;
use crate::types::{ConsensusModule, Outcome, Provenance, Stage, StageResult};

/// One distinct candidate guide and everything learned about it.
///
/// Records are created when a batch is loaded for evaluation and mutated
/// only by the engine committing stage results. Every stage starts out
/// [`Outcome::Pending`].
///
/// # Examples
///
/// ```rust
/// use crackle_core::guide::GuideRecord;
/// use crackle_core::config::ConsensusConfig;
/// use crackle_core::types::{Outcome, Stage, StageResult};
/// use bio::bio_types::strand::Strand;
///
/// let mut guide = GuideRecord::located("ACGTACGTACGTACGTACGGAGG", "chr1", 10, 33, Strand::Forward);
/// guide.set_result(Stage::Chopchop, StageResult::new(Outcome::Accepted));
///
/// let consensus = ConsensusConfig { n: 1, mm10db: false, chopchop: true, sgrnascorer2: false };
/// assert_eq!(guide.consensus_count(&consensus), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GuideRecord {
    /// 23-nt guide including PAM, the unique key
    pub sequence: String,
    pub provenance: Provenance,
    /// `Rejected` when the guide occurs more than once in the input
    pub is_unique: Outcome,
    results: [StageResult; Stage::ALL.len()],
}

impl GuideRecord {
    /// A guide with a single known position.
    pub fn located(
        sequence: impl Into<String>,
        header: impl Into<String>,
        start: usize,
        end: usize,
        strand: Strand,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            provenance: Provenance::Located {
                header: header.into(),
                start,
                end,
                strand,
            },
            is_unique: Outcome::Accepted,
            results: [StageResult::PENDING; Stage::ALL.len()],
        }
    }

    /// A guide seen more than once; it has no single position.
    pub fn duplicate(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            provenance: Provenance::Ambiguous,
            is_unique: Outcome::Rejected,
            results: [StageResult::PENDING; Stage::ALL.len()],
        }
    }

    /// Build a record from a scanner hit, honouring the duplicate flag.
    #[must_use]
    pub fn from_candidate(candidate: &GuideCandidate, duplicated: bool) -> Self {
        let sequence = String::from_utf8_lossy(&candidate.sequence).into_owned();
        if duplicated {
            Self::duplicate(sequence)
        } else {
            Self::located(
                sequence,
                candidate.header.clone(),
                candidate.start,
                candidate.end,
                candidate.strand,
            )
        }
    }

    /// The 20-nt protospacer (guide without PAM).
    #[must_use]
    pub fn protospacer(&self) -> &str {
        let end = PROTOSPACER_LENGTH.min(self.sequence.len());
        &self.sequence[..end]
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.is_unique.is_rejected()
    }

    #[must_use]
    pub const fn result(&self, stage: Stage) -> StageResult {
        self.results[stage.index()]
    }

    #[must_use]
    pub const fn outcome(&self, stage: Stage) -> Outcome {
        self.results[stage.index()].outcome
    }

    pub fn set_result(&mut self, stage: Stage, result: StageResult) {
        self.results[stage.index()] = result;
    }

    /// `true` if any mm10db constituent or the composite itself rejected.
    #[must_use]
    pub fn mm10db_rejected(&self) -> bool {
        Stage::MM10DB_FAMILY
            .into_iter()
            .any(|stage| self.outcome(stage).is_rejected())
    }

    /// The vote a consensus module casts for this guide.
    ///
    /// mm10db votes its composite outcome; a rejected constituent counts as
    /// a rejection even when the composite stage itself was short-circuited.
    #[must_use]
    pub fn module_outcome(&self, module: ConsensusModule) -> Outcome {
        match module {
            ConsensusModule::Mm10db => {
                let composite = self.outcome(Stage::Mm10db);
                if composite.is_assessed() {
                    composite
                } else if self.mm10db_rejected() {
                    Outcome::Rejected
                } else {
                    Outcome::Pending
                }
            }
            ConsensusModule::Chopchop => self.outcome(Stage::Chopchop),
            ConsensusModule::SgRnaScorer2 => self.outcome(Stage::SgRnaScorer2),
        }
    }

    fn votes<'a>(&'a self, consensus: &'a ConsensusConfig) -> impl Iterator<Item = Outcome> + 'a {
        ConsensusModule::ALL
            .into_iter()
            .filter(move |module| consensus.participates(*module))
            .map(move |module| self.module_outcome(module))
    }

    /// Participating modules that have accepted this guide.
    #[must_use]
    pub fn consensus_count(&self, consensus: &ConsensusConfig) -> usize {
        self.votes(consensus).filter(|o| o.is_accepted()).count()
    }

    /// Participating modules that have reached a verdict either way.
    #[must_use]
    pub fn consensus_assessed(&self, consensus: &ConsensusConfig) -> usize {
        self.votes(consensus).filter(|o| o.is_assessed()).count()
    }

    /// `true` once enough modules accepted.
    #[must_use]
    pub fn consensus_won(&self, consensus: &ConsensusConfig) -> bool {
        self.consensus_count(consensus) >= consensus.n
    }

    /// `true` once too few untested modules remain to ever reach `n`.
    #[must_use]
    pub fn consensus_lost(&self, consensus: &ConsensusConfig) -> bool {
        let accepted = self.consensus_count(consensus);
        let remaining = consensus
            .tools_in_consensus()
            .saturating_sub(self.consensus_assessed(consensus));
        remaining < consensus.n.saturating_sub(accepted)
    }

    /// Specificity verdict: both alignment stages must accept.
    #[must_use]
    pub fn specificity_accepted(&self) -> bool {
        self.outcome(Stage::Bowtie).is_accepted() && self.outcome(Stage::OffTarget).is_accepted()
    }

    /// Final accept/reject decision.
    ///
    /// Depends only on the recorded outcomes, never on which stages were
    /// skipped to get there: unique, at least `n` accepting votes and, when
    /// enabled, a passing specificity check.
    #[must_use]
    pub fn final_accepted(&self, config: &CrackleConfig) -> bool {
        !self.is_duplicate()
            && self.consensus_won(&config.consensus)
            && (!config.specificity.enabled || self.specificity_accepted())
    }
}

use crate::constants::{G20_POSITION, POLY_T_MOTIF, PROTOSPACER_LENGTH};
use crate::guide::GuideRecord;
use crate::modules::EvaluationModule;
use crate::types::{ModuleError, Outcome, Stage, StageResult};

/// mm10db constituents folded into the composite.
const MM10DB_CONSTITUENTS: [Stage; 4] = [
    Stage::LeadingT,
    Stage::AtPercent,
    Stage::Tttt,
    Stage::SecondaryStructure,
];

/// Percentage of `A`/`T` bases in `bases`.
///
/// # Examples
///
/// ```rust
/// use crackle_core::modules::heuristics::at_percentage;
///
/// assert_eq!(at_percentage(b"AATTGGCC"), 50.0);
/// assert_eq!(at_percentage(b""), 0.0);
/// ```
#[must_use]
pub fn at_percentage(bases: &[u8]) -> f64 {
    if bases.is_empty() {
        return 0.0;
    }
    let at = bases
        .iter()
        .filter(|&&b| matches!(b.to_ascii_uppercase(), b'A' | b'T'))
        .count();
    at as f64 * 100.0 / bases.len() as f64
}

/// Rejects guides whose first base is `T`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingT;

impl EvaluationModule for LeadingT {
    fn stage(&self) -> Stage {
        Stage::LeadingT
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let leading_t = guide.sequence.starts_with('T');
        Ok(StageResult::new(Outcome::from_pass(!leading_t)))
    }
}

/// Accepts guides whose protospacer AT% lies within `[min, max]`.
///
/// The AT% is reported as the stage score.
#[derive(Debug, Clone, Copy)]
pub struct AtPercent {
    pub min: f64,
    pub max: f64,
}

impl AtPercent {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl EvaluationModule for AtPercent {
    fn stage(&self) -> Stage {
        Stage::AtPercent
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let at = at_percentage(guide.protospacer().as_bytes());
        let passed = at >= self.min && at <= self.max;
        Ok(StageResult::scored(Outcome::from_pass(passed), at))
    }
}

/// Rejects guides containing a poly-T run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tttt;

impl EvaluationModule for Tttt {
    fn stage(&self) -> Stage {
        Stage::Tttt
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let passed = !guide.sequence.contains(POLY_T_MOTIF);
        Ok(StageResult::new(Outcome::from_pass(passed)))
    }
}

/// mm10db acceptance: the AND of the four mm10db filters.
///
/// Rejects as soon as any constituent rejected. Fails while a constituent is
/// still pending, so the composite stays pending too.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mm10dbComposite;

impl EvaluationModule for Mm10dbComposite {
    fn stage(&self) -> Stage {
        Stage::Mm10db
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let outcomes = MM10DB_CONSTITUENTS.map(|stage| guide.outcome(stage));
        if outcomes.iter().any(|o| o.is_rejected()) {
            return Ok(StageResult::new(Outcome::Rejected));
        }
        if outcomes.iter().all(|o| o.is_accepted()) {
            return Ok(StageResult::new(Outcome::Accepted));
        }
        let pending = MM10DB_CONSTITUENTS
            .into_iter()
            .zip(outcomes)
            .find(|(_, outcome)| !outcome.is_assessed())
            .map_or("unknown", |(stage, _)| stage.name());
        Err(ModuleError::Unresolved(pending))
    }
}

/// CHOPCHOP rule: the protospacer must end in `G` (position 20).
#[derive(Debug, Clone, Copy, Default)]
pub struct G20;

impl EvaluationModule for G20 {
    fn stage(&self) -> Stage {
        Stage::Chopchop
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        if guide.sequence.len() < PROTOSPACER_LENGTH {
            return Err(ModuleError::InvalidGuide(guide.sequence.clone()));
        }
        let passed = guide.sequence.as_bytes()[G20_POSITION - 1] == b'G';
        Ok(StageResult::new(Outcome::from_pass(passed)))
    }
}

use crate::config::Threshold;
use crate::constants::{CLASSIFIER_FEATURES, ONE_HOT_WIDTH, PROTOSPACER_LENGTH};
use crate::guide::GuideRecord;
use crate::modules::EvaluationModule;
use crate::types::{CrackleError, ModuleError, Outcome, Stage, StageResult};

/// Feature vector for one protospacer.
pub type Features = [f64; CLASSIFIER_FEATURES];

/// One-hot IUPAC code of a base, ordered `G T C A`.
///
/// Ambiguity codes set every bit of the bases they stand for.
const fn iupac_bits(base: u8) -> Option<[u8; ONE_HOT_WIDTH]> {
    let bits = match base.to_ascii_uppercase() {
        b'A' => [0, 0, 0, 1],
        b'C' => [0, 0, 1, 0],
        b'T' => [0, 1, 0, 0],
        b'G' => [1, 0, 0, 0],
        b'K' => [1, 1, 0, 0],
        b'M' => [0, 0, 1, 1],
        b'R' => [1, 0, 0, 1],
        b'Y' => [0, 1, 1, 0],
        b'S' => [1, 0, 1, 0],
        b'W' => [0, 1, 0, 1],
        b'B' => [1, 1, 1, 0],
        b'V' => [1, 0, 1, 1],
        b'H' => [0, 1, 1, 1],
        b'D' => [1, 1, 0, 1],
        b'N' => [1, 1, 1, 1],
        _ => return None,
    };
    Some(bits)
}

/// Encode the first 20 bases of a guide as classifier features.
///
/// Returns `None` for guides shorter than the protospacer or containing
/// non-IUPAC symbols.
///
/// # Examples
///
/// ```rust
/// use crackle_core::modules::classifier::encode_protospacer;
///
/// let features = encode_protospacer(b"ACGTACGTACGTACGTACGGAGG").unwrap();
/// assert_eq!(&features[..4], &[0.0, 0.0, 0.0, 1.0]);
/// assert_eq!(features.iter().sum::<f64>(), 20.0);
/// ```
#[must_use]
pub fn encode_protospacer(guide: &[u8]) -> Option<Features> {
    let protospacer = guide.get(..PROTOSPACER_LENGTH)?;
    let mut features = [0.0; CLASSIFIER_FEATURES];
    for (i, &base) in protospacer.iter().enumerate() {
        let bits = iupac_bits(base)?;
        for (j, bit) in bits.into_iter().enumerate() {
            features[i * ONE_HOT_WIDTH + j] = f64::from(bit);
        }
    }
    Some(features)
}

/// A trained model producing a decision value for a guide.
pub trait GuideClassifier: Send + Sync {
    /// Signed distance from the decision boundary; larger is better.
    fn decision(&self, features: &Features) -> f64;
}

/// Linear decision function `w · x + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearClassifier {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearClassifier {
    /// Build a classifier from one weight per feature and a bias.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::InvalidConfig`] unless exactly
    /// [`CLASSIFIER_FEATURES`] weights are given.
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, CrackleError> {
        if weights.len() != CLASSIFIER_FEATURES {
            return Err(CrackleError::InvalidConfig(format!(
                "classifier needs {CLASSIFIER_FEATURES} weights, got {}",
                weights.len()
            )));
        }
        Ok(Self { weights, bias })
    }
}

impl GuideClassifier for LinearClassifier {
    fn decision(&self, features: &Features) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }
}

/// sgRNAScorer2-style module wrapping any [`GuideClassifier`].
///
/// The decision value is the stage score; the guide is accepted when the
/// score passes `threshold`.
#[derive(Debug, Clone)]
pub struct ClassifierModule<C> {
    classifier: C,
    threshold: Threshold,
}

impl<C: GuideClassifier> ClassifierModule<C> {
    pub const fn new(classifier: C, threshold: Threshold) -> Self {
        Self {
            classifier,
            threshold,
        }
    }
}

impl<C: GuideClassifier> EvaluationModule for ClassifierModule<C> {
    fn stage(&self) -> Stage {
        Stage::SgRnaScorer2
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let features = encode_protospacer(guide.sequence.as_bytes())
            .ok_or_else(|| ModuleError::InvalidGuide(guide.sequence.clone()))?;
        let score = self.classifier.decision(&features);
        let outcome = Outcome::from_pass(self.threshold.passes(score));
        Ok(StageResult::scored(outcome, score))
    }
}

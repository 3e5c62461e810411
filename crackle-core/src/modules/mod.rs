//! Evaluation modules.
//!
//! Every [`Stage`] is evaluated by exactly one [`EvaluationModule`]. Modules
//! only read guides and return a [`StageResult`]; the engine commits the
//! result to the record. A module error leaves the stage pending for the
//! affected guides and never aborts the run.
//!
//! ## Built-in modules
//!
//! - [`heuristics`]: the cheap mm10db filters, the mm10db composite and the
//!   CHOPCHOP G20 rule
//! - [`classifier`]: linear guide classifier over one-hot protospacer
//!   features
//! - [`command`]: adapter running an external program over a chunk of guides
//!
//! ## Examples
//!
//! ```rust
//! use crackle_core::config::CrackleConfig;
//! use crackle_core::modules::ModuleSet;
//! use crackle_core::types::Stage;
//!
//! let modules = ModuleSet::builtin(&CrackleConfig::default());
//! assert!(modules.get(Stage::LeadingT).is_some());
//! assert!(modules.get(Stage::Bowtie).is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::config::CrackleConfig;
use crate::guide::GuideRecord;
use crate::types::{CrackleError, ModuleError, Stage, StageResult};

pub mod classifier;
pub mod command;
pub mod heuristics;

pub use classifier::{ClassifierModule, GuideClassifier, LinearClassifier};
pub use command::CommandModule;
pub use heuristics::{AtPercent, G20, LeadingT, Mm10dbComposite, Tttt};

/// Per-batch resources shared by all modules.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    /// Directory for module scratch files, removed after the batch
    pub scratch_dir: &'a Path,
    /// Index of the batch being evaluated
    pub batch_index: usize,
}

/// A test applied to guides for one stage.
///
/// Implementations must be deterministic for a given guide and safe to call
/// from several worker threads at once.
pub trait EvaluationModule: Send + Sync {
    /// Stage whose outcome this module produces
    fn stage(&self) -> Stage;

    /// Evaluate a single guide.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`] when the guide cannot be assessed.
    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError>;

    /// Evaluate a chunk of guides, returning one result per guide in order.
    ///
    /// The default evaluates each guide independently. Modules backed by
    /// external tools override this to amortise process start-up.
    fn evaluate_batch(
        &self,
        guides: &[&GuideRecord],
        _ctx: &BatchContext<'_>,
    ) -> Vec<Result<StageResult, ModuleError>> {
        guides.iter().map(|guide| self.evaluate(guide)).collect()
    }
}

/// The modules available to a pipeline, at most one per stage.
#[derive(Default)]
pub struct ModuleSet {
    modules: BTreeMap<Stage, Box<dyn EvaluationModule>>,
}

impl fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.modules.keys()).finish()
    }
}

impl ModuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The modules that need no external tool.
    #[must_use]
    pub fn builtin(config: &CrackleConfig) -> Self {
        let mut modules = Self::new();
        modules.register(LeadingT);
        modules.register(AtPercent::new(config.filters.at_min, config.filters.at_max));
        modules.register(Tttt);
        modules.register(Mm10dbComposite);
        modules.register(G20);
        modules
    }

    /// Built-in modules plus a [`CommandModule`] for every configured
    /// `[modules.*]` entry. Configured commands replace built-ins.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::InvalidConfig`] for unknown stage names or
    /// empty commands.
    pub fn from_config(config: &CrackleConfig) -> Result<Self, CrackleError> {
        let mut modules = Self::builtin(config);
        for (stage, command) in config.command_modules()? {
            modules.register(CommandModule::new(stage, command));
        }
        Ok(modules)
    }

    /// Add a module, replacing and returning any previous module for its
    /// stage.
    pub fn register<M: EvaluationModule + 'static>(
        &mut self,
        module: M,
    ) -> Option<Box<dyn EvaluationModule>> {
        self.modules.insert(module.stage(), Box::new(module))
    }

    /// Builder form of [`ModuleSet::register`].
    #[must_use]
    pub fn with<M: EvaluationModule + 'static>(mut self, module: M) -> Self {
        self.register(module);
        self
    }

    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<&dyn EvaluationModule> {
        self.modules.get(&stage).map(|module| &**module)
    }

    /// First of `stages` with no registered module.
    #[must_use]
    pub fn missing(&self, stages: &[Stage]) -> Option<Stage> {
        stages
            .iter()
            .copied()
            .find(|stage| !self.modules.contains_key(stage))
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.modules.keys().copied()
    }
}

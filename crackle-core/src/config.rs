//! Run configuration.
//!
//! A [`CrackleConfig`] is usually read from a TOML file with
//! [`CrackleConfig::load_from`], then adjusted by command-line overrides and
//! checked with [`CrackleConfig::validate`]. Every section and field has a
//! default, so an empty file is a valid configuration.
//!
//! ```toml
//! [general]
//! optimisation = "high"
//!
//! [consensus]
//! n = 2
//! mm10db = true
//! chopchop = true
//! sgrnascorer2 = true
//!
//! [input]
//! files = ["genome.fa"]
//! batch_size = 5000000
//!
//! [output]
//! file = "guides.csv"
//!
//! [modules.secondary_structure]
//! command = ["fold-guides", "{input}"]
//! threshold = -30.0
//! accept = "at-least"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::{DEFAULT_AT_MAX, DEFAULT_AT_MIN, DEFAULT_BATCH_SIZE, DEFAULT_CONSENSUS_N};
use crate::types::{ConsensusModule, CrackleError, Stage};

/// How aggressively redundant evaluations are skipped.
///
/// Every level produces the same set of accepted guides; higher levels only
/// run fewer evaluations to get there.
///
/// # Examples
///
/// ```rust
/// use crackle_core::config::OptimisationLevel;
///
/// let level: OptimisationLevel = "medium".parse().unwrap();
/// assert_eq!(level, OptimisationLevel::Medium);
/// assert!(OptimisationLevel::High > OptimisationLevel::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimisationLevel {
    /// Run every stage on every guide
    UltraLow,
    /// Skip duplicated guides
    Low,
    /// Also short-circuit the mm10db family and hopeless specificity checks
    Medium,
    /// Also stop voting once consensus is decided either way
    #[default]
    High,
}

impl OptimisationLevel {
    pub const ALL: [Self; 4] = [Self::UltraLow, Self::Low, Self::Medium, Self::High];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UltraLow => "ultralow",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for OptimisationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimisationLevel {
    type Err = CrackleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CrackleError::InvalidConfig(format!(
                    "unknown optimisation level {s:?} (expected ultralow, low, medium or high)"
                ))
            })
    }
}

/// N-of-M voting rule.
///
/// A guide wins consensus when at least `n` of the participating modules
/// accept it. Modules that do not participate are not run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Minimum number of accepting modules
    pub n: usize,
    /// mm10db composite participates
    pub mm10db: bool,
    /// CHOPCHOP G20 participates
    pub chopchop: bool,
    /// sgRNAScorer2 classifier participates
    pub sgrnascorer2: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            n: DEFAULT_CONSENSUS_N,
            mm10db: true,
            chopchop: true,
            sgrnascorer2: true,
        }
    }
}

impl ConsensusConfig {
    #[must_use]
    pub const fn participates(&self, module: ConsensusModule) -> bool {
        match module {
            ConsensusModule::Mm10db => self.mm10db,
            ConsensusModule::Chopchop => self.chopchop,
            ConsensusModule::SgRnaScorer2 => self.sgrnascorer2,
        }
    }

    /// Number of modules configured to vote.
    #[must_use]
    pub fn tools_in_consensus(&self) -> usize {
        ConsensusModule::ALL
            .into_iter()
            .filter(|module| self.participates(*module))
            .count()
    }
}

/// `[general]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    pub optimisation: OptimisationLevel,
    /// Worker threads for evaluation; `None` uses every core
    pub threads: Option<usize>,
    /// Only report warnings and errors
    pub quiet: bool,
}

/// `[input]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// FASTA files or directories of FASTA files, processed in order
    pub files: Vec<PathBuf>,
    /// First-seen guides per spill file
    pub batch_size: usize,
    /// Parent directory for spill and scratch files; system temp if unset
    pub work_dir: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            work_dir: None,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Result file; stdout if unset
    pub file: Option<PathBuf>,
    /// Single ASCII field delimiter for batch and result files
    pub delimiter: char,
    /// Log file; stderr if unset
    pub log: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: None,
            delimiter: ',',
            log: None,
        }
    }
}

/// `[filters]` section: bounds for the built-in heuristics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub at_min: f64,
    pub at_max: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            at_min: DEFAULT_AT_MIN,
            at_max: DEFAULT_AT_MAX,
        }
    }
}

/// `[specificity]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecificityConfig {
    /// Run the alignment prefilter and off-target scoring stages
    pub enabled: bool,
}

impl Default for SpecificityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Direction in which a score passes its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AcceptWhen {
    /// `score >= threshold`
    #[default]
    AtLeast,
    /// `score <= threshold`
    AtMost,
}

/// Pass/fail cut applied to a numeric score.
///
/// # Examples
///
/// ```rust
/// use crackle_core::config::{AcceptWhen, Threshold};
///
/// let energy = Threshold { value: -30.0, accept: AcceptWhen::AtLeast };
/// assert!(energy.passes(-12.5));
/// assert!(!energy.passes(-31.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Threshold {
    pub value: f64,
    #[serde(default)]
    pub accept: AcceptWhen,
}

impl Threshold {
    #[must_use]
    pub fn passes(&self, score: f64) -> bool {
        match self.accept {
            AcceptWhen::AtLeast => score >= self.value,
            AcceptWhen::AtMost => score <= self.value,
        }
    }
}

/// `[modules.<stage>]` entry: an external program scoring guides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandConfig {
    /// Program and arguments; `{input}` and `{output}` are substituted
    pub command: Vec<String>,
    pub threshold: f64,
    #[serde(default)]
    pub accept: AcceptWhen,
}

impl CommandConfig {
    #[must_use]
    pub const fn threshold(&self) -> Threshold {
        Threshold {
            value: self.threshold,
            accept: self.accept,
        }
    }
}

/// Configuration settings for a guide discovery run.
///
/// # Examples
///
/// ```rust
/// use crackle_core::config::{CrackleConfig, OptimisationLevel};
///
/// let mut config = CrackleConfig::default();
/// config.general.optimisation = OptimisationLevel::Medium;
/// config.consensus.n = 1;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct CrackleConfig {
    pub general: GeneralConfig,
    pub consensus: ConsensusConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub filters: FilterConfig,
    pub specificity: SpecificityConfig,
    /// External command modules keyed by stage name
    pub modules: BTreeMap<String, CommandConfig>,
}

impl CrackleConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::ConfigParse`] for malformed TOML or unknown
    /// values.
    pub fn from_toml(text: &str) -> Result<Self, CrackleError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::Io`] when the file cannot be read and
    /// [`CrackleError::ConfigParse`] when it cannot be parsed.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, CrackleError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Check that the values are usable together.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), CrackleError> {
        let tools = self.consensus.tools_in_consensus();
        if tools == 0 {
            return Err(CrackleError::InvalidConfig(
                "at least one consensus module must participate".to_string(),
            ));
        }
        if self.consensus.n == 0 || self.consensus.n > tools {
            return Err(CrackleError::InvalidConfig(format!(
                "consensus n must be between 1 and {tools}, got {}",
                self.consensus.n
            )));
        }
        if self.input.batch_size == 0 {
            return Err(CrackleError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !self.output.delimiter.is_ascii() || matches!(self.output.delimiter, '"' | '\n' | '\r') {
            return Err(CrackleError::InvalidConfig(format!(
                "delimiter must be a single ASCII character other than a quote or line break, got {:?}",
                self.output.delimiter
            )));
        }
        if self.filters.at_min > self.filters.at_max {
            return Err(CrackleError::InvalidConfig(format!(
                "at_min ({}) exceeds at_max ({})",
                self.filters.at_min, self.filters.at_max
            )));
        }
        if self.general.threads == Some(0) {
            return Err(CrackleError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        self.command_modules()?;
        Ok(())
    }

    /// Field delimiter as a byte for the csv writers.
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        u8::try_from(u32::from(self.output.delimiter)).unwrap_or(b',')
    }

    /// Stages that run in this configuration, in execution order.
    #[must_use]
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| match stage.consensus_module() {
                Some(module) => self.consensus.participates(module),
                None => self.specificity.enabled,
            })
            .collect()
    }

    /// External command modules resolved to their stages.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::InvalidConfig`] for unknown stage names or
    /// empty commands.
    pub fn command_modules(&self) -> Result<Vec<(Stage, &CommandConfig)>, CrackleError> {
        self.modules
            .iter()
            .map(|(name, command)| {
                let stage = Stage::from_name(name).ok_or_else(|| {
                    CrackleError::InvalidConfig(format!("unknown module stage {name:?}"))
                })?;
                if command.command.is_empty() {
                    return Err(CrackleError::InvalidConfig(format!(
                        "module {name} has an empty command"
                    )));
                }
                Ok((stage, command))
            })
            .collect()
    }
}

//! # Crackle - consensus CRISPR guide discovery
//!
//! Crackle scans genomic sequences for candidate Cas9 guides (20-nt
//! protospacers followed by an `NGG` PAM), deduplicates them across the whole
//! input and accepts a guide only when at least `n` independent evaluation
//! methods agree it is a good target.
//!
//! ## Overview
//!
//! A run has two phases:
//!
//! 1. **Scan**: every input FASTA record is scanned on both strands. Each
//!    candidate is checked against a run-wide registry of packed guide keys
//!    and first sightings are spilled to bounded batch files on disk.
//! 2. **Evaluate**: batches are loaded back one at a time. Duplicated guides
//!    are flagged, every enabled stage is run over the batch in parallel and
//!    the resulting rows are written before the next batch is loaded.
//!
//! ## Features
//!
//! - **Consensus voting**: mm10db, CHOPCHOP and sgRNAScorer2 style modules
//!   vote, with an N-of-M acceptance rule
//! - **Optimisation levels**: four levels that skip evaluations which cannot
//!   change the result, all producing the same accepted set
//! - **Bounded memory**: full records only exist for the batch being
//!   evaluated
//! - **External tools**: any stage can be delegated to a command that reads
//!   guides from a file and prints scores
//! - **Parallel processing**: stage evaluation across threads with Rayon
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crackle_core::{CrackleConfig, CracklePipeline, ModuleSet};
//! use std::fs::File;
//!
//! let config = CrackleConfig::load_from("crackle.toml")?;
//! let modules = ModuleSet::from_config(&config)?;
//! let pipeline = CracklePipeline::new(config, modules)?;
//!
//! let report = pipeline.run(File::create("guides.csv")?)?;
//! println!("{} of {} guides accepted", report.accepted, report.evaluated);
//! # Ok::<(), crackle_core::types::CrackleError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: run configuration and TOML loading
//! - [`sequence`]: FASTA reading, candidate scanning and packed keys
//! - [`batch`]: dedup registry and disk-backed batch store
//! - [`guide`]: per-guide record and consensus arithmetic
//! - [`modules`]: evaluation module trait and built-in modules
//! - [`optimisation`]: skip rules per optimisation level
//! - [`engine`]: consensus engine and pipeline driver
//! - [`output`]: result table writer
//! - [`types`]: outcomes, stages and errors

pub mod batch;
pub mod config;
pub mod constants;
pub mod engine;
pub mod guide;
pub mod modules;
pub mod optimisation;
pub mod output;
pub mod sequence;
pub mod types;

pub use config::{CrackleConfig, OptimisationLevel};
pub use engine::{ConsensusEngine, CracklePipeline, RunReport, StageStats};
pub use guide::GuideRecord;
pub use modules::{EvaluationModule, ModuleSet};
pub use types::{CrackleError, ModuleError, Outcome, Stage, StageResult};

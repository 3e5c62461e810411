//! Consensus evaluation and the end-to-end pipeline.
//!
//! [`ConsensusEngine`] evaluates one batch of records stage by stage.
//! [`CracklePipeline`] drives a whole run: scanning every input into the
//! batch store, then replaying each batch through the engine and writing the
//! results.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{Dispatch, debug, info, info_span, warn};

use crate::batch::{BatchStore, DedupRegistry, Sighting};
use crate::config::CrackleConfig;
use crate::guide::GuideRecord;
use crate::modules::{BatchContext, EvaluationModule, ModuleSet};
use crate::optimisation::should_skip;
use crate::output::GuideWriter;
use crate::sequence::{PackedGuide, expand_inputs, open_fasta, scan_sequence};
use crate::types::{CrackleError, ModuleError, Stage, StageResult};

type ChunkResult = (usize, Result<StageResult, ModuleError>);

/// Work done by one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Records the module returned a result for
    pub evaluated: usize,
    /// Records the optimisation level skipped
    pub skipped: usize,
    /// Records the module failed on; these stay pending
    pub failed: usize,
}

impl StageStats {
    fn merge(&mut self, other: Self) {
        self.evaluated += other.evaluated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Per-stage counts for one evaluated batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub stage_stats: BTreeMap<Stage, StageStats>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Input files scanned
    pub files: usize,
    /// Candidate windows found, counting every occurrence
    pub candidates: usize,
    /// Distinct guides found more than once
    pub duplicates: usize,
    /// Batch files written
    pub batches: usize,
    /// Distinct guides evaluated and written
    pub evaluated: usize,
    /// Guides with a final accept
    pub accepted: usize,
    pub stage_stats: BTreeMap<Stage, StageStats>,
}

impl RunReport {
    fn absorb(&mut self, batch: BatchReport) {
        for (stage, stats) in batch.stage_stats {
            self.stage_stats.entry(stage).or_default().merge(stats);
        }
    }

    /// Failed evaluations over all stages.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.stage_stats.values().map(|s| s.failed).sum()
    }
}

/// Evaluates batches of records against the configured modules.
///
/// For each enabled stage in order the engine selects the records the
/// optimisation level does not skip, splits them into one contiguous chunk
/// per worker thread, lets every worker evaluate its chunk against a shared
/// read-only view of the batch and finally commits the returned results on
/// the calling thread.
pub struct ConsensusEngine<'a> {
    config: &'a CrackleConfig,
    modules: &'a ModuleSet,
}

impl<'a> ConsensusEngine<'a> {
    #[must_use]
    pub const fn new(config: &'a CrackleConfig, modules: &'a ModuleSet) -> Self {
        Self { config, modules }
    }

    /// Run every enabled stage over `records`.
    ///
    /// Stages without a registered module are left pending.
    pub fn evaluate_batch(&self, records: &mut [GuideRecord], ctx: &BatchContext<'_>) -> BatchReport {
        let mut report = BatchReport::default();
        for stage in self.config.enabled_stages() {
            let Some(module) = self.modules.get(stage) else {
                warn!("No module for stage {stage}, leaving it pending");
                continue;
            };
            let stats = self.evaluate_stage(module, records, ctx);
            debug!(
                "Stage {stage}: {} evaluated, {} skipped, {} failed",
                stats.evaluated, stats.skipped, stats.failed
            );
            report.stage_stats.insert(stage, stats);
        }
        report
    }

    fn evaluate_stage(
        &self,
        module: &dyn EvaluationModule,
        records: &mut [GuideRecord],
        ctx: &BatchContext<'_>,
    ) -> StageStats {
        let stage = module.stage();
        let level = self.config.general.optimisation;
        let consensus = &self.config.consensus;

        let selected: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !should_skip(record, stage, level, consensus))
            .map(|(i, _)| i)
            .collect();

        let mut stats = StageStats {
            skipped: records.len() - selected.len(),
            ..StageStats::default()
        };
        if selected.is_empty() {
            return stats;
        }

        let chunk_size = selected.len().div_ceil(rayon::current_num_threads()).max(1);
        let snapshot: &[GuideRecord] = records;
        let results: Vec<Vec<ChunkResult>> = selected
            .into_par_iter()
            .chunks(chunk_size)
            .map(|indices| -> Vec<ChunkResult> {
                let guides: Vec<&GuideRecord> = indices.iter().map(|&i| &snapshot[i]).collect();
                let outcomes = module.evaluate_batch(&guides, ctx);
                if outcomes.len() == indices.len() {
                    return indices.into_iter().zip(outcomes).collect();
                }
                // Results cannot be matched to guides, so none are kept
                let (expected, found) = (indices.len(), outcomes.len());
                indices
                    .into_iter()
                    .map(|i| (i, Err(ModuleError::CountMismatch { expected, found })))
                    .collect()
            })
            .collect();

        let mut first_error = None;
        for (i, result) in results.into_iter().flatten() {
            match result {
                Ok(result) => {
                    records[i].set_result(stage, result);
                    stats.evaluated += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            warn!(
                "Stage {stage} failed for {} guides in batch {}, left pending: {e}",
                stats.failed, ctx.batch_index
            );
        }
        stats
    }
}

/// End-to-end guide discovery run.
///
/// # Examples
///
/// ```rust
/// use crackle_core::config::CrackleConfig;
/// use crackle_core::engine::CracklePipeline;
/// use crackle_core::modules::ModuleSet;
///
/// let mut config = CrackleConfig::default();
/// config.consensus.mm10db = false;
/// config.consensus.sgrnascorer2 = false;
/// config.consensus.n = 1;
/// config.specificity.enabled = false;
///
/// let modules = ModuleSet::builtin(&config);
/// let pipeline = CracklePipeline::new(config, modules)?;
///
/// let mut output = Vec::new();
/// let report = pipeline.run(&mut output)?;
/// assert_eq!(report.candidates, 0);
/// assert!(String::from_utf8_lossy(&output).starts_with("seq,isUnique"));
/// # Ok::<(), crackle_core::types::CrackleError>(())
/// ```
pub struct CracklePipeline {
    config: CrackleConfig,
    modules: ModuleSet,
    pool: Option<rayon::ThreadPool>,
    log: Option<Dispatch>,
}

impl CracklePipeline {
    /// Validate `config` against `modules` and prepare a run.
    ///
    /// # Errors
    ///
    /// Returns [`CrackleError::InvalidConfig`] for inconsistent settings,
    /// [`CrackleError::MissingModule`] when an enabled stage has no module
    /// and [`CrackleError::ThreadPool`] when the worker pool cannot be built.
    pub fn new(config: CrackleConfig, modules: ModuleSet) -> Result<Self, CrackleError> {
        config.validate()?;
        if let Some(stage) = modules.missing(&config.enabled_stages()) {
            return Err(CrackleError::MissingModule(stage));
        }

        let pool = match config.general.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| CrackleError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            config,
            modules,
            pool,
            log: None,
        })
    }

    /// Send this pipeline's log events to `dispatch` for the duration of
    /// each run.
    #[must_use]
    pub fn with_log(mut self, dispatch: Dispatch) -> Self {
        self.log = Some(dispatch);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &CrackleConfig {
        &self.config
    }

    /// Scan all inputs, evaluate every distinct guide and write one row per
    /// guide to `writer`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable inputs, batch file errors and output write
    /// errors. Module failures are not errors; they are counted in the
    /// returned report.
    pub fn run<W: Write>(&self, writer: W) -> Result<RunReport, CrackleError> {
        match &self.log {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.run_inner(writer)),
            None => self.run_inner(writer),
        }
    }

    fn run_inner<W: Write>(&self, writer: W) -> Result<RunReport, CrackleError> {
        let span = info_span!("run", optimisation = %self.config.general.optimisation);
        let _guard = span.enter();
        let started = Instant::now();

        let files = expand_inputs(&self.config.input.files)?;
        let mut report = RunReport {
            files: files.len(),
            ..RunReport::default()
        };

        let mut registry = DedupRegistry::new();
        let mut store = BatchStore::new(
            self.config.input.work_dir.as_deref(),
            self.config.input.batch_size,
            self.config.delimiter(),
        )?;

        self.scan(&files, &mut registry, &mut store, &mut report)?;
        let batches = store.finish()?;
        report.batches = batches.len();
        report.duplicates = registry.duplicate_count();
        info!(
            "Found {} candidates, {} distinct, {} duplicated, in {} batches ({:.2?})",
            report.candidates,
            registry.distinct(),
            report.duplicates,
            report.batches,
            started.elapsed()
        );

        let mut output = GuideWriter::new(writer, self.config.delimiter());
        output.write_header()?;
        output.flush()?;

        let engine = ConsensusEngine::new(&self.config, &self.modules);
        for batch in &batches {
            let batch_started = Instant::now();
            let mut records = store.load(batch, &registry)?;
            info!(
                "Evaluating batch {}/{} ({} guides)",
                batch.index + 1,
                batches.len(),
                records.len()
            );

            let scratch = tempfile::Builder::new()
                .prefix("scratch_")
                .tempdir_in(store.path())?;
            let ctx = BatchContext {
                scratch_dir: scratch.path(),
                batch_index: batch.index,
            };
            let batch_report = match &self.pool {
                Some(pool) => pool.install(|| engine.evaluate_batch(&mut records, &ctx)),
                None => engine.evaluate_batch(&mut records, &ctx),
            };
            report.absorb(batch_report);

            for record in &records {
                output.write_record(record, &self.config)?;
                if record.final_accepted(&self.config) {
                    report.accepted += 1;
                }
            }
            output.flush()?;
            report.evaluated += records.len();
            info!(
                "Wrote batch {} in {:.2?}",
                batch.index + 1,
                batch_started.elapsed()
            );

            let scratch_path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                warn!("Could not remove scratch directory {}: {e}", scratch_path.display());
            }
        }

        info!(
            "Done: {} guides evaluated, {} accepted, {} failed evaluations in {:.2?}",
            report.evaluated,
            report.accepted,
            report.failures(),
            started.elapsed()
        );
        Ok(report)
    }

    fn scan(
        &self,
        files: &[PathBuf],
        registry: &mut DedupRegistry,
        store: &mut BatchStore,
        report: &mut RunReport,
    ) -> Result<(), CrackleError> {
        let total_bytes: u64 = files
            .iter()
            .map(|path| fs::metadata(path).map(|m| m.len()))
            .sum::<Result<u64, _>>()?;
        info!("Scanning {} files ({total_bytes} bytes)", files.len());

        let mut bytes_done = 0u64;
        for path in files {
            let file_bytes = fs::metadata(path)?.len();
            let before = report.candidates;
            for block in open_fasta(path)? {
                let block = block?;
                if !registry.should_scan(&block.header, !block.sequence.is_empty()) {
                    if !block.header.is_empty() {
                        debug!("Skipping repeated sequence {:?}", block.header);
                    }
                    continue;
                }
                for candidate in scan_sequence(&block.header, &block.sequence) {
                    report.candidates += 1;
                    let Some(key) = PackedGuide::from_bases(&candidate.sequence) else {
                        continue;
                    };
                    if registry.observe(key) == Sighting::First {
                        store.record(&candidate)?;
                    }
                }
            }
            bytes_done += file_bytes;
            info!(
                "Scanned {} ({bytes_done}/{total_bytes} bytes): {} candidates",
                path.display(),
                report.candidates - before
            );
        }
        Ok(())
    }
}

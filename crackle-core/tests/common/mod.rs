#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crackle_core::config::{CrackleConfig, OptimisationLevel};
use crackle_core::engine::{CracklePipeline, RunReport};
use crackle_core::guide::GuideRecord;
use crackle_core::modules::{EvaluationModule, ModuleSet};
use crackle_core::types::{ModuleError, Outcome, Stage, StageResult};

/// FNV-1a over the guide and a per-module salt.
pub fn fingerprint(sequence: &str, salt: u64) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ salt;
    for byte in sequence.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Deterministic stand-in for a real tool.
///
/// Accepts `accept_percent` of guides, and fails outright on one guide in
/// `fail_every` when set.
pub struct StubModule {
    pub stage: Stage,
    pub salt: u64,
    pub accept_percent: u64,
    pub fail_every: Option<u64>,
}

impl StubModule {
    pub fn new(stage: Stage, accept_percent: u64) -> Self {
        Self {
            stage,
            salt: stage as u64 * 7919,
            accept_percent,
            fail_every: None,
        }
    }

    pub fn flaky(stage: Stage, accept_percent: u64, fail_every: u64) -> Self {
        Self {
            fail_every: Some(fail_every),
            ..Self::new(stage, accept_percent)
        }
    }
}

impl EvaluationModule for StubModule {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let hash = fingerprint(&guide.sequence, self.salt);
        if let Some(every) = self.fail_every {
            if (hash >> 32) % every == 0 {
                return Err(ModuleError::Tool {
                    module: "stub",
                    message: format!("refused {}", guide.sequence),
                });
            }
        }
        let score = (hash % 100) as f64;
        let outcome = Outcome::from_pass(hash % 100 < self.accept_percent);
        Ok(StageResult::scored(outcome, score))
    }
}

/// Built-ins plus stubs for every stage that needs an external tool.
pub fn stub_modules(config: &CrackleConfig, flaky: bool) -> ModuleSet {
    let stub = |stage, percent| {
        if flaky {
            StubModule::flaky(stage, percent, 11)
        } else {
            StubModule::new(stage, percent)
        }
    };
    ModuleSet::builtin(config)
        .with(stub(Stage::SecondaryStructure, 80))
        .with(stub(Stage::SgRnaScorer2, 50))
        .with(stub(Stage::Bowtie, 70))
        .with(stub(Stage::OffTarget, 60))
}

/// Deterministic pseudo-random DNA.
pub fn random_dna(seed: u64, len: usize) -> String {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ['A', 'C', 'G', 'T'][(state >> 62) as usize]
        })
        .collect()
}

pub fn revcomp(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'C' => 'G',
            'G' => 'C',
            'T' => 'A',
            other => other,
        })
        .collect()
}

pub fn write_fasta(dir: &Path, name: &str, records: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut text = String::new();
    for (header, sequence) in records {
        text.push('>');
        text.push_str(header);
        text.push('\n');
        for line in sequence.as_bytes().chunks(60) {
            text.push_str(std::str::from_utf8(line).unwrap());
            text.push('\n');
        }
    }
    fs::write(&path, text).unwrap();
    path
}

/// One parsed output row keyed by column name.
pub type Row = BTreeMap<String, String>;

pub fn parse_rows(output: &str) -> Vec<Row> {
    let mut lines = output.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    lines
        .map(|line| {
            header
                .iter()
                .zip(line.split(','))
                .map(|(k, v)| ((*k).to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

pub fn run(config: CrackleConfig, modules: ModuleSet) -> (RunReport, String) {
    let pipeline = CracklePipeline::new(config, modules).unwrap();
    let mut out = Vec::new();
    let report = pipeline.run(&mut out).unwrap();
    (report, String::from_utf8(out).unwrap())
}

pub fn config_for(files: Vec<PathBuf>, level: OptimisationLevel, n: usize) -> CrackleConfig {
    let mut config = CrackleConfig::default();
    config.input.files = files;
    config.input.batch_size = 64;
    config.general.optimisation = level;
    config.consensus.n = n;
    config
}

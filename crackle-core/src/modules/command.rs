use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{CommandConfig, Threshold};
use crate::constants::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::guide::GuideRecord;
use crate::modules::{BatchContext, EvaluationModule};
use crate::types::{ModuleError, Outcome, Stage, StageResult};

/// Runs an external program over a chunk of guides.
///
/// The chunk is written one guide per line to a scratch file. Each argument
/// of the configured command has `{input}` replaced by that file's path and
/// `{output}` by the path of a second scratch file. The program must produce
/// one numeric score per guide, in input order, either into `{output}` when
/// that placeholder is used or on stdout otherwise. Blank lines are ignored.
///
/// A non-zero exit status, a wrong number of scores or an unparseable score
/// fails every guide of the chunk.
///
/// # Examples
///
/// ```rust,no_run
/// use crackle_core::config::CommandConfig;
/// use crackle_core::modules::CommandModule;
/// use crackle_core::types::Stage;
///
/// let config = CommandConfig {
///     command: vec!["fold-guides".into(), "--in".into(), "{input}".into()],
///     threshold: -30.0,
///     accept: Default::default(),
/// };
/// let module = CommandModule::new(Stage::SecondaryStructure, &config);
/// ```
#[derive(Debug, Clone)]
pub struct CommandModule {
    stage: Stage,
    command: Vec<String>,
    threshold: Threshold,
}

impl CommandModule {
    #[must_use]
    pub fn new(stage: Stage, config: &CommandConfig) -> Self {
        Self {
            stage,
            command: config.command.clone(),
            threshold: config.threshold(),
        }
    }

    fn uses_output_file(&self) -> bool {
        self.command.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER))
    }

    fn scratch_file(&self, dir: &Path, role: &str) -> Result<NamedTempFile, ModuleError> {
        Ok(tempfile::Builder::new()
            .prefix(&format!("{}_{role}_", self.stage.name()))
            .suffix(".txt")
            .tempfile_in(dir)?)
    }

    /// Run the program once and return its scores in input order.
    fn scores(&self, guides: &[&GuideRecord], scratch_dir: &Path) -> Result<Vec<f64>, ModuleError> {
        let (program, args) = self.command.split_first().ok_or_else(|| ModuleError::Tool {
            module: self.stage.name(),
            message: "empty command".to_string(),
        })?;

        let mut input = self.scratch_file(scratch_dir, "in")?;
        {
            let mut writer = BufWriter::new(input.as_file_mut());
            for guide in guides {
                writeln!(writer, "{}", guide.sequence)?;
            }
            writer.flush()?;
        }

        let output = if self.uses_output_file() {
            Some(self.scratch_file(scratch_dir, "out")?)
        } else {
            None
        };

        let input_path = input.path().to_string_lossy().into_owned();
        let output_path = output
            .as_ref()
            .map(|file| file.path().to_string_lossy().into_owned())
            .unwrap_or_default();
        let args: Vec<String> = args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input_path)
                    .replace(OUTPUT_PLACEHOLDER, &output_path)
            })
            .collect();

        debug!(
            "Running {} over {} guides: {program} {}",
            self.stage,
            guides.len(),
            args.join(" ")
        );
        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ModuleError::Tool {
                module: self.stage.name(),
                message: format!("{program} exited with {}: {}", result.status, stderr.trim()),
            });
        }

        let text = match &output {
            Some(file) => fs::read_to_string(file.path())?,
            None => String::from_utf8_lossy(&result.stdout).into_owned(),
        };
        let scores = parse_scores(&text)?;
        if scores.len() != guides.len() {
            return Err(ModuleError::CountMismatch {
                expected: guides.len(),
                found: scores.len(),
            });
        }
        Ok(scores)
    }
}

/// One score per non-blank line.
fn parse_scores(text: &str) -> Result<Vec<f64>, ModuleError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.trim().parse::<f64>().map_err(|_| ModuleError::Malformed {
                line: i + 1,
                content: line.to_string(),
            })
        })
        .collect()
}

impl EvaluationModule for CommandModule {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn evaluate(&self, guide: &GuideRecord) -> Result<StageResult, ModuleError> {
        let scratch = tempfile::tempdir()?;
        let ctx = BatchContext {
            scratch_dir: scratch.path(),
            batch_index: 0,
        };
        self.evaluate_batch(&[guide], &ctx)
            .pop()
            .unwrap_or(Err(ModuleError::CountMismatch {
                expected: 1,
                found: 0,
            }))
    }

    fn evaluate_batch(
        &self,
        guides: &[&GuideRecord],
        ctx: &BatchContext<'_>,
    ) -> Vec<Result<StageResult, ModuleError>> {
        if guides.is_empty() {
            return Vec::new();
        }
        match self.scores(guides, ctx.scratch_dir) {
            Ok(scores) => scores
                .into_iter()
                .map(|score| {
                    let outcome = Outcome::from_pass(self.threshold.passes(score));
                    Ok(StageResult::scored(outcome, score))
                })
                .collect(),
            Err(e) => {
                let message = e.to_string();
                guides
                    .iter()
                    .map(|_| {
                        Err(ModuleError::Tool {
                            module: self.stage.name(),
                            message: message.clone(),
                        })
                    })
                    .collect()
            }
        }
    }
}

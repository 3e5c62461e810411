//! # Crackle CLI - Consensus CRISPR Guide Discovery
//!
//! A command-line interface for the Crackle guide discovery pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Run with everything taken from the configuration file
//! crackle -c crackle.toml
//!
//! # Override inputs and output
//! crackle -c crackle.toml -i chr1.fa chr2.fa -o guides.csv
//!
//! # Require all three consensus modules, with no skipping
//! crackle -c crackle.toml -n 3 -O ultralow
//! ```
//!
//! ## Options
//!
//! - `-c, --config <FILE>`: TOML configuration file (required)
//! - `-i, --input <FILE>...`: FASTA files or directories, replacing `input.files`
//! - `-o, --output <FILE>`: Result file (default: `output.file`, else stdout)
//! - `-O, --optimisation <LEVEL>`: ultralow, low, medium or high
//! - `-n, --consensus <N>`: Modules that must accept a guide
//! - `-b, --batch-size <N>`: Distinct guides per batch file
//! - `-q, --quiet`: Only log warnings and errors
//!
//! Log output goes to stderr, or to `output.log` when configured. `RUST_LOG`
//! overrides the default `crackle=info` filter.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use crackle_core::config::OptimisationLevel;
use crackle_core::*;
use tracing::{Dispatch, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;

fn cli() -> Command {
    Command::new("crackle")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Consensus CRISPR guide discovery")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..)
                .action(ArgAction::Append)
                .help("FASTA files or directories (replaces input.files)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Result file (default: output.file, else stdout)"),
        )
        .arg(
            Arg::new("optimisation")
                .short('O')
                .long("optimisation")
                .value_name("LEVEL")
                .value_parser(["ultralow", "low", "medium", "high"])
                .help("Optimisation level"),
        )
        .arg(
            Arg::new("consensus")
                .short('n')
                .long("consensus")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Consensus modules that must accept a guide"),
        )
        .arg(
            Arg::new("batch-size")
                .short('b')
                .long("batch-size")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Distinct guides per batch file"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only log warnings and errors"),
        )
}

/// Load the configuration file and apply command-line overrides.
fn load_config(matches: &ArgMatches) -> Result<CrackleConfig, CrackleError> {
    let path = matches
        .get_one::<PathBuf>("config")
        .ok_or_else(|| CrackleError::InvalidConfig("no configuration file".to_string()))?;
    let mut config = CrackleConfig::load_from(path)?;

    if let Some(inputs) = matches.get_many::<PathBuf>("input") {
        config.input.files = inputs.cloned().collect();
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.output.file = Some(output.clone());
    }
    if let Some(level) = matches.get_one::<String>("optimisation") {
        config.general.optimisation = level.parse::<OptimisationLevel>()?;
    }
    if let Some(&n) = matches.get_one::<usize>("consensus") {
        config.consensus.n = n;
    }
    if let Some(&batch_size) = matches.get_one::<usize>("batch-size") {
        config.input.batch_size = batch_size;
    }
    if matches.get_flag("quiet") {
        config.general.quiet = true;
    }

    config.validate()?;
    Ok(config)
}

/// Build the log collaborator handed to the pipeline.
fn log_dispatch(config: &CrackleConfig) -> Result<Dispatch, CrackleError> {
    let default_filter = if config.general.quiet {
        "crackle=warn"
    } else {
        "crackle=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let layer = match &config.output.log {
        Some(path) => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(BoxMakeWriter::new(Mutex::new(File::create(path)?))),
        None => tracing_subscriber::fmt::layer().with_writer(BoxMakeWriter::new(io::stderr)),
    };

    Ok(Dispatch::new(
        tracing_subscriber::registry().with(filter).with(layer),
    ))
}

fn run(matches: &ArgMatches) -> Result<(), CrackleError> {
    let config = load_config(matches)?;
    let modules = ModuleSet::from_config(&config)?;
    let pipeline = CracklePipeline::new(config, modules)?;

    // Nothing is created on disk until the run is known to be valid
    let dispatch = log_dispatch(pipeline.config())?;
    let writer: Box<dyn Write> = match &pipeline.config().output.file {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let pipeline = pipeline.with_log(dispatch.clone());

    let result = pipeline.run(writer);
    tracing::dispatcher::with_default(&dispatch, || match &result {
        Ok(report) => info!(
            "Analysis complete! {} of {} guides accepted from {} files",
            report.accepted, report.evaluated, report.files
        ),
        Err(e) => error!("Run failed: {e}"),
    });
    result.map(|_| ())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

mod common;

use std::collections::{BTreeMap, BTreeSet};

use crackle_core::config::{CrackleConfig, OptimisationLevel};
use crackle_core::engine::CracklePipeline;
use crackle_core::modules::ModuleSet;
use crackle_core::output::GUIDE_COLUMNS;
use crackle_core::types::{CrackleError, Stage};
use tempfile::TempDir;

use crate::common::{
    Row, StubModule, config_for, parse_rows, random_dna, revcomp, run, stub_modules, write_fasta,
};

/// Two files of random sequence with forward, cross-file and
/// reverse-complement repeats planted in them.
fn genome(dir: &TempDir) -> Vec<std::path::PathBuf> {
    let shared = "ACGTTGCAACGTAGCATGCAAGG";
    let flipped = "GATCGATCCAGTGGCATGACTGG";
    let chr1 = format!("{}{shared}{}{flipped}", random_dna(1, 900), random_dna(2, 600));
    let chr2 = format!("{}{}", random_dna(3, 1200), revcomp(flipped));
    let plasmid = format!("{}{shared}", random_dna(4, 500));

    vec![
        write_fasta(dir.path(), "a.fa", &[("chr1", &chr1), ("chr2", &chr2)]),
        write_fasta(dir.path(), "b.fa", &[("plasmid", &plasmid)]),
    ]
}

fn accepted(rows: &[Row]) -> BTreeSet<String> {
    rows.iter()
        .filter(|row| row["finalAccepted"] == "1")
        .map(|row| row["seq"].clone())
        .collect()
}

fn run_rows(config: CrackleConfig, flaky: bool) -> Vec<Row> {
    let modules = stub_modules(&config, flaky);
    let (_, output) = run(config, modules);
    parse_rows(&output)
}

#[test]
fn test_accepted_set_independent_of_optimisation_level() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);

    for n in 1..=3 {
        let baseline = accepted(&run_rows(
            config_for(files.clone(), OptimisationLevel::UltraLow, n),
            false,
        ));
        for level in OptimisationLevel::ALL {
            let rows = run_rows(config_for(files.clone(), level, n), false);
            assert_eq!(accepted(&rows), baseline, "level {level}, n = {n}");
        }
        if n == 1 {
            assert!(!baseline.is_empty());
        }
    }
}

#[test]
fn test_invariance_with_failing_modules() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);

    for n in 1..=3 {
        let baseline = accepted(&run_rows(
            config_for(files.clone(), OptimisationLevel::UltraLow, n),
            true,
        ));
        for level in OptimisationLevel::ALL {
            let rows = run_rows(config_for(files.clone(), level, n), true);
            assert_eq!(accepted(&rows), baseline, "level {level}, n = {n}");
        }
    }
}

#[test]
fn test_invariance_with_partial_consensus() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);

    for (mm10db, chopchop, sgrnascorer2) in [(false, true, true), (true, false, true), (true, true, false)] {
        for n in 1..=2 {
            let make = |level| {
                let mut config = config_for(files.clone(), level, n);
                config.consensus.mm10db = mm10db;
                config.consensus.chopchop = chopchop;
                config.consensus.sgrnascorer2 = sgrnascorer2;
                config
            };
            let baseline = accepted(&run_rows(make(OptimisationLevel::UltraLow), false));
            for level in OptimisationLevel::ALL {
                assert_eq!(accepted(&run_rows(make(level), false)), baseline);
            }
        }
    }
}

#[test]
fn test_higher_levels_do_less_work() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);

    let mut evaluations = BTreeMap::new();
    for level in OptimisationLevel::ALL {
        let config = config_for(files.clone(), level, 2);
        let modules = stub_modules(&config, false);
        let (report, _) = run(config, modules);
        let total: usize = report.stage_stats.values().map(|s| s.evaluated).sum();
        evaluations.insert(level, total);
    }
    let counts: Vec<usize> = OptimisationLevel::ALL
        .iter()
        .map(|level| evaluations[level])
        .collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");
    assert!(counts[0] > counts[3]);
}

#[test]
fn test_every_row_has_every_column() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);
    let config = config_for(files, OptimisationLevel::High, 2);
    let modules = stub_modules(&config, false);
    let (report, output) = run(config, modules);

    let mut lines = output.lines();
    assert_eq!(lines.next().unwrap(), GUIDE_COLUMNS.join(","));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), report.evaluated);
    assert!(report.batches > 1);
    assert!(
        rows.iter()
            .all(|row| row.split(',').count() == GUIDE_COLUMNS.len())
    );
}

#[test]
fn test_consensus_count_matches_votes() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);

    for level in OptimisationLevel::ALL {
        let mut config = config_for(files.clone(), level, 2);
        config.specificity.enabled = false;
        let rows = run_rows(config, false);
        for row in &rows {
            let votes = ["acceptedByMm10db", "passedG20", "acceptedBySgRnaScorer"]
                .iter()
                .filter(|column| row[**column] == "1")
                .count();
            assert_eq!(row["consensusCount"], votes.to_string());
            let expected = row["isUnique"] == "1" && votes >= 2;
            assert_eq!(row["finalAccepted"] == "1", expected, "{row:?}");
        }
    }
}

#[test]
fn test_dedup_across_files_and_strands() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);
    let rows = run_rows(config_for(files, OptimisationLevel::UltraLow, 1), false);

    let by_seq: BTreeMap<&str, &Row> = rows.iter().map(|row| (row["seq"].as_str(), row)).collect();
    assert_eq!(by_seq.len(), rows.len(), "one row per distinct guide");

    for planted in ["ACGTTGCAACGTAGCATGCAAGG", "GATCGATCCAGTGGCATGACTGG"] {
        let row = by_seq[planted];
        assert_eq!(row["isUnique"], "0");
        for column in ["header", "start", "end", "strand"] {
            assert_eq!(row[column], "-");
        }
        assert_eq!(row["finalAccepted"], "0");
    }
}

#[test]
fn test_single_motif_window_accepted() {
    let dir = TempDir::new().unwrap();
    let file = write_fasta(dir.path(), "one.fa", &[("seq1", "AACGTACGTACGTACGTACGTGGACGT")]);

    let mut config = config_for(vec![file], OptimisationLevel::UltraLow, 1);
    config.consensus.mm10db = false;
    config.consensus.sgrnascorer2 = false;
    config.specificity.enabled = false;
    let modules = ModuleSet::new().with(StubModule::new(Stage::Chopchop, 100));
    let (report, output) = run(config, modules);

    let rows = parse_rows(&output);
    assert_eq!(report.candidates, 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["seq"], "AACGTACGTACGTACGTACGTGG");
    assert_eq!(rows[0]["isUnique"], "1");
    assert_eq!(rows[0]["header"], "seq1");
    assert_eq!(rows[0]["start"], "0");
    assert_eq!(rows[0]["end"], "23");
    assert_eq!(rows[0]["strand"], "+");
    assert_eq!(rows[0]["consensusCount"], "1");
    assert_eq!(rows[0]["finalAccepted"], "1");
}

#[test]
fn test_shared_guide_in_two_sequences_is_ambiguous() {
    let guide = "AACGTACGTACGTACGTACGTGG";
    let first = format!("{guide}A");
    let second = format!("T{guide}");
    let orders = [
        [("first", first.as_str()), ("second", second.as_str())],
        [("second", second.as_str()), ("first", first.as_str())],
    ];

    for records in orders {
        let dir = TempDir::new().unwrap();
        let file = write_fasta(dir.path(), "pair.fa", &records);
        let mut config = config_for(vec![file], OptimisationLevel::UltraLow, 1);
        config.consensus.mm10db = false;
        config.consensus.sgrnascorer2 = false;
        config.specificity.enabled = false;
        let modules = ModuleSet::new().with(StubModule::new(Stage::Chopchop, 100));
        let (report, output) = run(config, modules);

        let rows = parse_rows(&output);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["seq"], guide);
        assert_eq!(rows[0]["isUnique"], "0");
        for column in ["header", "start", "end", "strand"] {
            assert_eq!(rows[0][column], "-");
        }
        assert_eq!(rows[0]["finalAccepted"], "0");
    }
}

#[test]
fn test_repeated_header_scanned_once() {
    let dir = TempDir::new().unwrap();
    let file = write_fasta(
        dir.path(),
        "repeat.fa",
        &[
            ("seq1", "AACGTACGTACGTACGTACGTGGACGT"),
            ("seq1", "AACGTACGTACGTACGTACGTGGACGT"),
        ],
    );
    let mut config = config_for(vec![file], OptimisationLevel::UltraLow, 1);
    config.consensus.mm10db = false;
    config.consensus.sgrnascorer2 = false;
    config.specificity.enabled = false;
    let modules = ModuleSet::new().with(StubModule::new(Stage::Chopchop, 100));
    let (report, output) = run(config, modules);

    assert_eq!(report.candidates, 1);
    let rows = parse_rows(&output);
    assert_eq!(rows[0]["isUnique"], "1");
}

#[test]
fn test_empty_input_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let file = write_fasta(dir.path(), "empty.fa", &[]);
    let config = config_for(vec![file], OptimisationLevel::High, 2);
    let modules = stub_modules(&config, false);
    let (report, output) = run(config, modules);

    assert_eq!(report.candidates, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(output, format!("{}\n", GUIDE_COLUMNS.join(",")));
}

#[test]
fn test_failed_stage_reported_and_left_pending() {
    let dir = TempDir::new().unwrap();
    let file = write_fasta(dir.path(), "one.fa", &[("seq1", &random_dna(9, 2000))]);
    let mut config = config_for(vec![file], OptimisationLevel::UltraLow, 1);
    config.consensus.mm10db = false;
    config.consensus.sgrnascorer2 = false;
    config.specificity.enabled = false;
    let modules = ModuleSet::new().with(StubModule::flaky(Stage::Chopchop, 100, 1));
    let (report, output) = run(config, modules);

    let rows = parse_rows(&output);
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row["passedG20"] == "?"));
    assert!(rows.iter().all(|row| row["finalAccepted"] == "0"));
    assert_eq!(report.stage_stats[&Stage::Chopchop].failed, rows.len());
    assert_eq!(report.accepted, 0);
}

#[test]
fn test_unwritable_work_area_is_fatal() {
    let dir = TempDir::new().unwrap();
    let files = genome(&dir);
    let blocker = dir.path().join("not_a_directory");
    std::fs::write(&blocker, "").unwrap();

    let mut config = config_for(files, OptimisationLevel::UltraLow, 2);
    config.input.work_dir = Some(blocker);
    let modules = stub_modules(&config, false);
    let pipeline = CracklePipeline::new(config, modules).unwrap();

    let mut output = Vec::new();
    let result = pipeline.run(&mut output);
    assert!(matches!(
        result,
        Err(CrackleError::Io(_) | CrackleError::Batch { .. })
    ));
    assert!(output.is_empty());
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Path of a fixture under `tests/data`.
pub fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

/// The crackle binary with a clean logging environment.
pub fn crackle() -> Command {
    let mut cmd = Command::cargo_bin("crackle").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Runs crackle on the golden fixtures and returns the result table.
pub fn run_crackle(output_file: &Path, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let mut cmd = crackle();
    cmd.arg("-c")
        .arg(data("golden.toml"))
        .arg("-i")
        .arg(data("guides.fa"))
        .arg("-o")
        .arg(output_file)
        .args(args);

    cmd.assert().success();
    Ok(fs::read_to_string(output_file)?)
}

/// Write `text` as a configuration file inside `dir`.
pub fn write_config(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("crackle.toml");
    fs::write(&path, text).unwrap();
    path
}

/// Values of one named column, in row order.
pub fn column(table: &str, name: &str) -> Vec<String> {
    let mut lines = table.lines();
    let header = lines.next().unwrap_or_default();
    let index = header
        .split(',')
        .position(|column| column == name)
        .unwrap_or_else(|| panic!("no column {name}"));
    lines
        .map(|line| line.split(',').nth(index).unwrap().to_string())
        .collect()
}

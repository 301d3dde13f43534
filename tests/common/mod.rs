//! Shared test helpers for integration tests
//!
//! This module provides common utilities used across all test files.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Helper to get an spcs command, isolated from the caller's config and env
pub fn spcs() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("spcs"));
    cmd.env_remove("SPCS_SEED")
        .env_remove("SPCS_TARGET_CPK")
        .env_remove("SPCS_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to run spcs inside a scratch directory with its own config home
pub fn spcs_in(tmp: &TempDir) -> Command {
    let mut cmd = spcs();
    cmd.current_dir(tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path().join(".config"))
        .env("HOME", tmp.path());
    cmd
}

/// Write a project config with a small attempt budget and a fixed seed
pub fn write_quick_config(tmp: &TempDir, seed: u64) {
    fs::write(
        tmp.path().join("spcs.yaml"),
        format!(
            "standard_attempts: 2000\nreference_attempts: 2000\nseed: {}\n",
            seed
        ),
    )
    .unwrap();
}

/// Parse a headerless CSV matrix written by the tool
pub fn read_csv_matrix(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split(',').map(|v| v.trim().parse::<f64>().unwrap()).collect())
        .collect()
}

/// Write a 5×25 CSV matrix
pub fn write_csv_matrix(path: &Path, matrix: &[Vec<f64>]) {
    let text: String = matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| format!("{:.3}", v))
                .collect::<Vec<_>>()
                .join(",")
                + "\n"
        })
        .collect();
    fs::write(path, text).unwrap();
}

/// True when `value` is a whole multiple of `step`
pub fn is_multiple_of(value: f64, step: f64) -> bool {
    let ratio = value / step;
    (ratio - ratio.round()).abs() < 1e-6
}

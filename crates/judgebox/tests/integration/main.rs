//! Integration tests for judgebox
//!
//! The end-to-end tests need docker and the sandbox image.
//! Run with: cargo test -p judgebox --features integration-tests
//!
//! Tests that start containers are marked `#[ignore]`. To include them:
//!    cargo test -p judgebox --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;
use std::path::PathBuf;

use judgebox::{Config, DirectoryStore, DockerBackend, Problem, TestRunner};

mod config_loading;
mod end_to_end;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

pub(crate) fn fixture_problem(name: &str) -> Problem {
    let path = format!("{FIXTURES_PATH}/problems/{name}");
    Problem::from_file(&path).unwrap_or_else(|e| panic!("Failed to load problem {path}: {e}"))
}

/// A runner against the real docker CLI, with workspaces under `job_root`
///
/// The sandbox image can be overridden with `JUDGEBOX_SANDBOX_IMAGE`.
pub(crate) fn docker_runner(job_root: PathBuf) -> TestRunner<DockerBackend, DirectoryStore> {
    let mut config = Config::load(None).expect("Failed to load config");
    config.job_root = job_root;
    let backend = DockerBackend::from_config(&config);
    let store = DirectoryStore::new(format!("{FIXTURES_PATH}/storage"));
    TestRunner::new(config, backend, store)
}

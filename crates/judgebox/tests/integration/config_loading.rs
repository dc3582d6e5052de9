use judgebox::config::Config;
use judgebox::{Language, SubmissionType};

use super::{FIXTURES_PATH, fixture_problem};

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.sandbox_image, "noj4-sandbox:test");
    assert_eq!(config.container_prefix, "judgebox-ci");
    assert_eq!(config.max_parallel_cases, 2);
    assert_eq!(config.template_bucket, "templates");
    assert_eq!(config.archive.max_uncompressed_bytes, 1_048_576);
    assert!(!config.archive.allow_symlinks);
    assert!(config.archive.check_dangerous_files);

    // Partial sections layer over built-in defaults
    let compile = config.compile_limits(false);
    assert_eq!(compile.timeout_ms, Some(45_000));
    assert_eq!(compile.pids_limit, Some(512));

    let run = config.run_limits(None);
    assert_eq!(run.time_limit_ms, Some(2000));
    assert_eq!(run.memory_limit_kb, Some(131_072));
    assert_eq!(run.container_memory_mb, Some(128));
    assert_eq!(run.timeout_ms, Some(10_000));
}

#[test]
fn test_load_invalid_relative_mount() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_relative_mount.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_invalid_zero_parallel() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_parallel.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_config() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_problems() {
    let sum = fixture_problem("sum.toml");
    assert_eq!(sum.submission_type, SubmissionType::SingleFile);
    assert_eq!(sum.samples.len(), 2);
    assert!(!sum.allows(Language::Java));

    let function = fixture_problem("add_function.toml");
    assert_eq!(function.submission_type, SubmissionType::FunctionOnly);
    assert_eq!(function.template_key.as_deref(), Some("add-function/main.c"));

    let multi = fixture_problem("sum_multi.toml");
    assert_eq!(multi.submission_type, SubmissionType::MultiFile);
    assert_eq!(multi.build_file_key.as_deref(), Some("sum-multi/Makefile"));
}

use std::io::{Cursor, Write};

use judgebox::{CompileStatus, Language, MaterializeError, TestRunError, Verdict};
use zip::write::{SimpleFileOptions, ZipWriter};

use super::{docker_runner, fixture_problem, fixture_source};

fn assert_no_workspaces(root: &tempfile::TempDir) {
    let leftover: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert!(leftover.is_empty(), "workspace left behind: {leftover:?}");
}

fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_sum_cpp_accepted() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());

    let report = runner
        .test_code(
            &fixture_problem("sum.toml"),
            Language::Cpp,
            &fixture_source("sum.cpp"),
            None,
        )
        .await
        .expect("Test run failed");

    assert_eq!(report.compile_status, CompileStatus::Ready);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].name, "Sample 1");
    assert_eq!(report.results[0].stdout.as_deref(), Some("7\n"));
    assert!(report.all_accepted());
    assert_no_workspaces(&root);
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_sum_python_custom_input() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());

    let report = runner
        .test_code(
            &fixture_problem("sum.toml"),
            Language::Python,
            &fixture_source("sum.py"),
            Some("40 2\n"),
        )
        .await
        .expect("Test run failed");

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.name, "Custom Input");
    assert_eq!(result.status, Verdict::Accepted);
    assert_eq!(result.stdout.as_deref(), Some("42\n"));
    assert_eq!(result.passed, None);
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_infinite_loop_time_limit() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());

    let report = runner
        .test_code(
            &fixture_problem("sum.toml"),
            Language::Cpp,
            &fixture_source("infinite_loop.cpp"),
            None,
        )
        .await
        .expect("Test run failed");

    for result in &report.results {
        assert_eq!(result.status, Verdict::TimeLimitExceeded);
        assert_eq!(result.passed, None);
    }
    assert_no_workspaces(&root);
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_compile_error() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());

    let report = runner
        .test_code(
            &fixture_problem("sum.toml"),
            Language::Cpp,
            &fixture_source("compile_error.cpp"),
            None,
        )
        .await
        .expect("Test run failed");

    assert_eq!(report.compile_status, CompileStatus::CompileError);
    assert!(report.compile_log.is_some());
    assert!(report.results.is_empty());
    assert_no_workspaces(&root);
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_function_template() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());

    let report = runner
        .test_code(
            &fixture_problem("add_function.toml"),
            Language::C,
            &fixture_source("add_function.c"),
            None,
        )
        .await
        .expect("Test run failed");

    assert!(report.all_accepted());
}

#[tokio::test]
#[ignore = "requires docker and the sandbox image"]
async fn test_archive_with_instructor_makefile() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());
    let archive = zip_of(&[
        (
            "main.c",
            "#include <stdio.h>\nint add(int, int);\nint main(void){int a,b;scanf(\"%d %d\",&a,&b);printf(\"%d\\n\",add(a,b));return 0;}\n",
        ),
        ("add.c", "int add(int a, int b) { return a + b; }\n"),
    ]);

    let report = runner
        .test_archive(&fixture_problem("sum_multi.toml"), Language::C, &archive, None)
        .await
        .expect("Test run failed");

    assert_eq!(report.compile_status, CompileStatus::Ready);
    assert!(report.all_accepted());
    assert_no_workspaces(&root);
}

#[tokio::test]
async fn test_traversal_archive_rejected_without_docker() {
    let root = tempfile::tempdir().unwrap();
    let runner = docker_runner(root.path().to_path_buf());
    let archive = zip_of(&[("../../etc/passwd", "root::0:0::/:/bin/sh\n")]);

    let result = runner
        .test_archive(&fixture_problem("sum_multi.toml"), Language::C, &archive, None)
        .await;

    assert!(matches!(
        result,
        Err(TestRunError::Materialize(
            MaterializeError::UnsafeArchiveEntry(_)
        ))
    ));
    assert_no_workspaces(&root);
}

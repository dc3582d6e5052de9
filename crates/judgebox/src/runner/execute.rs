//! Test case execution
//!
//! Runs the built program once per test case, each in its own container,
//! and turns what came back into a [`TestResult`].

use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, instrument};

use crate::config::{Config, Language};
use crate::runner::classify::{Classification, classify_exit};
use crate::runner::compare::outputs_match;
use crate::sandbox::{SandboxBackend, SandboxInvocation, SandboxMode};
use crate::types::{ResourceLimits, TestCase, TestResult, Verdict};
use crate::workspace::JobWorkspace;

/// Run every case against the built program
///
/// Up to `config.max_parallel_cases` cases are in flight at once. Results
/// come back in input order regardless of completion order.
pub async fn run_all<B>(
    backend: &B,
    config: &Config,
    workspace: &JobWorkspace,
    language: Language,
    limits: &ResourceLimits,
    cases: &[TestCase],
) -> Vec<TestResult>
where
    B: SandboxBackend + ?Sized,
{
    stream::iter(cases.iter().enumerate())
        .map(|(index, case)| run_case(backend, config, workspace, language, limits, index, case))
        .buffered(config.max_parallel_cases.max(1))
        .collect()
        .await
}

/// Run a single test case
#[instrument(skip(backend, config, workspace, limits, case), fields(id = %workspace.id(), case = %case.name))]
pub async fn run_case<B>(
    backend: &B,
    config: &Config,
    workspace: &JobWorkspace,
    language: Language,
    limits: &ResourceLimits,
    index: usize,
    case: &TestCase,
) -> TestResult
where
    B: SandboxBackend + ?Sized,
{
    let stdout_file = format!("case-{index}-stdout.txt");
    let stderr_file = format!("case-{index}-stderr.txt");
    let timeout = limits.wall_ceiling(config.run_overhead_ms);

    let invocation = SandboxInvocation::new(
        SandboxMode::Run,
        language,
        workspace.root(),
        format!(
            "{}-run-{}-{index}",
            config.container_prefix,
            workspace.id()
        ),
    )
    .limits(limits.clone())
    .timeout(timeout)
    .stdin(case.input.as_bytes())
    .output_files(&stdout_file, &stderr_file);

    let started = Instant::now();
    let outcome = backend.run(&invocation).await;
    let time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let output = match outcome {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "run invocation failed");
            return judge_error(case, e.to_string(), time_ms);
        }
    };

    let captured = async {
        let stdout = workspace.read_output(&stdout_file).await?;
        let stderr = workspace.read_output(&stderr_file).await?;
        Ok::<_, crate::workspace::WorkspaceError>((stdout, stderr))
    };
    let (stdout, stderr) = match captured.await {
        Ok(captured) => captured,
        Err(e) => {
            error!(error = %e, "failed to read captured output");
            return judge_error(case, e.to_string(), time_ms);
        }
    };

    let classification = if output.timed_out {
        Classification::Verdict(Verdict::TimeLimitExceeded)
    } else {
        classify_exit(output.exit_code, &stderr)
    };
    let (status, passed) = judge(classification, &stdout, case.expected_output.as_deref());

    debug!(exit_code = output.exit_code, %status, time_ms, "case finished");

    TestResult {
        name: case.name.clone(),
        status,
        stdout: Some(stdout),
        stderr: Some(stderr),
        time_ms,
        passed,
    }
}

/// Decide the verdict for a classified run
///
/// Output is compared only when the run exited cleanly and an expected
/// output exists; `passed` stays unset otherwise.
pub fn judge(
    classification: Classification,
    stdout: &str,
    expected: Option<&str>,
) -> (Verdict, Option<bool>) {
    match (classification, expected) {
        (Classification::Verdict(verdict), _) => (verdict, None),
        (Classification::Ready, None) => (Verdict::Accepted, None),
        (Classification::Ready, Some(expected)) => {
            if outputs_match(stdout, expected) {
                (Verdict::Accepted, Some(true))
            } else {
                (Verdict::WrongAnswer, Some(false))
            }
        }
    }
}

fn judge_error(case: &TestCase, message: String, time_ms: u64) -> TestResult {
    TestResult {
        name: case.name.clone(),
        status: Verdict::JudgeError,
        stdout: None,
        stderr: Some(message),
        time_ms,
        passed: None,
    }
}

//! Test runner for judgebox
//!
//! Sequences one ad-hoc test run: allocate a workspace, materialize the
//! submission, compile it, run each test case, and report. The workspace is
//! removed on every exit path.

use std::borrow::Cow;

use thiserror::Error;
use tracing::{debug, info, instrument};

pub use crate::runner::classify::{
    Classification, EXIT_CPU_TIME_EXCEEDED, EXIT_FILE_SIZE_EXCEEDED, EXIT_KILLED, classify_exit,
};
pub use crate::runner::compare::{normalize_output, outputs_match};
pub use crate::runner::compile::{CompileOutcome, compile};
pub use crate::runner::execute::{judge, run_all, run_case};

pub mod classify;
pub mod compare;
mod compile;
mod execute;
#[cfg(test)]
pub(crate) mod testing;

use crate::config::{Config, Language};
use crate::problem::{Problem, SubmissionType};
use crate::sandbox::SandboxBackend;
use crate::storage::{ObjectStore, StorageError};
use crate::types::{CodeTestReport, CompileStatus, TestCase};
use crate::workspace::{
    JobWorkspace, MaterializeError, WorkspaceError, merge_template, require_entry_point,
};

/// Errors that end a test run before a report exists
#[derive(Debug, Error)]
pub enum TestRunError {
    #[error("language {0} is not allowed for this problem")]
    LanguageNotAllowed(Language),

    #[error("problem {problem} takes {submission_type:?} submissions")]
    SubmissionTypeMismatch {
        problem: String,
        submission_type: SubmissionType,
    },

    #[error("function-only problem {0} has no template")]
    MissingTemplate(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("materialization failed: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What gets materialized into `src/`
#[derive(Debug, Clone, Copy)]
enum Submission<'a> {
    Source(&'a str),
    Archive {
        bytes: &'a [u8],
        build_file: Option<&'a [u8]>,
    },
}

/// Entry point for ad-hoc test runs
///
/// Holds no per-run state, so one runner serves any number of concurrent
/// runs; each run owns its own workspace and containers.
#[derive(Debug)]
pub struct TestRunner<B, S> {
    config: Config,
    backend: B,
    store: S,
}

impl<B, S> TestRunner<B, S>
where
    B: SandboxBackend,
    S: ObjectStore,
{
    pub fn new(config: Config, backend: B, store: S) -> Self {
        Self {
            config,
            backend,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Test a single source file against the problem's samples
    ///
    /// Function-only problems merge the source into the problem template
    /// first. Multi-file problems accept a single file too.
    #[instrument(skip(self, problem, source, custom_input), fields(problem = %problem.id))]
    pub async fn test_code(
        &self,
        problem: &Problem,
        language: Language,
        source: &str,
        custom_input: Option<&str>,
    ) -> Result<CodeTestReport, TestRunError> {
        check_language(problem, language)?;
        let cases = problem.test_cases(custom_input);

        let source = match problem.submission_type {
            SubmissionType::SingleFile | SubmissionType::MultiFile => Cow::Borrowed(source),
            SubmissionType::FunctionOnly => {
                let key = problem
                    .template_key
                    .as_deref()
                    .ok_or_else(|| TestRunError::MissingTemplate(problem.id.clone()))?;
                let template = self
                    .store
                    .get_object_string(&self.config.template_bucket, key)
                    .await?;
                Cow::Owned(merge_template(&template, source))
            }
        };

        self.orchestrate(problem, language, Submission::Source(&source), &cases)
            .await
    }

    /// Test a ZIP archive against a multi-file problem's samples
    ///
    /// The problem's Makefile, if any, replaces one bundled in the archive.
    #[instrument(skip(self, problem, archive, custom_input), fields(problem = %problem.id, len = archive.len()))]
    pub async fn test_archive(
        &self,
        problem: &Problem,
        language: Language,
        archive: &[u8],
        custom_input: Option<&str>,
    ) -> Result<CodeTestReport, TestRunError> {
        check_language(problem, language)?;
        if problem.submission_type != SubmissionType::MultiFile {
            return Err(TestRunError::SubmissionTypeMismatch {
                problem: problem.id.clone(),
                submission_type: problem.submission_type,
            });
        }
        let cases = problem.test_cases(custom_input);

        let build_file = match problem.build_file_key.as_deref() {
            Some(key) => Some(
                self.store
                    .get_object(&self.config.build_file_bucket, key)
                    .await?,
            ),
            None => None,
        };

        let submission = Submission::Archive {
            bytes: archive,
            build_file: build_file.as_deref(),
        };
        self.orchestrate(problem, language, submission, &cases).await
    }

    /// Run the pipeline inside a fresh workspace and always remove it
    async fn orchestrate(
        &self,
        problem: &Problem,
        language: Language,
        submission: Submission<'_>,
        cases: &[TestCase],
    ) -> Result<CodeTestReport, TestRunError> {
        let workspace = JobWorkspace::create(&self.config.job_root).await?;
        let result = self
            .run_in(&workspace, problem, language, submission, cases)
            .await;
        workspace.destroy().await;
        result
    }

    async fn run_in(
        &self,
        workspace: &JobWorkspace,
        problem: &Problem,
        language: Language,
        submission: Submission<'_>,
        cases: &[TestCase],
    ) -> Result<CodeTestReport, TestRunError> {
        match submission {
            Submission::Source(source) => {
                workspace.write_source(language, source).await?;
            }
            Submission::Archive { bytes, build_file } => {
                let names = workspace.extract_archive(bytes, &self.config.archive).await?;
                if let Some(contents) = build_file {
                    workspace.write_build_file(contents).await?;
                }
                if !workspace.has_build_file().await? {
                    require_entry_point(&names, language)?;
                }
            }
        }

        let log = match compile(&self.backend, &self.config, workspace, language).await {
            CompileOutcome::Ready { log } => log,
            CompileOutcome::Failed { status, log } => {
                info!(?status, "compile stage did not produce a program");
                return Ok(CodeTestReport {
                    compile_status: status,
                    compile_log: non_empty(log),
                    results: Vec::new(),
                });
            }
        };

        let limits = self.config.run_limits(Some(&problem.limits()));
        let results = run_all(
            &self.backend,
            &self.config,
            workspace,
            language,
            &limits,
            cases,
        )
        .await;

        debug!(cases = results.len(), "test run complete");

        Ok(CodeTestReport {
            compile_status: CompileStatus::Ready,
            compile_log: non_empty(log),
            results,
        })
    }
}

fn check_language(problem: &Problem, language: Language) -> Result<(), TestRunError> {
    if problem.allows(language) {
        Ok(())
    } else {
        Err(TestRunError::LanguageNotAllowed(language))
    }
}

fn non_empty(log: String) -> Option<String> {
    if log.is_empty() { None } else { Some(log) }
}

//! Compilation step
//!
//! Builds the materialized source in a sandbox container. A Makefile in
//! `src/` switches the build to `compile-make` with a longer ceiling.

use tracing::{debug, error, instrument};

use crate::config::{Config, Language};
use crate::sandbox::{SandboxBackend, SandboxInvocation, SandboxMode};
use crate::types::CompileStatus;
use crate::workspace::JobWorkspace;

/// Result of the compile stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Build succeeded; the log is informational
    Ready { log: String },
    /// Build did not produce a runnable program
    Failed { status: CompileStatus, log: String },
}

impl CompileOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, CompileOutcome::Ready { .. })
    }

    /// Status as reported to the caller
    pub fn status(&self) -> CompileStatus {
        match self {
            CompileOutcome::Ready { .. } => CompileStatus::Ready,
            CompileOutcome::Failed { status, .. } => *status,
        }
    }

    pub fn log(&self) -> &str {
        match self {
            CompileOutcome::Ready { log } | CompileOutcome::Failed { log, .. } => log,
        }
    }

    fn judge_error(log: impl Into<String>) -> Self {
        CompileOutcome::Failed {
            status: CompileStatus::JudgeError,
            log: log.into(),
        }
    }
}

/// Compile the workspace's source for `language`
#[instrument(skip(backend, config, workspace), fields(id = %workspace.id()))]
pub async fn compile<B>(
    backend: &B,
    config: &Config,
    workspace: &JobWorkspace,
    language: Language,
) -> CompileOutcome
where
    B: SandboxBackend + ?Sized,
{
    let with_build_file = match workspace.has_build_file().await {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "failed to inspect source directory");
            return CompileOutcome::judge_error(e.to_string());
        }
    };

    let mode = if with_build_file {
        SandboxMode::CompileMake
    } else {
        SandboxMode::Compile
    };
    let limits = config.compile_limits(with_build_file);
    let timeout = limits.wall_ceiling(0);

    let invocation = SandboxInvocation::new(
        mode,
        language,
        workspace.root(),
        format!("{}-compile-{}", config.container_prefix, workspace.id()),
    )
    .limits(limits)
    .timeout(timeout);

    debug!(?mode, ?timeout, "compiling");

    let output = match backend.run(&invocation).await {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "compile invocation failed");
            return CompileOutcome::judge_error(e.to_string());
        }
    };

    if output.timed_out {
        return CompileOutcome::Failed {
            status: CompileStatus::CompileError,
            log: format!("compilation timed out after {} ms", timeout.as_millis()),
        };
    }

    let log = compile_log(&output.stdout, &output.stderr);
    debug!(exit_code = output.exit_code, "compile finished");

    if output.exit_code == 0 {
        CompileOutcome::Ready { log }
    } else {
        CompileOutcome::Failed {
            status: CompileStatus::CompileError,
            log,
        }
    }
}

/// Join captured compiler output into one log
fn compile_log(stdout: &str, stderr: &str) -> String {
    format!("{stdout}\n{stderr}").trim().to_string()
}

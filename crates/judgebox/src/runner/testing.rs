//! Scripted sandbox backend for exercising the runner without docker

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::sandbox::{ProcessOutput, SandboxBackend, SandboxError, SandboxInvocation, SandboxMode};

/// What the fake sandbox does for one invocation
#[derive(Debug, Clone, Default)]
pub(crate) struct Step {
    exit_code: i32,
    /// Written to the invocation's stdout capture file
    program_stdout: String,
    /// Written to the invocation's stderr capture file
    program_stderr: String,
    /// Returned as the client's own output (the compile log)
    log_stdout: String,
    log_stderr: String,
    timed_out: bool,
    delay: Duration,
}

impl Step {
    pub(crate) fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    pub(crate) fn ok() -> Self {
        Self::exit(0)
    }

    pub(crate) fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }

    pub(crate) fn stdout(mut self, text: impl Into<String>) -> Self {
        self.program_stdout = text.into();
        self
    }

    pub(crate) fn stderr(mut self, text: impl Into<String>) -> Self {
        self.program_stderr = text.into();
        self
    }

    pub(crate) fn log(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.log_stdout = stdout.into();
        self.log_stderr = stderr.into();
        self
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Script = dyn Fn(&SandboxInvocation) -> Result<Step, SandboxError> + Send + Sync;

/// Backend that answers every invocation from a script and records it
pub(crate) struct ScriptedBackend {
    script: Box<Script>,
    calls: Mutex<Vec<SandboxInvocation>>,
}

impl ScriptedBackend {
    pub(crate) fn new(
        script: impl Fn(&SandboxInvocation) -> Result<Step, SandboxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Compiles succeed; runs read two integers and print their sum
    pub(crate) fn adder() -> Self {
        Self::new(|invocation| {
            if invocation.mode != SandboxMode::Run {
                return Ok(Step::ok());
            }
            let input = String::from_utf8_lossy(invocation.stdin.as_deref().unwrap_or_default());
            let sum: i64 = input
                .split_whitespace()
                .filter_map(|token| token.parse::<i64>().ok())
                .sum();
            Ok(Step::ok().stdout(format!("{sum}\n")))
        })
    }

    pub(crate) fn calls(&self) -> Vec<SandboxInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, mode: SandboxMode) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.mode == mode)
            .count()
    }
}

#[async_trait]
impl SandboxBackend for ScriptedBackend {
    async fn run(&self, invocation: &SandboxInvocation) -> Result<ProcessOutput, SandboxError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let step = (self.script)(invocation)?;

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }

        let out_dir = invocation.job_dir().join("out");
        if let Some(ref file) = invocation.stdout_file {
            tokio::fs::write(out_dir.join(file), &step.program_stdout).await?;
        }
        if let Some(ref file) = invocation.stderr_file {
            tokio::fs::write(out_dir.join(file), &step.program_stderr).await?;
        }

        if step.timed_out {
            return Ok(ProcessOutput::timed_out());
        }
        Ok(ProcessOutput::exited(
            step.exit_code,
            step.log_stdout,
            step.log_stderr,
        ))
    }
}

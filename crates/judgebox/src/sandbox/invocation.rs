use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Language;
use crate::types::ResourceLimits;

/// What the sandbox image is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    /// Compile the single source file in `src/`
    Compile,
    /// Build `src/` with its Makefile
    CompileMake,
    /// Run the built program once
    Run,
}

impl SandboxMode {
    /// Sub-command understood by the sandbox image
    pub fn as_arg(self) -> &'static str {
        match self {
            SandboxMode::Compile => "compile",
            SandboxMode::CompileMake => "compile-make",
            SandboxMode::Run => "run",
        }
    }
}

/// Container hardening switches
///
/// All enabled by default; there is no reason to relax them for untrusted
/// code, but keeping them explicit makes the command builder testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
    /// `--network none`
    pub network_disabled: bool,
    /// `--read-only`
    pub read_only_root: bool,
    /// `--cap-drop ALL`
    pub drop_all_capabilities: bool,
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        Self {
            network_disabled: true,
            read_only_root: true,
            drop_all_capabilities: true,
        }
    }
}

/// One container run, built fresh for every compile or test case
#[derive(Debug, Clone)]
pub struct SandboxInvocation {
    pub mode: SandboxMode,
    pub language: Language,
    /// Unique container name
    pub container_name: String,
    /// Host directory bind-mounted read-write into the container
    pub job_dir: PathBuf,
    pub limits: ResourceLimits,
    /// Outer ceiling after which the container is forcibly removed
    pub timeout: Duration,
    pub policy: IsolationPolicy,
    /// Data piped to the program's stdin
    pub stdin: Option<Vec<u8>>,
    /// File name under `out/` receiving the program's stdout
    pub stdout_file: Option<String>,
    /// File name under `out/` receiving the program's stderr
    pub stderr_file: Option<String>,
}

impl SandboxInvocation {
    /// Create an invocation with locked-down isolation and no I/O
    pub fn new(
        mode: SandboxMode,
        language: Language,
        job_dir: impl Into<PathBuf>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            language,
            container_name: container_name.into(),
            job_dir: job_dir.into(),
            limits: ResourceLimits::new(),
            timeout: Duration::from_secs(10),
            policy: IsolationPolicy::default(),
            stdin: None,
            stdout_file: None,
            stderr_file: None,
        }
    }

    /// Set resource limits
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the outer wall-clock ceiling
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set data for the program's stdin
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Set the capture files under `out/`
    pub fn output_files(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout_file = Some(stdout.into());
        self.stderr_file = Some(stderr.into());
        self
    }

    /// Get the host directory mounted into the container
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }
}

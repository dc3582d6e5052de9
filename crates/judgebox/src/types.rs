use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resource ceilings for one sandbox invocation
///
/// Every field is optional so that a partial set (from a config section or a
/// problem declaration) can be layered over a base with [`with_overrides`].
///
/// [`with_overrides`]: ResourceLimits::with_overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Execution time limit passed to the sandbox image, in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Memory limit passed to the sandbox image, in kilobytes
    #[serde(default)]
    pub memory_limit_kb: Option<u64>,

    /// Host-side container memory ceiling, in megabytes
    #[serde(default)]
    pub container_memory_mb: Option<u64>,

    /// Outer wall-clock ceiling for the whole container run, in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of processes inside the container
    #[serde(default)]
    pub pids_limit: Option<u32>,
}

impl ResourceLimits {
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;

    /// Create resource limits with every field unset
    pub fn new() -> Self {
        Self {
            time_limit_ms: None,
            memory_limit_kb: None,
            container_memory_mb: None,
            timeout_ms: None,
            pids_limit: None,
        }
    }

    /// Set the sandbox execution time limit in milliseconds
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Set the sandbox memory limit in kilobytes
    pub fn with_memory_limit_kb(mut self, kb: u64) -> Self {
        self.memory_limit_kb = Some(kb);
        self
    }

    /// Set the container memory ceiling in megabytes
    pub fn with_container_memory_mb(mut self, mb: u64) -> Self {
        self.container_memory_mb = Some(mb);
        self
    }

    /// Set the outer wall-clock ceiling in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the process-count limit
    pub fn with_pids_limit(mut self, count: u32) -> Self {
        self.pids_limit = Some(count);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            time_limit_ms: overrides.time_limit_ms.or(self.time_limit_ms),
            memory_limit_kb: overrides.memory_limit_kb.or(self.memory_limit_kb),
            container_memory_mb: overrides.container_memory_mb.or(self.container_memory_mb),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            pids_limit: overrides.pids_limit.or(self.pids_limit),
        }
    }

    /// Outer ceiling for the invocation
    ///
    /// Never shorter than the declared time limit plus `overhead_ms`, so a
    /// problem declaring a long limit is not cut off by the configured
    /// ceiling.
    pub fn wall_ceiling(&self, overhead_ms: u64) -> Duration {
        let configured = self.timeout_ms.unwrap_or(0);
        let declared = self
            .time_limit_ms
            .map(|ms| ms.saturating_add(overhead_ms))
            .unwrap_or(0);
        Duration::from_millis(configured.max(declared))
    }

    /// Raise the container memory ceiling to fit the sandbox memory limit
    ///
    /// The container ends up at least `headroom_mb` above the declared
    /// limit, so docker's OOM killer never fires before the sandbox does.
    pub fn with_container_headroom(mut self, headroom_mb: u64) -> Self {
        if let (Some(kb), Some(container)) = (self.memory_limit_kb, self.container_memory_mb) {
            let floor = kb.div_ceil(Self::MB).saturating_add(headroom_mb);
            self.container_memory_mb = Some(container.max(floor));
        }
        self
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(5000),
            memory_limit_kb: Some(262144), // 256 MB
            container_memory_mb: Some(256),
            timeout_ms: Some(10000),
            pids_limit: Some(512),
        }
    }
}

/// Judging verdict for one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AC")]
    Accepted,

    #[serde(rename = "WA")]
    WrongAnswer,

    #[serde(rename = "TLE")]
    TimeLimitExceeded,

    #[serde(rename = "MLE")]
    MemoryLimitExceeded,

    #[serde(rename = "OLE")]
    OutputLimitExceeded,

    #[serde(rename = "RE")]
    RuntimeError,

    #[serde(rename = "CE")]
    CompileError,

    /// Infrastructure failure, not attributable to the submitted code
    #[serde(rename = "JUDGE_ERROR")]
    JudgeError,
}

impl Verdict {
    /// Short code as shown to users (e.g., "TLE")
    pub fn code(self) -> &'static str {
        match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer => "WA",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::MemoryLimitExceeded => "MLE",
            Verdict::OutputLimitExceeded => "OLE",
            Verdict::RuntimeError => "RE",
            Verdict::CompileError => "CE",
            Verdict::JudgeError => "JUDGE_ERROR",
        }
    }

    /// Check if this verdict was caused by the judging infrastructure
    #[must_use]
    pub fn is_infrastructure(self) -> bool {
        matches!(self, Verdict::JudgeError)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of the compile stage as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileStatus {
    /// Build succeeded; test cases were run
    #[serde(rename = "READY")]
    Ready,

    #[serde(rename = "CE")]
    CompileError,

    #[serde(rename = "JUDGE_ERROR")]
    JudgeError,
}

/// One input to feed the compiled program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected_output: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }
}

/// Result of running one test case
///
/// `passed` is only set when an expected output existed and the program
/// exited cleanly; otherwise `status` alone carries the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub status: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// Caller-facing report of a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeTestReport {
    pub compile_status: CompileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_log: Option<String>,
    pub results: Vec<TestResult>,
}

impl CodeTestReport {
    /// Check if the build succeeded and every case was accepted
    #[must_use]
    pub fn all_accepted(&self) -> bool {
        self.compile_status == CompileStatus::Ready
            && self
                .results
                .iter()
                .all(|result| result.status == Verdict::Accepted)
    }
}

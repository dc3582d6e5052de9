use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{LANGUAGES, Language, LanguageSpec};
use crate::types::ResourceLimits;
use crate::workspace::ArchivePolicy;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../judgebox.example.toml");

/// Prefix for environment variable overrides (e.g., `JUDGEBOX_SANDBOX_IMAGE`)
pub const ENV_PREFIX: &str = "JUDGEBOX";

/// Container memory kept above a problem's declared memory limit, in megabytes
pub const CONTAINER_MEMORY_HEADROOM_MB: u64 = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for judgebox
///
/// Read once at startup and treated as immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the docker binary (uses PATH if not specified).
    #[serde(default)]
    pub docker_path: Option<PathBuf>,

    /// Sandbox image that compiles and runs submissions
    #[serde(default = "default_sandbox_image")]
    pub sandbox_image: String,

    /// Directory under which per-job workspaces are created
    #[serde(default = "default_job_root")]
    pub job_root: PathBuf,

    /// Prefix for container names (`<prefix>-compile-<job>`, `<prefix>-run-<job>-<n>`)
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,

    /// Where the job workspace is bind-mounted inside the container
    #[serde(default = "default_mount_point")]
    pub mount_point: String,

    /// Number of test cases of one submission that may run at once.
    ///
    /// `1` runs cases strictly one after another.
    #[serde(default = "default_max_parallel_cases")]
    pub max_parallel_cases: usize,

    /// Object-storage bucket holding function-mode templates
    #[serde(default = "default_template_bucket")]
    pub template_bucket: String,

    /// Object-storage bucket holding instructor-provided build files
    #[serde(default = "default_build_file_bucket")]
    pub build_file_bucket: String,

    /// Overrides for plain compilation limits
    #[serde(default)]
    pub compile: Option<ResourceLimits>,

    /// Overrides for build-file compilation limits
    #[serde(default)]
    pub compile_make: Option<ResourceLimits>,

    /// Default limits for running a test case.
    /// Problem-declared limits override these.
    #[serde(default)]
    pub run: ResourceLimits,

    /// Headroom added to a declared time limit when deriving the outer ceiling
    #[serde(default = "default_run_overhead_ms")]
    pub run_overhead_ms: u64,

    /// Archive extraction policy for multi-file submissions
    #[serde(default)]
    pub archive: ArchivePolicy,
}

impl Config {
    /// Create a new config from the embedded defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the path to the docker binary
    pub fn docker_binary(&self) -> PathBuf {
        self.docker_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("docker"))
    }

    /// Effective compile limits: built-in base, then config overrides
    pub fn compile_limits(&self, with_build_file: bool) -> ResourceLimits {
        let (base, overrides) = if with_build_file {
            (default_compile_make_limits(), self.compile_make.as_ref())
        } else {
            (default_compile_limits(), self.compile.as_ref())
        };
        match overrides {
            Some(limits) => base.with_overrides(limits),
            None => base,
        }
    }

    /// Effective run limits: built-in defaults, config, then problem overrides
    ///
    /// A problem declaring its own memory limit also lifts the container
    /// ceiling so the declared limit is the one that applies.
    pub fn run_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        let limits = ResourceLimits::default().with_overrides(&self.run);
        match overrides {
            Some(problem) if problem.memory_limit_kb.is_some() => limits
                .with_overrides(problem)
                .with_container_headroom(CONTAINER_MEMORY_HEADROOM_MB),
            Some(problem) => limits.with_overrides(problem),
            None => limits,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

/// Default plain compilation limits
fn default_compile_limits() -> ResourceLimits {
    ResourceLimits {
        timeout_ms: Some(30_000),
        pids_limit: Some(512),
        ..ResourceLimits::new()
    }
}

/// Default build-file compilation limits (build systems need more headroom)
fn default_compile_make_limits() -> ResourceLimits {
    ResourceLimits {
        timeout_ms: Some(60_000),
        pids_limit: Some(512),
        ..ResourceLimits::new()
    }
}

fn default_sandbox_image() -> String {
    "noj4-sandbox:0.1".to_string()
}

fn default_job_root() -> PathBuf {
    std::env::temp_dir().join("judgebox-jobs")
}

fn default_container_prefix() -> String {
    "judgebox-test".to_string()
}

fn default_mount_point() -> String {
    "/work".to_string()
}

fn default_max_parallel_cases() -> usize {
    1
}

fn default_template_bucket() -> String {
    "noj-templates".to_string()
}

fn default_build_file_bucket() -> String {
    "noj-makefiles".to_string()
}

fn default_run_overhead_ms() -> u64 {
    2000
}

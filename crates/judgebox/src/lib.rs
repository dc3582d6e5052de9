//! A library for judging untrusted code submissions.
//!
//! Judgebox compiles student-submitted source and runs it against test
//! cases, each step in its own disposable, locked-down docker container.
//! Every run owns a fresh on-disk workspace that is removed when the run
//! ends, whatever the outcome.
//!
//! # Features
//!
//! - **Disposable sandboxes**: no network, read-only root, no capabilities, capped processes.
//! - **Submission shapes**: single files, function bodies merged into templates, and ZIP archives built with a Makefile.
//! - **Hardened extraction**: traversal, symlink and size checks before anything is written.
//! - **Verdicts**: AC, WA, TLE, MLE, OLE, RE, CE and JUDGE_ERROR from exit status and stderr.
//! - **TOML configuration**: layered with `JUDGEBOX_*` environment overrides.
//!
//! # Example
//!
//! ```no_run
//! use judgebox::{Config, DockerBackend, DirectoryStore, Language, Problem, TestRunner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let backend = DockerBackend::from_config(&config);
//! let runner = TestRunner::new(config, backend, DirectoryStore::new("/srv/objects"));
//!
//! let problem = Problem::new("sum").with_sample("3 4", "7");
//! let source = "#include <cstdio>\nint main(){int a,b;scanf(\"%d%d\",&a,&b);printf(\"%d\\n\",a+b);}";
//! let report = runner.test_code(&problem, Language::Cpp, source, None).await?;
//! assert!(report.all_accepted());
//! # Ok(())
//! # }
//! ```

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, LANGUAGES, Language, LanguageSpec};
pub use problem::{Problem, SampleCase, SubmissionType};
pub use runner::{CompileOutcome, TestRunError, TestRunner};
pub use sandbox::{
    DockerBackend, IsolationPolicy, ProcessOutput, SandboxBackend, SandboxError,
    SandboxInvocation, SandboxMode,
};
pub use storage::{DirectoryStore, MemoryStore, ObjectStore, StorageError};
pub use types::{CodeTestReport, CompileStatus, ResourceLimits, TestCase, TestResult, Verdict};
pub use workspace::{ArchivePolicy, JobWorkspace, MaterializeError, WorkspaceError};

pub mod config;
pub mod problem;
pub mod runner;
pub mod sandbox;
pub mod storage;
pub mod types;
pub mod workspace;

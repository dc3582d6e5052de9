//! Sandbox container invocation
//!
//! Every compile and every test case runs in its own disposable container:
//! network disabled, read-only root filesystem, all capabilities dropped,
//! process count capped, and the job workspace bind-mounted as the only
//! writable location. The container is always started with `--rm`.
//!
//! The image is an opaque dependency invoked as
//! `{compile|compile-make|run} <LANGUAGE> [run options]`; its exit codes
//! are interpreted by [`crate::runner::classify`].

use thiserror::Error;

pub use crate::sandbox::command::{DockerAction, DockerCommand};
pub use crate::sandbox::deadline::{Completion, with_deadline};
pub use crate::sandbox::invocation::{IsolationPolicy, SandboxInvocation, SandboxMode};
pub use crate::sandbox::process::{DockerBackend, ProcessOutput, SandboxBackend};

mod command;
mod deadline;
mod invocation;
mod process;

/// Errors raised by the invocation layer itself, as opposed to failures of
/// the sandboxed program
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn sandbox process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("sandbox command failed: {0}")]
    CommandFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

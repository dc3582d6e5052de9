//! Process spawning for sandbox containers
//!
//! Runs the docker CLI and captures its output.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::sandbox::SandboxError;
use crate::sandbox::command::{DockerAction, DockerCommand};
use crate::sandbox::deadline::{Completion, with_deadline};
use crate::sandbox::invocation::SandboxInvocation;

/// What came back from one container run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code of the container client; 128 + signal if it was killed
    pub exit_code: i32,
    /// Output of the client itself, not the captured program output
    pub stdout: String,
    pub stderr: String,
    /// The outer ceiling passed and the container was removed
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Output of a run that exited on its own
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// Output of a run abandoned at the outer ceiling
    pub fn timed_out() -> Self {
        Self {
            exit_code: -1,
            timed_out: true,
            ..Default::default()
        }
    }

    /// Check whether the run exited cleanly
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Something that can execute a [`SandboxInvocation`]
///
/// [`DockerBackend`] is the production implementation; tests substitute
/// scripted backends.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Run one container to completion or to its outer ceiling
    ///
    /// Returns `Err` only when the container could not be started or
    /// waited on. A non-zero exit or a timeout is a normal `Ok`.
    async fn run(&self, invocation: &SandboxInvocation) -> Result<ProcessOutput, SandboxError>;
}

/// Runs invocations through the docker CLI
#[derive(Debug, Clone)]
pub struct DockerBackend {
    docker_path: PathBuf,
    image: String,
    mount_point: String,
}

impl DockerBackend {
    pub fn new(
        docker_path: impl Into<PathBuf>,
        image: impl Into<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        Self {
            docker_path: docker_path.into(),
            image: image.into(),
            mount_point: mount_point.into(),
        }
    }

    /// Create a backend from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.docker_binary(),
            &config.sandbox_image,
            &config.mount_point,
        )
    }

    /// Get the sandbox image
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Force-remove a container that outlived its ceiling
    ///
    /// Killing the CLI client does not stop the container, so this goes
    /// through the daemon. Failures are logged only.
    async fn force_remove(docker_path: PathBuf, container_name: String) {
        let args = DockerCommand::new(docker_path, &container_name)
            .action(DockerAction::Remove)
            .build();
        debug!(?args, "removing timed-out container");

        let status = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(container = %container_name, %status, "container removal failed"),
            Err(e) => warn!(container = %container_name, error = %e, "container removal failed"),
        }
    }
}

#[async_trait]
impl SandboxBackend for DockerBackend {
    #[instrument(skip(self, invocation), fields(container = %invocation.container_name, mode = ?invocation.mode))]
    async fn run(&self, invocation: &SandboxInvocation) -> Result<ProcessOutput, SandboxError> {
        let args = DockerCommand::for_invocation(
            &self.docker_path,
            &self.image,
            &self.mount_point,
            invocation,
        )
        .build();
        debug!(?args, "running sandbox container");

        let program = args
            .first()
            .ok_or_else(|| SandboxError::CommandFailed("empty command arguments".to_string()))?;

        let mut child = Command::new(program)
            .args(&args[1..])
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SandboxError::SpawnFailed)?;

        // Feed stdin from a separate task so a program that never reads
        // cannot stall the wait below
        if let (Some(data), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&data).await {
                    debug!(error = %e, "stdin closed early");
                }
            });
        }

        let docker_path = self.docker_path.clone();
        let container_name = invocation.container_name.clone();
        let completion = with_deadline(invocation.timeout, child.wait_with_output(), || {
            Self::force_remove(docker_path, container_name)
        })
        .await;

        match completion {
            Completion::Finished(output) => {
                let output = output?;
                let exit_code = output
                    .status
                    .code()
                    .or_else(|| output.status.signal().map(|signal| 128 + signal))
                    .unwrap_or(-1);

                debug!(exit_code, "container exited");

                Ok(ProcessOutput::exited(
                    exit_code,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                ))
            }
            Completion::Expired => {
                warn!(timeout = ?invocation.timeout, "container exceeded outer ceiling");
                Ok(ProcessOutput::timed_out())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::config::Language;
    use crate::sandbox::invocation::SandboxMode;

    /// Stand-in for the docker CLI: echoes stdin, and misbehaves according
    /// to the container name
    fn fake_docker(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let marker = dir.join("removed");
        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "rm" ]; then
    echo "$3" > '{}'
    exit 0
fi
for arg in "$@"; do
    case "$arg" in
        slow) exec sleep 10 ;;
        crash) echo "Segmentation fault" >&2; exit 139 ;;
    esac
done
cat
"#,
            marker.display()
        );

        let path = dir.join("docker");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation(name: &str) -> SandboxInvocation {
        SandboxInvocation::new(SandboxMode::Run, Language::Cpp, "/tmp/none", name)
            .timeout(Duration::from_secs(5))
    }

    #[test]
    fn process_output_constructors() {
        let ok = ProcessOutput::exited(0, "out", "");
        assert!(ok.success());
        assert!(!ProcessOutput::exited(1, "", "err").success());

        let timed_out = ProcessOutput::timed_out();
        assert!(timed_out.timed_out);
        assert!(!timed_out.success());
    }

    #[tokio::test]
    async fn docker_backend_with_fake_cli() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DockerBackend::new(fake_docker(dir.path()), "img", "/work");

        // stdin is piped through
        let output = backend
            .run(&invocation("echo").stdin("3 4\n"))
            .await
            .unwrap();
        assert_eq!(output, ProcessOutput::exited(0, "3 4\n", ""));

        // No stdin means an immediate EOF
        let output = backend.run(&invocation("echo")).await.unwrap();
        assert_eq!(output.stdout, "");

        // Non-zero exits are reported, not raised
        let output = backend.run(&invocation("crash")).await.unwrap();
        assert_eq!(output.exit_code, 139);
        assert!(output.stderr.contains("Segmentation fault"));

        // The ceiling removes the container by name
        let output = backend
            .run(&invocation("slow").timeout(Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(output.timed_out);
        let removed = std::fs::read_to_string(dir.path().join("removed")).unwrap();
        assert_eq!(removed.trim(), "slow");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let backend = DockerBackend::new("/nonexistent/docker", "img", "/work");
        let result = backend.run(&invocation("x")).await;
        assert!(matches!(result, Err(SandboxError::SpawnFailed(_))));
    }

    #[test]
    fn from_config_uses_image_and_mount() {
        let config = Config::default();
        let backend = DockerBackend::from_config(&config);
        assert_eq!(backend.image(), config.sandbox_image);
        assert_eq!(backend.mount_point, config.mount_point);
    }
}

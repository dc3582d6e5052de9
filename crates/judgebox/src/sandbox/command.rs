//! Command builder for the docker CLI
//!
//! Builds command-line arguments for running the sandbox image.

use std::path::{Path, PathBuf};

use crate::sandbox::invocation::{IsolationPolicy, SandboxInvocation, SandboxMode};
use crate::types::ResourceLimits;

/// Builder for docker command-line arguments
#[derive(Debug)]
pub struct DockerCommand {
    /// Path to the docker binary
    docker_path: PathBuf,
    /// One of `run`, `rm -f`
    action: DockerAction,
    /// --name
    container_name: String,
    /// Image to run
    image: String,
    /// -i, keep stdin open
    interactive: bool,
    policy: IsolationPolicy,
    limits: ResourceLimits,
    /// -v host:target
    volume: Option<(PathBuf, String)>,
    /// -w
    working_dir: Option<String>,
    /// Arguments passed to the image entrypoint
    args: Vec<String>,
}

impl DockerCommand {
    /// Create a new docker command builder
    pub fn new(docker_path: impl Into<PathBuf>, container_name: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
            action: DockerAction::Run,
            container_name: container_name.into(),
            image: String::new(),
            interactive: false,
            policy: IsolationPolicy::default(),
            limits: ResourceLimits::new(),
            volume: None,
            working_dir: None,
            args: Vec::new(),
        }
    }

    /// Build the full `docker run` for one sandbox invocation
    ///
    /// The job directory is mounted at `mount_point`, which is also the
    /// working directory; capture files are addressed as
    /// `<mount_point>/out/<file>`.
    pub fn for_invocation(
        docker_path: impl Into<PathBuf>,
        image: impl Into<String>,
        mount_point: &str,
        invocation: &SandboxInvocation,
    ) -> Self {
        let mut args = vec![
            invocation.mode.as_arg().to_string(),
            invocation.language.sandbox_tag().to_string(),
        ];

        if invocation.mode == SandboxMode::Run {
            if let Some(time) = invocation.limits.time_limit_ms {
                args.push("--time-limit-ms".to_string());
                args.push(time.to_string());
            }
            if let Some(memory) = invocation.limits.memory_limit_kb {
                args.push("--memory-limit-kb".to_string());
                args.push(memory.to_string());
            }
            if let Some(ref file) = invocation.stdout_file {
                args.push("--stdout-file".to_string());
                args.push(format!("{mount_point}/out/{file}"));
            }
            if let Some(ref file) = invocation.stderr_file {
                args.push("--stderr-file".to_string());
                args.push(format!("{mount_point}/out/{file}"));
            }
        }

        Self::new(docker_path, &invocation.container_name)
            .action(DockerAction::Run)
            .image(image)
            .interactive(invocation.stdin.is_some())
            .policy(invocation.policy)
            .limits(invocation.limits.clone())
            .volume(invocation.job_dir(), mount_point)
            .working_dir(mount_point)
            .args(args)
    }

    /// Set the action to perform
    pub fn action(mut self, action: DockerAction) -> Self {
        self.action = action;
        self
    }

    /// Set the image to run
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Keep stdin attached
    pub fn interactive(mut self, enable: bool) -> Self {
        self.interactive = enable;
        self
    }

    /// Set isolation switches
    pub fn policy(mut self, policy: IsolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set resource limits (container memory and pids are applied here)
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Bind-mount a host directory read-write
    pub fn volume(mut self, host: impl AsRef<Path>, target: impl Into<String>) -> Self {
        self.volume = Some((host.as_ref().to_path_buf(), target.into()));
        self
    }

    /// Set the working directory inside the container
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the image arguments
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the command-line arguments
    ///
    /// Consumes self to avoid cloning the argument vector.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![self.docker_path.to_string_lossy().into_owned()];

        match self.action {
            DockerAction::Remove => {
                args.push("rm".to_string());
                args.push("--force".to_string());
                args.push(self.container_name);
            }
            DockerAction::Run => {
                args.push("run".to_string());
                if self.interactive {
                    args.push("-i".to_string());
                }
                args.push("--rm".to_string());
                args.push("--name".to_string());
                args.push(self.container_name);

                // Isolation
                if self.policy.network_disabled {
                    args.push("--network".to_string());
                    args.push("none".to_string());
                }
                if self.policy.read_only_root {
                    args.push("--read-only".to_string());
                }
                if self.policy.drop_all_capabilities {
                    args.push("--cap-drop".to_string());
                    args.push("ALL".to_string());
                }

                // Resource limits
                if let Some(pids) = self.limits.pids_limit {
                    args.push("--pids-limit".to_string());
                    args.push(pids.to_string());
                }

                // Mount and working directory
                if let Some((host, target)) = self.volume {
                    args.push("-v".to_string());
                    args.push(format!("{}:{target}", host.display()));
                }
                if let Some(dir) = self.working_dir {
                    args.push("-w".to_string());
                    args.push(dir);
                }

                if let Some(memory) = self.limits.container_memory_mb {
                    args.push("--memory".to_string());
                    args.push(format!("{memory}m"));
                }

                args.push(self.image);
                args.extend(self.args);
            }
        }

        args
    }

    /// Get the docker binary path
    pub fn docker_path(&self) -> &Path {
        &self.docker_path
    }

    /// Get the container name
    pub fn container_name(&self) -> &str {
        &self.container_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerAction {
    /// Start a container and wait for it
    Run,
    /// Force-remove a container (kills it if still running)
    Remove,
}

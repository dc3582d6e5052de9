//! Per-job workspace lifecycle
//!
//! A [`JobWorkspace`] is the directory tree one compile-and-run cycle owns:
//!
//! ```text
//! <job_root>/<job id>/
//!     src/    materialized source
//!     build/  compiler workspace, visible to the sandbox
//!     out/    captured stdout/stderr files
//! ```

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use crate::workspace::materialize::{
    ArchivePolicy, BUILD_FILE_NAME, MaterializeError, STUDENT_CODE_MARKERS, merge_template,
    require_entry_point,
};

mod materialize;

/// Errors that occur while allocating or accessing a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Subdirectory holding the materialized source
pub const SRC_DIR: &str = "src";
/// Subdirectory used by the compiler
pub const BUILD_DIR: &str = "build";
/// Subdirectory receiving captured program output
pub const OUT_DIR: &str = "out";

/// An exclusively owned job directory
///
/// # Cleanup
///
/// Call [`destroy()`](Self::destroy) exactly once when the job is over. It
/// never fails; removal errors are logged. If the workspace is dropped
/// without being destroyed (a panic or a cancelled future), `Drop` removes
/// the tree synchronously as a fallback.
#[derive(Debug)]
pub struct JobWorkspace {
    /// Unique job identifier, also used in container names
    id: String,

    /// Root of the job tree
    root: PathBuf,

    /// Whether the tree still exists on disk
    live: bool,
}

impl JobWorkspace {
    /// Allocate a new workspace under `job_root`
    #[instrument]
    pub async fn create(job_root: &Path) -> Result<Self, WorkspaceError> {
        let id = new_job_id();
        let root = job_root.join(&id);

        for dir in [
            root.clone(),
            root.join(SRC_DIR),
            root.join(BUILD_DIR),
            root.join(OUT_DIR),
        ] {
            if let Err(source) = create_open_dir(&dir).await {
                // Don't leave a half-built tree behind
                let _ = tokio::fs::remove_dir_all(&root).await;
                return Err(WorkspaceError::Create { path: dir, source });
            }
        }

        debug!(id, ?root, "workspace created");

        Ok(Self {
            id,
            root,
            live: true,
        })
    }

    /// Get the job identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the root of the job tree (bind-mounted into the sandbox)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the source directory
    pub fn src_dir(&self) -> PathBuf {
        self.root.join(SRC_DIR)
    }

    /// Get the compiler working directory
    pub(crate) fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    /// Get the output directory
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(OUT_DIR)
    }

    /// Get the host path to a file inside `src/`
    ///
    /// Returns an error if the path contains path traversal attempts.
    pub fn src_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        Ok(self.src_dir().join(checked_relative(name)?))
    }

    /// Get the host path to a file inside `out/`
    pub fn out_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        Ok(self.out_dir().join(checked_relative(name)?))
    }

    /// Read a captured output file
    ///
    /// A missing file reads as empty: the program may simply have produced
    /// no output.
    pub async fn read_output(&self, name: &str) -> Result<String, WorkspaceError> {
        let path = self.out_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(WorkspaceError::Io(e)),
        }
    }

    /// Remove the job tree
    ///
    /// Best effort: failures are logged and swallowed so that cleanup never
    /// masks the judging result.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn destroy(mut self) {
        self.live = false;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("workspace already gone");
            }
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to remove workspace"),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.live {
            warn!(
                id = %self.id,
                root = %self.root.display(),
                "JobWorkspace dropped without destroy(), removing synchronously"
            );
            if let Err(e) = std::fs::remove_dir_all(&self.root)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(root = %self.root.display(), error = %e, "fallback workspace removal failed");
            }
        }
    }
}

/// Build a job id unique across concurrent requests
fn new_job_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("test-{millis}-{}", &suffix[..8])
}

/// Create a directory the unprivileged sandbox user can write into
async fn create_open_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::create_dir_all(path).await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).await
}

/// Validate a workspace-relative file name
fn checked_relative(name: &str) -> Result<&Path, WorkspaceError> {
    if name.is_empty() || name.contains("..") || name.starts_with('/') {
        return Err(WorkspaceError::InvalidPath(format!(
            "path traversal not allowed: {name}"
        )));
    }
    Ok(Path::new(name))
}

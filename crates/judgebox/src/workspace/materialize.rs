//! Source materialization
//!
//! Populates a fresh workspace's `src/` with the code to build: a single
//! source file, or the contents of a ZIP archive optionally overlaid with an
//! instructor-provided build file.

use std::io::{Cursor, Read};
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use zip::ZipArchive;

use crate::config::Language;
use crate::workspace::{JobWorkspace, WorkspaceError};

/// File name an instructor-provided build file is written as
pub const BUILD_FILE_NAME: &str = "Makefile";

/// Build file that selects a make-driven compile, compared case-insensitively
const MAKEFILE: &str = "makefile";

/// Every name `make` reads; all are cleared before an instructor build file
/// is written
const BUILD_FILE_ALIASES: [&str; 2] = [MAKEFILE, "gnumakefile"];

/// Hidden entries that are still allowed in archives
const ALLOWED_HIDDEN: [&str; 1] = [".gitignore"];

/// Entry names rejected wherever they appear in an archive
const DANGEROUS_NAMES: [&str; 8] = [
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "id_rsa",
    "id_ed25519",
    "credentials.json",
    "secrets.json",
    "authorized_keys",
];

/// Key and certificate extensions, compared case-insensitively
const DANGEROUS_EXTENSIONS: [&str; 4] = ["pem", "key", "crt", "pfx"];

/// Single-line placeholders replaced by the student's code, in priority order
pub const STUDENT_CODE_MARKERS: [&str; 5] = [
    "// STUDENT_CODE_HERE",
    "# STUDENT_CODE_HERE",
    "/* STUDENT_CODE_HERE */",
    "// YOUR CODE HERE",
    "# YOUR CODE HERE",
];

/// Region markers; student code goes between them
const REGION_BEGIN: &str = "// STUDENT_CODE_BEGIN";
const REGION_END: &str = "// STUDENT_CODE_END";

/// Unix file-type bits for a symbolic link
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Errors that occur while materializing source into a workspace
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("unsafe archive entry: {0}")]
    UnsafeArchiveEntry(String),

    #[error("symbolic links are not allowed in archives: {0}")]
    SymlinkEntry(String),

    #[error("archive expands to more than {limit} bytes ({size} seen)")]
    ArchiveTooLarge { size: u64, limit: u64 },

    #[error("archive contains a disallowed file: {0}")]
    DangerousEntry(String),

    #[error("archive contains no files")]
    EmptyArchive,

    #[error("archive has neither {0} nor a Makefile")]
    MissingEntryPoint(&'static str),

    #[error("invalid archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits applied when extracting a submission archive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchivePolicy {
    /// Upper bound on the total uncompressed size of all entries
    #[serde(default = "default_max_uncompressed_bytes")]
    pub max_uncompressed_bytes: u64,

    /// Whether symlink entries are extracted (as plain files holding the target)
    #[serde(default)]
    pub allow_symlinks: bool,

    /// Reject hidden files, container recipes, keys and credentials
    #[serde(default = "default_check_dangerous_files")]
    pub check_dangerous_files: bool,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            max_uncompressed_bytes: default_max_uncompressed_bytes(),
            allow_symlinks: false,
            check_dangerous_files: default_check_dangerous_files(),
        }
    }
}

fn default_max_uncompressed_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_check_dangerous_files() -> bool {
    true
}

/// A validated archive entry held in memory
#[derive(Debug)]
struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
}

/// Merge student code into a function-mode template
///
/// The first recognized single-line marker is replaced; failing that, the
/// code is placed inside a begin/end region; failing that, it is appended.
pub fn merge_template(template: &str, student_code: &str) -> String {
    for marker in STUDENT_CODE_MARKERS {
        if template.contains(marker) {
            return template.replacen(marker, student_code, 1);
        }
    }

    if let (Some(begin), Some(end)) = (template.find(REGION_BEGIN), template.find(REGION_END)) {
        let after_begin = begin + REGION_BEGIN.len();
        if after_begin <= end {
            return format!(
                "{}\n{}\n{}",
                &template[..after_begin],
                student_code,
                &template[end..]
            );
        }
    }

    format!("{template}\n{student_code}")
}

/// Reject entry names that could land outside `src/`
fn check_entry_name(name: &str) -> Result<(), MaterializeError> {
    if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
        return Err(MaterializeError::UnsafeArchiveEntry(name.to_string()));
    }
    Ok(())
}

/// Reject entries that have no business in a submission
///
/// Every path segment is checked, so `.git/config` is caught even without a
/// `.git/` directory entry.
fn check_dangerous_entry(name: &str) -> Result<(), MaterializeError> {
    let dangerous = name
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .any(is_dangerous_segment);
    if dangerous {
        return Err(MaterializeError::DangerousEntry(name.to_string()));
    }
    Ok(())
}

fn is_dangerous_segment(part: &str) -> bool {
    if part.starts_with('.') {
        return !ALLOWED_HIDDEN.contains(&part);
    }
    if DANGEROUS_NAMES.contains(&part) {
        return true;
    }
    part.rsplit_once('.').is_some_and(|(_, ext)| {
        DANGEROUS_EXTENSIONS
            .iter()
            .any(|bad| ext.eq_ignore_ascii_case(bad))
    })
}

/// Require the language's main file somewhere in the extracted entries
///
/// Only needed when no build file says how to build the program.
pub fn require_entry_point(names: &[String], language: Language) -> Result<(), MaterializeError> {
    let main = language.file_name();
    let found = names.iter().any(|name| {
        name.rsplit('/')
            .next()
            .is_some_and(|base| base.eq_ignore_ascii_case(main))
    });
    if found {
        Ok(())
    } else {
        Err(MaterializeError::MissingEntryPoint(main))
    }
}

/// Validate every entry, then read the file entries into memory
///
/// Nothing is returned unless the whole archive passes validation.
fn read_archive(bytes: &[u8], policy: &ArchivePolicy) -> Result<Vec<ArchiveEntry>, MaterializeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let limit = policy.max_uncompressed_bytes;

    let mut declared: u64 = 0;
    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        let name = file.name().to_string();
        check_entry_name(&name)?;
        if file.enclosed_name().is_none() {
            return Err(MaterializeError::UnsafeArchiveEntry(name));
        }
        if policy.check_dangerous_files {
            check_dangerous_entry(&name)?;
        }
        if file.is_dir() {
            continue;
        }
        if !policy.allow_symlinks
            && file
                .unix_mode()
                .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            return Err(MaterializeError::SymlinkEntry(name));
        }
        declared = declared.saturating_add(file.size());
        if declared > limit {
            return Err(MaterializeError::ArchiveTooLarge {
                size: declared,
                limit,
            });
        }
    }

    // Headers can lie about sizes, so count what actually decompresses
    let mut entries = Vec::new();
    let mut actual: u64 = 0;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::new();
        (&mut file)
            .take(limit.saturating_sub(actual).saturating_add(1))
            .read_to_end(&mut data)?;
        actual += data.len() as u64;
        if actual > limit {
            return Err(MaterializeError::ArchiveTooLarge {
                size: actual,
                limit,
            });
        }
        entries.push(ArchiveEntry { name, data });
    }

    if entries.is_empty() {
        return Err(MaterializeError::EmptyArchive);
    }
    Ok(entries)
}

impl JobWorkspace {
    /// Write a single source file under the language's canonical name
    #[instrument(skip(self, source), fields(id = %self.id()))]
    pub async fn write_source(
        &self,
        language: Language,
        source: &str,
    ) -> Result<PathBuf, MaterializeError> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.src_path(language.file_name())?;
        tokio::fs::write(&path, source).await?;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await?;

        debug!(?path, len = source.len(), "wrote source file");
        Ok(path)
    }

    /// Extract a ZIP archive into `src/`
    ///
    /// The whole archive is validated before anything is written. Directory
    /// entries are skipped; parent directories are created as needed.
    /// Returns the extracted entry names in archive order.
    #[instrument(skip(self, bytes, policy), fields(id = %self.id(), len = bytes.len()))]
    pub async fn extract_archive(
        &self,
        bytes: &[u8],
        policy: &ArchivePolicy,
    ) -> Result<Vec<String>, MaterializeError> {
        let entries = read_archive(bytes, policy)?;

        let mut names = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = self.src_path(&entry.name)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &entry.data).await?;
            names.push(entry.name);
        }

        debug!(files = names.len(), "extracted archive");
        Ok(names)
    }

    /// Write an instructor-provided build file into `src/`
    ///
    /// Any build file bundled by the student is removed first so the
    /// instructor's version is the one `make` picks up.
    #[instrument(skip(self, contents), fields(id = %self.id()))]
    pub async fn write_build_file(&self, contents: &[u8]) -> Result<(), MaterializeError> {
        let src = self.src_dir();
        let mut dir = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let is_build_file = name.to_str().is_some_and(|name| {
                BUILD_FILE_ALIASES
                    .iter()
                    .any(|alias| name.eq_ignore_ascii_case(alias))
            });
            if is_build_file && entry.file_type().await?.is_file() {
                debug!(?name, "removing bundled build file");
                tokio::fs::remove_file(entry.path()).await?;
            }
        }

        tokio::fs::write(src.join(BUILD_FILE_NAME), contents).await?;
        Ok(())
    }

    /// Check if `src/` holds a build file (case-insensitive `makefile`)
    pub async fn has_build_file(&self) -> Result<bool, MaterializeError> {
        let mut dir = tokio::fs::read_dir(self.src_dir()).await?;
        while let Some(entry) = dir.next_entry().await? {
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(MAKEFILE));
            if matches && entry.file_type().await?.is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

//! Object storage access
//!
//! Instructor-provided build files and function templates live in an object
//! store. The runner only ever reads whole objects by `(bucket, key)`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read access to an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Fetch an object and decode it as UTF-8, replacing invalid sequences
    async fn get_object_string(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let bytes = self.get_object(bucket, key).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Object store backed by a local directory laid out as
/// `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object to a path that stays inside the root
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            let plain = !part.is_empty()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)));
            if !plain {
                return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(size = bytes.len(), "object read");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// In-memory object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object while building the store
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        self.objects
            .get_mut()
            .insert((bucket.into(), key.into()), contents.into());
        self
    }

    /// Add or replace an object
    pub async fn put_object(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) {
        self.objects
            .write()
            .await
            .insert((bucket.into(), key.into()), contents.into());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

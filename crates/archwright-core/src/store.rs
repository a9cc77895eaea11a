//! Keyed JSON blob storage. The engine only ever reads and writes whole
//! documents by key; nothing here knows about merging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key '{0}'")]
    InvalidKey(String),
    #[error("i/o error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document at '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read_blob(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn write_blob(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete_blob(&self, key: &str) -> Result<(), StoreError>;

    /// Keys directly below `prefix` (one level), sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

pub mod keys {
    pub fn project(project_id: &str) -> String {
        format!("project/{project_id}")
    }

    pub fn project_history(project_id: &str) -> String {
        format!("project/{project_id}/rev")
    }

    /// Zero-padded so lexical order is revision order.
    pub fn project_revision(project_id: &str, revision: u64) -> String {
        format!("project/{project_id}/rev/{revision:08}")
    }

    pub fn step(step_progress_id: &str) -> String {
        format!("step/{step_progress_id}")
    }

    pub fn course(course_id: &str) -> String {
        format!("course/{course_id}")
    }

    pub fn course_progress(course_progress_id: &str) -> String {
        format!("course-progress/{course_progress_id}")
    }
}

pub async fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.read_blob(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

pub async fn write_json<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
    })?;
    store.write_blob(key, &value).await
}

fn key_segments(key: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = key.split('/').collect();
    let ok = segments.iter().all(|s| {
        !s.is_empty()
            && *s != "."
            && *s != ".."
            && !s.starts_with('.')
            && !s.contains(['\\', ':'])
    });
    if ok {
        Ok(segments)
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Resolve the global data directory (~/.archwright/).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".archwright")
}

/// One pretty-printed JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, segments: &[&str]) -> PathBuf {
        segments.iter().fold(self.root.clone(), |p, s| p.join(s))
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let segments = key_segments(key)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        Ok(self.dir_for(parents).join(format!("{last}.json")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read_blob(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            })
    }

    /// Temp file + rename, so readers never see a half-written document.
    async fn write_blob(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&dir).await.map_err(io)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{file_name}.tmp"));
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        tokio::fs::write(&tmp, json).await.map_err(io)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io)?;
        debug!(key, "wrote blob");
        Ok(())
    }

    async fn delete_blob(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let segments = key_segments(prefix)?;
        let dir = self.dir_for(&segments);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(source) => {
                return Err(StoreError::Io {
                    key: prefix.to_string(),
                    source,
                })
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            key: prefix.to_string(),
            source,
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".json") {
                keys.push(format!("{prefix}/{stem}"));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process store, used by tests and by ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.blobs.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read_blob(&self, key: &str) -> Result<Option<Value>, StoreError> {
        key_segments(key)?;
        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn write_blob(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        key_segments(key)?;
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete_blob(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        key_segments(prefix)?;
        let dir = format!("{prefix}/");
        Ok(self
            .blobs
            .lock()
            .await
            .keys()
            .filter(|k| {
                k.strip_prefix(&dir)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }
}

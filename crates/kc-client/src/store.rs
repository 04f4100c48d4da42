//! Persistence of assembled documents
//!
//! The wizard hands the finished document to a store exactly once. Stores
//! never retry on their own; a failure is returned to the caller verbatim.

use crate::error::ClientError;
use async_trait::async_trait;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A document the store can persist
pub trait Document: Serialize + Send + Sync {
    /// Document kind, e.g. `Cluster`
    fn kind(&self) -> &str;
    /// Name the document is stored under
    fn name(&self) -> &str;
}

/// Persistence collaborator
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn create<D: Document>(&self, doc: &D) -> Result<(), ClientError>;
}

/// Store writing each document to `<dir>/<kind>-<name>.yaml`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a document of `kind` named `name` is written to
    pub fn path_for(&self, kind: &str, name: &str) -> PathBuf {
        let file = format!("{}-{}.yaml", kind.to_lowercase(), sanitize(name));
        self.dir.join(file)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keep file names to `[a-z0-9._-]`
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Write `body` to a fresh `path`, removing the file again if the write fails
async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let result = async {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    if result.is_err() {
        remove_quietly(path).await;
    }
    result
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl ClusterStore for FileStore {
    /// The body goes to a hidden temp file first and is linked into place
    /// only once complete, so a failed write never leaves a document behind.
    async fn create<D: Document>(&self, doc: &D) -> Result<(), ClientError> {
        let body = serde_yaml::to_string(doc)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(doc.kind(), doc.name());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.dir.join(format!(".{}.tmp", file_name));

        write_file(&tmp, body.as_bytes()).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        remove_quietly(&tmp).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ClientError::AlreadyExists(path.display().to_string()));
            }
            Err(e) => return Err(ClientError::Io(e)),
        }

        tracing::info!("Stored {} {} at {}", doc.kind(), doc.name(), path.display());
        Ok(())
    }
}

/// In-memory store keeping documents as JSON values
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<serde_json::Value>>,
    reject_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses every document with `message`
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            reject_with: Some(message.into()),
        }
    }

    pub async fn documents(&self) -> Vec<serde_json::Value> {
        self.documents.lock().await.clone()
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn create<D: Document>(&self, doc: &D) -> Result<(), ClientError> {
        if let Some(message) = &self.reject_with {
            return Err(ClientError::Rejected(message.clone()));
        }
        let value = serde_json::to_value(doc)?;
        self.documents.lock().await.push(value);
        Ok(())
    }
}

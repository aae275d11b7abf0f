use crate::error::StoreError;
use async_trait::async_trait;
use flowcore::{DocumentFormat, FlowDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Persistence collaborator of a session. Writes are best effort: a
/// failed save is reported to peers but the in-memory graph stays
/// authoritative.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn load(&self, flow_id: &str) -> Result<Option<FlowDocument>, StoreError>;

    async fn save(&self, flow_id: &str, document: &FlowDocument) -> Result<(), StoreError>;

    /// Returns whether a document existed.
    async fn delete(&self, flow_id: &str) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store, mostly for tests and ephemeral servers.
#[derive(Default)]
pub struct MemoryFlowStore {
    documents: RwLock<HashMap<String, FlowDocument>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn load(&self, flow_id: &str) -> Result<Option<FlowDocument>, StoreError> {
        Ok(self.documents.read().await.get(flow_id).cloned())
    }

    async fn save(&self, flow_id: &str, document: &FlowDocument) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(flow_id.to_string(), document.clone());
        Ok(())
    }

    async fn delete(&self, flow_id: &str) -> Result<bool, StoreError> {
        Ok(self.documents.write().await.remove(flow_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.documents.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// One document file per flow in a directory, as `<flow id>.json` or
/// `<flow id>.yaml`.
pub struct FileFlowStore {
    dir: PathBuf,
    format: DocumentFormat,
}

impl FileFlowStore {
    pub fn new(dir: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, flow_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !flow_id.is_empty()
            && flow_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(flow_id.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", flow_id, self.format.extension())))
    }
}

#[async_trait]
impl FlowStore for FileFlowStore {
    async fn load(&self, flow_id: &str) -> Result<Option<FlowDocument>, StoreError> {
        let path = self.path(flow_id)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(FlowDocument::decode(&text, self.format)?))
    }

    async fn save(&self, flow_id: &str, document: &FlowDocument) -> Result<(), StoreError> {
        let path = self.path(flow_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let text = document.encode(self.format)?;
        // Readers only ever see complete files.
        let partial = path.with_extension("tmp");
        tokio::fs::write(&partial, text).await?;
        tokio::fs::rename(&partial, &path).await?;
        tracing::debug!("Saved flow {} to {}", flow_id, path.display());
        Ok(())
    }

    async fn delete(&self, flow_id: &str) -> Result<bool, StoreError> {
        let path = self.path(flow_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(self.format.extension()) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

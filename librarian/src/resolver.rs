use std::sync::Arc;

use async_trait::async_trait;
use librarian_core::ResourceType;

use crate::index::{FileRecord, IndexError, MetadataIndex};
use crate::paths::TRASH_PATH;

/// Metadata lookup used by the mover.
#[async_trait]
pub trait PathResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Option<FileRecord>;

    /// Called after the remote accepted a move of `id` under `parent_id`.
    async fn record_move(&self, id: &str, parent_id: &str) -> Result<(), IndexError>;
}

#[async_trait]
impl PathResolver for MetadataIndex {
    async fn resolve(&self, id: &str) -> Option<FileRecord> {
        self.get_meta(id).await
    }

    async fn record_move(&self, id: &str, parent_id: &str) -> Result<(), IndexError> {
        self.reparent(id, parent_id).await
    }
}

/// Maps a reserved folder id onto the `/trash` pseudo-folder and defers
/// everything else to the wrapped resolver.
pub struct TrashAwareResolver {
    inner: Arc<dyn PathResolver>,
    trash_id: String,
}

impl TrashAwareResolver {
    pub fn new(inner: Arc<dyn PathResolver>, trash_id: impl Into<String>) -> Self {
        Self {
            inner,
            trash_id: trash_id.into(),
        }
    }

    fn trash_record(&self) -> FileRecord {
        FileRecord {
            id: self.trash_id.clone(),
            name: "Trash".to_string(),
            path: TRASH_PATH.to_string(),
            resource_type: ResourceType::Folder,
            parent_id: None,
            modified: None,
        }
    }
}

#[async_trait]
impl PathResolver for TrashAwareResolver {
    async fn resolve(&self, id: &str) -> Option<FileRecord> {
        if id == self.trash_id {
            return Some(self.trash_record());
        }
        self.inner.resolve(id).await
    }

    async fn record_move(&self, id: &str, parent_id: &str) -> Result<(), IndexError> {
        if parent_id == self.trash_id {
            return Ok(());
        }
        self.inner.record_move(id, parent_id).await
    }
}

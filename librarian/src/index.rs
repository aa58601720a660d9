use std::collections::{HashMap, HashSet, VecDeque};

use librarian_core::{DriveError, DriveFile, DriveScope, ResourceType};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;

use crate::paths::{HOME_PATH, join_path, path_segment};
use crate::remote::RemoteDrive;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("api error: {0}")]
    Api(#[from] DriveError),
    #[error("unknown item: {0}")]
    UnknownId(String),
    #[error("moving {id} under {parent_id} would create a cycle")]
    Cycle { id: String, parent_id: String },
}

/// Metadata for one indexed item. `path` is derived from the parent chain on
/// every read and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub path: String,
    pub resource_type: ResourceType,
    pub parent_id: Option<String>,
    pub modified: Option<i64>,
}

impl FileRecord {
    pub fn is_folder(&self) -> bool {
        self.resource_type == ResourceType::Folder
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub parent_id: Option<String>,
    pub modified: Option<i64>,
}

impl IndexEntry {
    /// An unparseable `modifiedTime` is logged and indexed as unknown.
    pub fn from_drive_file(file: &DriveFile, parent_id: &str) -> Self {
        let modified = parse_modified(file.modified_time.as_deref()).unwrap_or_else(|err| {
            tracing::warn!(id = %file.id, value = ?file.modified_time, "bad modifiedTime: {err}");
            None
        });
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            resource_type: file.resource_type(),
            parent_id: Some(parent_id.to_string()),
            modified,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    resource_type: ResourceType,
    parent_id: Option<String>,
    modified: Option<i64>,
}

pub struct MetadataIndex {
    drive_id: String,
    root_name: String,
    nodes: RwLock<HashMap<String, Node>>,
}

impl MetadataIndex {
    pub fn new(drive_id: impl Into<String>, root_name: impl Into<String>) -> Self {
        let drive_id = drive_id.into();
        let root_name = root_name.into();
        let nodes = HashMap::from([(drive_id.clone(), root_node(&root_name))]);
        Self {
            drive_id,
            root_name,
            nodes: RwLock::new(nodes),
        }
    }

    /// Walks the drive breadth-first from its root and indexes everything reachable.
    pub async fn build(
        remote: &dyn RemoteDrive,
        drive_id: &str,
        root_name: &str,
        scope: &DriveScope,
    ) -> Result<Self, IndexError> {
        let index = Self::new(drive_id, root_name);
        index.refresh(remote, scope).await?;
        Ok(index)
    }

    /// Rebuilds the index from the remote listing and swaps it in atomically.
    pub async fn refresh(
        &self,
        remote: &dyn RemoteDrive,
        scope: &DriveScope,
    ) -> Result<usize, IndexError> {
        let mut nodes = HashMap::from([(self.drive_id.clone(), root_node(&self.root_name))]);
        let mut visited = HashSet::from([self.drive_id.clone()]);
        let mut pending = VecDeque::from([self.drive_id.clone()]);

        while let Some(folder_id) = pending.pop_front() {
            for file in remote.list_children(&folder_id, scope).await? {
                let entry = IndexEntry::from_drive_file(&file, &folder_id);
                if entry.resource_type == ResourceType::Folder && visited.insert(entry.id.clone())
                {
                    pending.push_back(entry.id.clone());
                }
                nodes.insert(entry.id.clone(), node_from_entry(entry));
            }
        }

        let total = nodes.len();
        *self.nodes.write().await = nodes;
        tracing::info!(drive_id = %self.drive_id, total, "metadata index refreshed");
        Ok(total)
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub async fn upsert(&self, entry: IndexEntry) {
        self.nodes
            .write()
            .await
            .insert(entry.id.clone(), node_from_entry(entry));
    }

    /// Looks up an item the last walk did not reach and indexes it when its
    /// parent is already known. `Ok(None)` when the parent is not indexed.
    pub async fn admit_remote(
        &self,
        remote: &dyn RemoteDrive,
        id: &str,
    ) -> Result<Option<FileRecord>, IndexError> {
        let file = remote.get_file(id).await?;
        let Some(parent_id) = file.parents.first() else {
            return Ok(None);
        };
        if self.get_meta(parent_id).await.is_none() {
            tracing::debug!(id, parent_id = %parent_id, "parent not indexed, item not admitted");
            return Ok(None);
        }
        self.upsert(IndexEntry::from_drive_file(&file, parent_id))
            .await;
        tracing::info!(id, "item admitted into index");
        Ok(self.get_meta(id).await)
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// `None` means "no such file"; callers must not guess at fields.
    pub async fn get_meta(&self, id: &str) -> Option<FileRecord> {
        let nodes = self.nodes.read().await;
        self.record_for(&nodes, id)
    }

    pub async fn records(&self) -> Vec<FileRecord> {
        let nodes = self.nodes.read().await;
        nodes
            .keys()
            .filter_map(|id| self.record_for(&nodes, id))
            .collect()
    }

    /// Moves `id` under `parent_id`. Paths of the item and its descendants
    /// follow on the next read.
    pub async fn reparent(&self, id: &str, parent_id: &str) -> Result<(), IndexError> {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(parent_id) {
            return Err(IndexError::UnknownId(parent_id.to_string()));
        }
        if id == self.drive_id || ancestors(&nodes, parent_id).any(|ancestor| ancestor == id) {
            return Err(IndexError::Cycle {
                id: id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        let node = nodes
            .get_mut(id)
            .ok_or_else(|| IndexError::UnknownId(id.to_string()))?;
        node.parent_id = Some(parent_id.to_string());
        Ok(())
    }

    fn record_for(&self, nodes: &HashMap<String, Node>, id: &str) -> Option<FileRecord> {
        let node = nodes.get(id)?;
        Some(FileRecord {
            id: id.to_string(),
            name: node.name.clone(),
            path: self.derive_path(nodes, id)?,
            resource_type: node.resource_type,
            parent_id: node.parent_id.clone(),
            modified: node.modified,
        })
    }

    fn derive_path(&self, nodes: &HashMap<String, Node>, id: &str) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        let mut steps = 0usize;
        while let Some(item_id) = current {
            if item_id == self.drive_id {
                break;
            }
            steps += 1;
            if steps > nodes.len() {
                tracing::warn!(id, "parent chain does not terminate");
                return None;
            }
            let Some(node) = nodes.get(item_id) else {
                tracing::debug!(id, missing = item_id, "parent chain is detached");
                return None;
            };
            segments.push(path_segment(&node.name, item_id));
            current = node.parent_id.as_deref();
        }
        Some(
            segments
                .iter()
                .rev()
                .fold(HOME_PATH.to_string(), |path, segment| join_path(&path, segment)),
        )
    }
}

fn ancestors<'a>(
    nodes: &'a HashMap<String, Node>,
    start: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    let mut current = Some(start);
    let mut remaining = nodes.len() + 1;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        remaining -= 1;
        let id = current?;
        current = nodes.get(id).and_then(|node| node.parent_id.as_deref());
        Some(id)
    })
}

fn root_node(root_name: &str) -> Node {
    Node {
        name: root_name.to_string(),
        resource_type: ResourceType::Folder,
        parent_id: None,
        modified: None,
    }
}

fn node_from_entry(entry: IndexEntry) -> Node {
    Node {
        name: entry.name,
        resource_type: entry.resource_type,
        parent_id: entry.parent_id,
        modified: entry.modified,
    }
}

fn parse_modified(value: Option<&str>) -> Result<Option<i64>, time::error::Parse> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = OffsetDateTime::parse(value, &Rfc3339)?;
    Ok(Some(parsed.unix_timestamp()))
}

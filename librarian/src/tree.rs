use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::index::{FileRecord, MetadataIndex};
use crate::paths::HOME_PATH;

const DEFAULT_ROOT_NAME: &str = "Home";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub pretty_name: String,
    pub path: String,
    pub children: Vec<TreeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeEntry {
    File(FileRecord),
    Folder(FolderNode),
}

impl FolderNode {
    /// Copy of this node with every non-folder child removed, recursively.
    pub fn folders_only(&self) -> FolderNode {
        FolderNode {
            id: self.id.clone(),
            pretty_name: self.pretty_name.clone(),
            path: self.path.clone(),
            children: self
                .children
                .iter()
                .filter_map(|child| match child {
                    TreeEntry::Folder(folder) => Some(TreeEntry::Folder(folder.folders_only())),
                    TreeEntry::File(_) => None,
                })
                .collect(),
        }
    }

    pub fn contains_only_folders(&self) -> bool {
        self.children.iter().all(|child| match child {
            TreeEntry::Folder(folder) => folder.contains_only_folders(),
            TreeEntry::File(_) => false,
        })
    }

    pub fn find(&self, id: &str) -> Option<&FolderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            TreeEntry::Folder(folder) => folder.find(id),
            TreeEntry::File(_) => None,
        })
    }

    pub fn subfolders(&self) -> impl Iterator<Item = &FolderNode> {
        self.children.iter().filter_map(|child| match child {
            TreeEntry::Folder(folder) => Some(folder),
            TreeEntry::File(_) => None,
        })
    }
}

/// The whole drive as a tree rooted at the drive root.
#[derive(Debug, Clone)]
pub struct FolderTree {
    root: FolderNode,
}

impl FolderTree {
    pub async fn from_index(index: &MetadataIndex) -> Self {
        Self::from_records(index.drive_id(), index.root_name(), index.records().await)
    }

    pub fn from_records(drive_id: &str, root_name: &str, records: Vec<FileRecord>) -> Self {
        let mut children_of: HashMap<String, Vec<FileRecord>> = HashMap::new();
        for record in records {
            if record.id == drive_id {
                continue;
            }
            if let Some(parent_id) = record.parent_id.clone() {
                children_of.entry(parent_id).or_default().push(record);
            }
        }
        for siblings in children_of.values_mut() {
            siblings.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        }

        let pretty_name = if root_name.trim().is_empty() {
            DEFAULT_ROOT_NAME.to_string()
        } else {
            root_name.to_string()
        };
        let mut visited = HashSet::from([drive_id.to_string()]);
        let root = build_node(
            drive_id.to_string(),
            pretty_name,
            HOME_PATH.to_string(),
            &mut children_of,
            &mut visited,
        );
        Self { root }
    }

    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    /// Single-element list holding the folders-only view of the root.
    pub fn folders(&self) -> Vec<FolderNode> {
        vec![self.root.folders_only()]
    }

    /// `None` when `id` is not a folder in the tree.
    pub fn contains_only_folders(&self, id: &str) -> Option<bool> {
        self.root.find(id).map(FolderNode::contains_only_folders)
    }
}

fn build_node(
    id: String,
    pretty_name: String,
    path: String,
    children_of: &mut HashMap<String, Vec<FileRecord>>,
    visited: &mut HashSet<String>,
) -> FolderNode {
    let children = children_of
        .remove(&id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|record| {
            if !record.is_folder() {
                return Some(TreeEntry::File(record));
            }
            if !visited.insert(record.id.clone()) {
                return None;
            }
            Some(TreeEntry::Folder(build_node(
                record.id,
                record.name,
                record.path,
                children_of,
                visited,
            )))
        })
        .collect();
    FolderNode {
        id,
        pretty_name,
        path,
        children,
    }
}

/// Folder hierarchy of the indexed drive: always exactly one root node.
pub async fn get_folders(index: &MetadataIndex) -> Vec<FolderNode> {
    FolderTree::from_index(index).await.folders()
}

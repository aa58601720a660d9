use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use librarian_core::{
    DriveError, DriveFile, DriveScope, FOLDER_MIME_TYPE, ParentUpdate, StatusCode,
};

use crate::cache::{CacheEntry, CacheError, PageCache, PurgeRequest};
use crate::paths::validate_path;
use crate::remote::RemoteDrive;

pub fn drive_folder(id: &str, name: &str, parent: &str) -> DriveFile {
    DriveFile {
        id: id.into(),
        name: name.into(),
        mime_type: FOLDER_MIME_TYPE.into(),
        parents: vec![parent.into()],
        modified_time: Some("2024-01-01T00:00:00Z".into()),
    }
}

pub fn drive_file(id: &str, name: &str, parent: &str) -> DriveFile {
    DriveFile {
        id: id.into(),
        name: name.into(),
        mime_type: "application/vnd.google-apps.document".into(),
        parents: vec![parent.into()],
        modified_time: Some("2024-01-01T00:00:00Z".into()),
    }
}

#[derive(Default)]
pub struct FakeDrive {
    children: HashMap<String, Vec<DriveFile>>,
    listed: Mutex<Vec<String>>,
    updates: Mutex<Vec<ParentUpdate>>,
    fail_updates: bool,
    update_delay: Option<Duration>,
}

impl FakeDrive {
    pub fn with_children(mut self, folder_id: &str, files: Vec<DriveFile>) -> Self {
        self.children.insert(folder_id.to_string(), files);
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    pub fn listed_folders(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<ParentUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteDrive for FakeDrive {
    async fn list_children(
        &self,
        folder_id: &str,
        _scope: &DriveScope,
    ) -> Result<Vec<DriveFile>, DriveError> {
        self.listed.lock().unwrap().push(folder_id.to_string());
        Ok(self.children.get(folder_id).cloned().unwrap_or_default())
    }

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.children
            .values()
            .flatten()
            .find(|file| file.id == file_id)
            .cloned()
            .ok_or_else(|| DriveError::Api {
                status: StatusCode::NOT_FOUND,
                body: format!("file {file_id} not found"),
                retry_after: None,
            })
    }

    async fn update_parents(&self, update: &ParentUpdate) -> Result<(), DriveError> {
        self.updates.lock().unwrap().push(update.clone());
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_updates {
            return Err(DriveError::Api {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "backend error".into(),
                retry_after: None,
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    adds: Mutex<Vec<CacheEntry>>,
    purges: Mutex<Vec<PurgeRequest>>,
    fail_adds: bool,
    fail_reads: bool,
}

impl FakeCache {
    pub fn with_entry(self, path: &str, file_id: &str, html: Option<&str>) -> Self {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            CacheEntry {
                path: path.to_string(),
                file_id: file_id.to_string(),
                html: html.map(Into::into),
                modified: 1,
            },
        );
        self
    }

    pub fn failing_adds(mut self) -> Self {
        self.fail_adds = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn adds(&self) -> Vec<CacheEntry> {
        self.adds.lock().unwrap().clone()
    }

    pub fn purges(&self) -> Vec<PurgeRequest> {
        self.purges.lock().unwrap().clone()
    }

    pub fn entry(&self, path: &str) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl PageCache for FakeCache {
    async fn add(
        &self,
        file_id: &str,
        modified: i64,
        path: &str,
        html: Option<&str>,
    ) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry {
            path: path.to_string(),
            file_id: file_id.to_string(),
            html: html.map(Into::into),
            modified,
        };
        self.adds.lock().unwrap().push(entry.clone());
        if self.fail_adds {
            return Err(CacheError::Io(std::io::Error::other("write rejected")));
        }
        validate_path(path)?;
        self.entries
            .lock()
            .unwrap()
            .insert(path.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, path: &str) -> Result<Vec<CacheEntry>, CacheError> {
        if self.fail_reads {
            return Err(CacheError::Io(std::io::Error::other("cache offline")));
        }
        Ok(self.entry(path).into_iter().collect())
    }

    async fn purge(&self, request: &PurgeRequest) -> Result<bool, CacheError> {
        self.purges.lock().unwrap().push(request.clone());
        let mut entries = self.entries.lock().unwrap();
        let stale = entries.get(&request.url).is_some_and(|entry| {
            request
                .modified
                .is_none_or(|modified| entry.modified <= modified)
                && request
                    .file_id
                    .as_ref()
                    .is_none_or(|file_id| &entry.file_id == file_id)
        });
        if stale {
            entries.remove(&request.url);
        }
        Ok(stale)
    }
}

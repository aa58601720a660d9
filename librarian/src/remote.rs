use std::str::FromStr;

use async_trait::async_trait;
use librarian_core::{DriveClient, DriveError, DriveFile, DriveScope, ParentUpdate};
use thiserror::Error;

/// Addressing mode requested by the caller of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveKind {
    #[default]
    Unspecified,
    Team,
    Shared,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown drive kind: {0}")]
pub struct UnknownDriveKind(pub String);

impl DriveKind {
    pub fn scope(&self, drive_id: &str) -> DriveScope {
        match self {
            DriveKind::Team => DriveScope::team_drive(drive_id),
            DriveKind::Shared | DriveKind::Unspecified => DriveScope::default(),
        }
    }
}

impl FromStr for DriveKind {
    type Err = UnknownDriveKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(DriveKind::Unspecified),
            "team" => Ok(DriveKind::Team),
            "shared" => Ok(DriveKind::Shared),
            other => Err(UnknownDriveKind(other.to_string())),
        }
    }
}

/// The slice of the drive API the index and mover depend on.
#[async_trait]
pub trait RemoteDrive: Send + Sync {
    /// Every direct child of `folder_id`, all pages.
    async fn list_children(
        &self,
        folder_id: &str,
        scope: &DriveScope,
    ) -> Result<Vec<DriveFile>, DriveError>;

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError>;

    async fn update_parents(&self, update: &ParentUpdate) -> Result<(), DriveError>;
}

pub struct HttpDrive {
    client: DriveClient,
    page_size: u32,
}

impl HttpDrive {
    pub fn new(client: DriveClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl RemoteDrive for HttpDrive {
    async fn list_children(
        &self,
        folder_id: &str,
        scope: &DriveScope,
    ) -> Result<Vec<DriveFile>, DriveError> {
        self.client
            .list_children_all(folder_id, scope, self.page_size)
            .await
    }

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.client.get_file(file_id).await
    }

    async fn update_parents(&self, update: &ParentUpdate) -> Result<(), DriveError> {
        self.client.update_parents(update).await.map(|_| ())
    }
}

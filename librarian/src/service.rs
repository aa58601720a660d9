use std::sync::Arc;

use anyhow::Context;
use librarian_core::DriveClient;

use crate::cache::{PageCache, SqliteCache};
use crate::config::LibrarianConfig;
use crate::index::{IndexError, MetadataIndex};
use crate::mover::{FileMover, MoveError};
use crate::remote::{DriveKind, HttpDrive, RemoteDrive};
use crate::resolver::{PathResolver, TrashAwareResolver};
use crate::tree::{FolderNode, get_folders};

/// Public surface: folder listing and file moves over one drive.
pub struct Library {
    config: LibrarianConfig,
    remote: Arc<dyn RemoteDrive>,
    index: Arc<MetadataIndex>,
    mover: FileMover,
}

impl Library {
    pub async fn bootstrap(config: LibrarianConfig) -> anyhow::Result<Self> {
        let token = config.token.clone().context("DRIVE_TOKEN is not set")?;
        let client = DriveClient::with_base_url(config.api_base.as_str(), token)?;
        let remote: Arc<dyn RemoteDrive> = Arc::new(HttpDrive::new(client, config.page_size));
        let cache = SqliteCache::open(&config.cache_db)
            .await
            .with_context(|| format!("failed to open cache at {:?}", config.cache_db))?;
        let library = Self::assemble(config, remote, Arc::new(cache))
            .await
            .context("failed to index drive")?;
        Ok(library)
    }

    pub async fn assemble(
        config: LibrarianConfig,
        remote: Arc<dyn RemoteDrive>,
        cache: Arc<dyn PageCache>,
    ) -> Result<Self, IndexError> {
        let scope = config.drive_kind.scope(&config.drive_id);
        let index = Arc::new(
            MetadataIndex::build(
                remote.as_ref(),
                &config.drive_id,
                &config.drive_name,
                &scope,
            )
            .await?,
        );
        let resolver: Arc<dyn PathResolver> = match &config.trash_folder_id {
            Some(trash_id) => Arc::new(TrashAwareResolver::new(index.clone(), trash_id.clone())),
            None => index.clone(),
        };
        let mover = FileMover::new(config.drive_id.clone(), remote.clone(), cache, resolver)
            .with_remote_timeout(config.remote_timeout);
        tracing::info!(
            drive_id = %config.drive_id,
            kind = ?config.drive_kind,
            trash = config.trash_folder_id.is_some(),
            "library ready"
        );

        Ok(Self {
            config,
            remote,
            index,
            mover,
        })
    }

    pub fn config(&self) -> &LibrarianConfig {
        &self.config
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    pub async fn get_folders(&self) -> Vec<FolderNode> {
        get_folders(&self.index).await
    }

    /// `DriveKind::Unspecified` falls back to the configured drive type.
    pub async fn move_file(
        &self,
        file_id: &str,
        destination_id: &str,
        kind: DriveKind,
    ) -> Result<String, MoveError> {
        let kind = match kind {
            DriveKind::Unspecified => self.config.drive_kind,
            explicit => explicit,
        };
        self.admit_destination(destination_id).await;
        self.mover.move_file(file_id, destination_id, kind).await
    }

    /// A destination created after the last index walk is fetched once so the
    /// move does not fall back just because the index is behind.
    async fn admit_destination(&self, destination_id: &str) {
        if self.config.trash_folder_id.as_deref() == Some(destination_id)
            || self.index.get_meta(destination_id).await.is_some()
        {
            return;
        }
        let admitted = tokio::time::timeout(
            self.config.remote_timeout,
            self.index.admit_remote(self.remote.as_ref(), destination_id),
        )
        .await;
        match admitted {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(destination_id, "destination lookup failed: {err}");
            }
            Err(_) => tracing::warn!(destination_id, "destination lookup timed out"),
        }
    }

    pub async fn refresh_index(&self) -> Result<usize, IndexError> {
        let scope = self.config.drive_kind.scope(&self.config.drive_id);
        self.index.refresh(self.remote.as_ref(), &scope).await
    }
}

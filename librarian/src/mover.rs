use std::sync::Arc;
use std::time::Duration;

use librarian_core::ParentUpdate;
use thiserror::Error;
use tokio::time::timeout;

use crate::cache::{CacheLookup, ModifiedClock, PageCache, PurgeRequest};
use crate::locks::KeyedLocks;
use crate::paths::{HOME_PATH, TRASH_PATH, reparented_path};
use crate::remote::{DriveKind, RemoteDrive};
use crate::resolver::PathResolver;

const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller misuse. Every other failure turns into a redirect home.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("{0} has no parent folder")]
    MissingParent(String),
    #[error("the drive root {0} cannot be moved")]
    RootIsSource(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingDestination,
    DestinationNotFolder,
    RemoteUpdateFailure,
    RemoteTimeout,
    CacheReadFailure,
    CacheMissOrEmpty,
    InvalidPath,
    CacheWriteFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: String, to: String },
    Trashed,
    Fallback(FallbackReason),
}

impl MoveOutcome {
    pub fn redirect_path(&self) -> &str {
        match self {
            MoveOutcome::Moved { to, .. } => to,
            MoveOutcome::Trashed | MoveOutcome::Fallback(_) => HOME_PATH,
        }
    }

    pub fn into_redirect_path(self) -> String {
        match self {
            MoveOutcome::Moved { to, .. } => to,
            MoveOutcome::Trashed | MoveOutcome::Fallback(_) => HOME_PATH.to_string(),
        }
    }
}

pub struct FileMover {
    drive_id: String,
    remote: Arc<dyn RemoteDrive>,
    cache: Arc<dyn PageCache>,
    resolver: Arc<dyn PathResolver>,
    locks: KeyedLocks,
    clock: ModifiedClock,
    remote_timeout: Duration,
}

impl FileMover {
    pub fn new(
        drive_id: impl Into<String>,
        remote: Arc<dyn RemoteDrive>,
        cache: Arc<dyn PageCache>,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        Self {
            drive_id: drive_id.into(),
            remote,
            cache,
            resolver,
            locks: KeyedLocks::new(),
            clock: ModifiedClock::new(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.remote_timeout = remote_timeout;
        self
    }

    /// Moves `file_id` under `destination_id` and returns the path to redirect to:
    /// the new path on success, `/` on any recoverable failure.
    pub async fn move_file(
        &self,
        file_id: &str,
        destination_id: &str,
        kind: DriveKind,
    ) -> Result<String, MoveError> {
        self.move_file_detailed(file_id, destination_id, kind)
            .await
            .map(MoveOutcome::into_redirect_path)
    }

    pub async fn move_file_detailed(
        &self,
        file_id: &str,
        destination_id: &str,
        kind: DriveKind,
    ) -> Result<MoveOutcome, MoveError> {
        if file_id == self.drive_id {
            return Err(MoveError::RootIsSource(file_id.to_string()));
        }

        let _guard = self.locks.lock(file_id).await;

        let source = self.resolver.resolve(file_id).await;
        let Some((source, old_parent)) =
            source.and_then(|record| record.parent_id.clone().map(|parent| (record, parent)))
        else {
            return Err(MoveError::MissingParent(file_id.to_string()));
        };

        let Some(destination) = self.resolver.resolve(destination_id).await else {
            return Ok(self.fall_back(file_id, FallbackReason::MissingDestination));
        };
        if destination.path == TRASH_PATH {
            tracing::info!(file_id, "move into trash, skipping remote update");
            return Ok(MoveOutcome::Trashed);
        }
        if !destination.is_folder() {
            return Ok(self.fall_back(file_id, FallbackReason::DestinationNotFolder));
        }

        let update = ParentUpdate {
            file_id: file_id.to_string(),
            add_parents: vec![destination.id.clone()],
            remove_parents: vec![old_parent],
            scope: kind.scope(&self.drive_id),
        };
        match timeout(self.remote_timeout, self.remote.update_parents(&update)).await {
            Err(_) => return Ok(self.fall_back(file_id, FallbackReason::RemoteTimeout)),
            Ok(Err(err)) => {
                tracing::warn!(file_id, class = ?err.classification(), "remote update failed: {err}");
                return Ok(self.fall_back(file_id, FallbackReason::RemoteUpdateFailure));
            }
            Ok(Ok(())) => {}
        }
        if let Err(err) = self.resolver.record_move(file_id, &destination.id).await {
            tracing::warn!(file_id, "index not updated after move: {err}");
        }

        let html = match self.cache.lookup_for(&source.path, file_id).await {
            Ok(CacheLookup::Found(html)) => html,
            Ok(CacheLookup::Miss | CacheLookup::EmptyBody) => {
                return Ok(self.fall_back(file_id, FallbackReason::CacheMissOrEmpty));
            }
            Err(err) => {
                tracing::warn!(file_id, path = %source.path, "cache read failed: {err}");
                return Ok(self.fall_back(file_id, FallbackReason::CacheReadFailure));
            }
        };

        let Ok(new_path) = reparented_path(&source.path, &destination.path) else {
            return Ok(self.fall_back(file_id, FallbackReason::InvalidPath));
        };
        let modified = self.clock.next();
        if let Err(err) = self
            .cache
            .add(file_id, modified, &new_path, Some(&html))
            .await
        {
            tracing::warn!(file_id, path = %new_path, "cache write failed: {err}");
            return Ok(self.fall_back(file_id, FallbackReason::CacheWriteFailure));
        }

        if new_path != source.path {
            let purge = PurgeRequest {
                url: source.path.clone(),
                modified: Some(modified),
                file_id: Some(file_id.to_string()),
            };
            if let Err(err) = self.cache.purge(&purge).await {
                tracing::warn!(file_id, path = %source.path, "stale cache entry kept: {err}");
            }
        }

        tracing::info!(file_id, from = %source.path, to = %new_path, "file moved");
        Ok(MoveOutcome::Moved {
            from: source.path,
            to: new_path,
        })
    }

    fn fall_back(&self, file_id: &str, reason: FallbackReason) -> MoveOutcome {
        tracing::warn!(file_id, ?reason, "move redirected home");
        MoveOutcome::Fallback(reason)
    }
}

#[cfg(test)]
#[path = "mover_tests.rs"]
mod tests;

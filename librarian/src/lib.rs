pub mod cache;
pub mod config;
pub mod index;
pub mod locks;
pub mod logging;
pub mod mover;
pub mod paths;
pub mod remote;
pub mod resolver;
pub mod service;
pub mod tree;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, CacheError, CacheLookup, PageCache, PurgeRequest, SqliteCache};
pub use config::LibrarianConfig;
pub use index::{FileRecord, MetadataIndex};
pub use mover::{FallbackReason, FileMover, MoveError, MoveOutcome};
pub use remote::{DriveKind, HttpDrive, RemoteDrive};
pub use resolver::{PathResolver, TrashAwareResolver};
pub use service::Library;
pub use tree::{FolderNode, FolderTree, TreeEntry};

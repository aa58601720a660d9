use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use url::Url;

use crate::cache::default_db_path;
use crate::remote::DriveKind;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const DEFAULT_DRIVE_NAME: &str = "Home";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u64 = 100;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug)]
pub struct LibrarianConfig {
    pub drive_id: String,
    pub drive_name: String,
    pub drive_kind: DriveKind,
    pub api_base: Url,
    pub token: Option<String>,
    pub trash_folder_id: Option<String>,
    pub cache_db: PathBuf,
    pub remote_timeout: Duration,
    pub page_size: u32,
    pub log_filter: String,
}

impl LibrarianConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let drive_id = read("DRIVE_ID").context("DRIVE_ID is not set")?;
        let drive_name = read("DRIVE_NAME").unwrap_or_else(|| DEFAULT_DRIVE_NAME.to_string());
        let drive_kind = match read("DRIVE_TYPE") {
            Some(value) => value.parse::<DriveKind>()?,
            None => DriveKind::Shared,
        };
        let api_base = read("DRIVE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base =
            Url::parse(&api_base).with_context(|| format!("invalid DRIVE_API_BASE {api_base}"))?;
        let cache_db = match read("LIBRARIAN_CACHE_DB") {
            Some(value) => match dirs::home_dir() {
                Some(home) => expand_with_home(&value, &home),
                None => PathBuf::from(value),
            },
            None => default_db_path().context("data directory is unavailable")?,
        };
        let remote_timeout = Duration::from_secs(read_u64(
            read("LIBRARIAN_REMOTE_TIMEOUT_SECS"),
            DEFAULT_REMOTE_TIMEOUT_SECS,
        ));
        let page_size = read_u64(read("LIBRARIAN_PAGE_SIZE"), DEFAULT_PAGE_SIZE)
            .min(u64::from(u32::MAX)) as u32;

        Ok(Self {
            drive_id,
            drive_name,
            drive_kind,
            api_base,
            token: read("DRIVE_TOKEN"),
            trash_folder_id: read("TRASH_FOLDER_ID"),
            cache_db,
            remote_timeout,
            page_size,
            log_filter: read("LIBRARIAN_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<LibrarianConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        LibrarianConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn requires_drive_id() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DRIVE_ID"));
    }

    #[test]
    fn applies_defaults() {
        let config =
            config_from(&[("DRIVE_ID", "root-1"), ("LIBRARIAN_CACHE_DB", "/tmp/c.db")]).unwrap();

        assert_eq!(config.drive_id, "root-1");
        assert_eq!(config.drive_name, "Home");
        assert_eq!(config.drive_kind, DriveKind::Shared);
        assert_eq!(config.api_base.as_str(), "https://www.googleapis.com/");
        assert_eq!(config.remote_timeout, Duration::from_secs(30));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.log_filter, "info");
        assert!(config.token.is_none());
        assert!(config.trash_folder_id.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DRIVE_ID", "root-1"),
            ("DRIVE_TYPE", "team"),
            ("DRIVE_NAME", "Library"),
            ("DRIVE_TOKEN", "secret"),
            ("TRASH_FOLDER_ID", "trash-id"),
            ("LIBRARIAN_CACHE_DB", "/tmp/c.db"),
            ("LIBRARIAN_REMOTE_TIMEOUT_SECS", "5"),
            ("LIBRARIAN_PAGE_SIZE", "0"),
        ])
        .unwrap();

        assert_eq!(config.drive_kind, DriveKind::Team);
        assert_eq!(config.drive_name, "Library");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.trash_folder_id.as_deref(), Some("trash-id"));
        assert_eq!(config.cache_db, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn rejects_unknown_drive_type() {
        let err = config_from(&[
            ("DRIVE_ID", "root-1"),
            ("DRIVE_TYPE", "personal"),
            ("LIBRARIAN_CACHE_DB", "/tmp/c.db"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("personal"));
    }

    #[test]
    fn expands_home_prefix() {
        let home = PathBuf::from("/home/reader");
        assert_eq!(
            expand_with_home("~/cache.db", &home),
            PathBuf::from("/home/reader/cache.db")
        );
        assert_eq!(expand_with_home("~", &home), home);
        assert_eq!(
            expand_with_home("/var/cache.db", &home),
            PathBuf::from("/var/cache.db")
        );
    }
}

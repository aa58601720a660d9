use thiserror::Error;

pub const HOME_PATH: &str = "/";
pub const TRASH_PATH: &str = "/trash";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path must be absolute: {0}")]
    NotAbsolute(String),
    #[error("path contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("path has no leaf segment: {0}")]
    NoLeaf(String),
}

/// Turns a drive item name into a path segment ("Article 21.2" -> "article-21-2").
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Path segment for an indexed item. Names without any alphanumerics fall back
/// to `untitled-<id>` so a segment never collapses into its parent's path.
pub fn path_segment(name: &str, id: &str) -> String {
    let slug = slugify(name);
    if !slug.is_empty() {
        return slug;
    }
    match slugify(id) {
        id_slug if id_slug.is_empty() => "untitled".to_string(),
        id_slug => format!("untitled-{id_slug}"),
    }
}

pub fn join_path(parent: &str, segment: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{segment}")
}

pub fn leaf_segment(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Path the item at `old_path` gets once it lives under `destination_path`.
pub fn reparented_path(old_path: &str, destination_path: &str) -> Result<String, PathError> {
    validate_path(old_path)?;
    validate_path(destination_path)?;
    let leaf = leaf_segment(old_path).ok_or_else(|| PathError::NoLeaf(old_path.to_string()))?;
    Ok(join_path(destination_path, leaf))
}

/// Checks a cache key: absolute, slash separated, no empty or relative segments.
pub fn validate_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PathError::NotAbsolute(path.to_string()));
    };
    if rest.is_empty() {
        return Ok(());
    }
    for segment in rest.trim_end_matches('/').split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PathError::UnsupportedComponent(path.to_string()));
        }
    }
    Ok(())
}

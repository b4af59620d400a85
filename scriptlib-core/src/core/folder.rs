//! Folder value type and name validation.

use crate::{Result, ScriptLibError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when joining folder names into a materialized path.
pub const PATH_SEPARATOR: char = '/';

/// A named container node in the script hierarchy.
///
/// `path` is derived data: the manager recomputes it from `name` and the live
/// parent chain on every write, so the value a caller passes in is never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Store-assigned identity; `None` until first persisted.
    pub id: Option<i64>,
    pub name: String,
    /// Parent folder, or `None` for a root-level folder.
    pub parent_id: Option<i64>,
    /// Materialized absolute path, e.g. `/Ops/Deploy`.
    pub path: String,
    pub created_date: DateTime<Utc>,
}

impl Folder {
    /// Builds an unpersisted folder with the given path and creation time.
    pub fn new(name: impl Into<String>, parent_id: Option<i64>, path: String, created_date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent_id,
            path,
            created_date,
        }
    }

    /// Returns `true` for folders placed directly under the library root.
    pub fn is_root_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Joins `name` onto `parent_path`, or onto the root when there is no parent.
pub fn join_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{parent}{PATH_SEPARATOR}{name}"),
        None => format!("{PATH_SEPARATOR}{name}"),
    }
}

/// Checks that `name` is usable as a folder name.
///
/// # Errors
///
/// Returns [`ScriptLibError::InvalidArgument`] if the name is blank or
/// contains the path separator.
pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ScriptLibError::InvalidArgument(
            "Folder name must not be empty".to_string(),
        ));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(ScriptLibError::InvalidArgument(format!(
            "Folder name '{name}' must not contain '{PATH_SEPARATOR}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path_root_and_nested() {
        assert_eq!(join_path(None, "Ops"), "/Ops");
        assert_eq!(join_path(Some("/Ops"), "Deploy"), "/Ops/Deploy");
    }

    #[test]
    fn test_validate_folder_name() {
        assert!(validate_folder_name("Ops").is_ok());
        assert!(validate_folder_name("").is_err());
        assert!(validate_folder_name("   ").is_err());
        assert!(validate_folder_name("a/b").is_err());
    }

    #[test]
    fn test_new_folder_is_unpersisted() {
        let folder = Folder::new("Ops", None, "/Ops".to_string(), Utc::now());
        assert!(folder.id.is_none());
        assert!(folder.is_root_level());
    }
}

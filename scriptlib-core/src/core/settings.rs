//! Library settings persistence.
//!
//! Stores user preferences (database location, naming and search policies) in
//! a JSON file at an OS-appropriate location.

use crate::{MatchCase, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the library database inside the default data directory.
pub const DEFAULT_DATABASE_FILE: &str = "script_library.db";

/// How a name collision among items sharing a parent is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiblingNamePolicy {
    /// Duplicate names are allowed.
    #[default]
    Permit,
    /// A duplicate name fails with [`ScriptLibError::DuplicateName`](crate::ScriptLibError::DuplicateName).
    Reject,
    /// A duplicate name gets the first free ` (n)` suffix, starting at 2.
    AutoSuffix,
}

/// Persisted library settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibrarySettings {
    /// Location of the SQLite library database.
    pub database_path: String,
    pub sibling_name_policy: SiblingNamePolicy,
    pub case_sensitive_search: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path().to_string_lossy().to_string(),
            sibling_name_policy: SiblingNamePolicy::default(),
            case_sensitive_search: false,
        }
    }
}

impl LibrarySettings {
    pub fn match_case(&self) -> MatchCase {
        if self.case_sensitive_search {
            MatchCase::Sensitive
        } else {
            MatchCase::Insensitive
        }
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/script-library/settings.json`
/// - Windows: `%APPDATA%/ScriptLibrary/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("ScriptLibrary").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("script-library").join("settings.json")
    }
}

/// Returns the default database location: `~/Documents/ScriptLibrary/script_library.db`.
pub fn default_database_path() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Documents")
        })
        .join("ScriptLibrary")
        .join(DEFAULT_DATABASE_FILE)
}

/// Loads settings from the default location; see [`load_settings_from`].
pub fn load_settings() -> LibrarySettings {
    load_settings_from(settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from<P: AsRef<Path>>(path: P) -> LibrarySettings {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings file {}: {e}", path.display());
            LibrarySettings::default()
        }),
        Err(_) => LibrarySettings::default(),
    }
}

/// Saves settings to the default location; see [`save_settings_to`].
pub fn save_settings(settings: &LibrarySettings) -> Result<()> {
    save_settings_to(settings_file_path(), settings)
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to<P: AsRef<Path>>(path: P, settings: &LibrarySettings) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

//! Script value type and its enumerated metadata.

use crate::{Result, ScriptLibError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment stage a script is intended for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentTag {
    #[default]
    Testing,
    Production,
}

impl EnvironmentTag {
    /// Textual form used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "Testing",
            Self::Production => "Production",
        }
    }
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentTag {
    type Err = ScriptLibError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Testing" => Ok(Self::Testing),
            "Production" => Ok(Self::Production),
            other => Err(ScriptLibError::InvalidArgument(format!(
                "Unknown environment tag '{other}'"
            ))),
        }
    }
}

/// Script dialect; decides the file extension and editor highlighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Ps1,
    Bat,
}

impl FileType {
    /// Textual form used in storage (`"ps1"` / `"bat"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ps1 => "ps1",
            Self::Bat => "bat",
        }
    }

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ps1 => ".ps1",
            Self::Bat => ".bat",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ScriptLibError;

    /// Accepts `ps1`/`bat` with or without a leading dot, in any case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ps1" => Ok(Self::Ps1),
            "bat" => Ok(Self::Bat),
            _ => Err(ScriptLibError::InvalidArgument(format!(
                "Unknown file type '{s}', expected ps1 or bat"
            ))),
        }
    }
}

/// A leaf document with text content and metadata, optionally placed in a folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Store-assigned identity; `None` until first persisted.
    pub id: Option<i64>,
    /// Display name without extension.
    pub name: String,
    /// Containing folder, or `None` for root-level placement.
    pub folder_id: Option<i64>,
    pub content: String,
    pub description: String,
    pub author: String,
    pub environment_tag: EnvironmentTag,
    pub file_type: FileType,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    pub last_opened_date: DateTime<Utc>,
}

impl Script {
    /// Returns the display file name, e.g. `deploy.ps1`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.file_type.extension())
    }
}

/// Checks that `name` is usable as a script name.
///
/// # Errors
///
/// Returns [`ScriptLibError::InvalidArgument`] if the name is blank.
pub fn validate_script_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ScriptLibError::InvalidArgument(
            "Script name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_parsing() {
        assert_eq!("ps1".parse::<FileType>().unwrap(), FileType::Ps1);
        assert_eq!(".BAT".parse::<FileType>().unwrap(), FileType::Bat);
        assert!("sh".parse::<FileType>().is_err());
    }

    #[test]
    fn test_environment_tag_parsing() {
        assert_eq!("Production".parse::<EnvironmentTag>().unwrap(), EnvironmentTag::Production);
        assert_eq!(EnvironmentTag::default(), EnvironmentTag::Testing);
        let err = "Staging".parse::<EnvironmentTag>().unwrap_err();
        assert!(matches!(err, ScriptLibError::InvalidArgument(_)));
    }

    #[test]
    fn test_file_name_uses_extension() {
        let now = Utc::now();
        let script = Script {
            id: Some(1),
            name: "cleanup".to_string(),
            folder_id: None,
            content: String::new(),
            description: String::new(),
            author: String::new(),
            environment_tag: EnvironmentTag::Testing,
            file_type: FileType::Bat,
            created_date: now,
            modified_date: now,
            last_opened_date: now,
        };
        assert_eq!(script.file_name(), "cleanup.bat");
    }

    #[test]
    fn test_file_type_serializes_lowercase() {
        let json = serde_json::to_string(&FileType::Ps1).unwrap();
        assert_eq!(json, r#""ps1""#);
    }
}

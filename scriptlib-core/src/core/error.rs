//! Error types for the Script Library core library.

use thiserror::Error;

/// All errors that can occur within the Script Library core library.
#[derive(Debug, Error)]
pub enum ScriptLibError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A non-SQLite store reported a fault, or stored data could not be decoded.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A folder or script ID was referenced that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A reparent would make a folder its own ancestor.
    #[error("Circular reference: {0}")]
    CircularReference(String),

    /// A folder still holds child folders or scripts and cannot be deleted.
    #[error("Folder {0} is not empty")]
    NonEmptyFolder(i64),

    /// A name, enum value, or entity passed in was not acceptable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A sibling already carries this name and the active policy rejects duplicates.
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`ScriptLibError`].
pub type Result<T> = std::result::Result<T, ScriptLibError>;

impl ScriptLibError {
    /// Returns `true` for faults raised by the backing store rather than by validation.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_) | Self::Io(_))
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Storage(e) => format!("Failed to save: {e}"),
            Self::NotFound(_) => "Item no longer exists".to_string(),
            Self::CircularReference(_) => {
                "A folder cannot be moved into itself or one of its subfolders".to_string()
            }
            Self::NonEmptyFolder(_) => {
                "Folder is not empty. Delete or move its contents first.".to_string()
            }
            Self::InvalidArgument(msg) => msg.clone(),
            Self::DuplicateName(name) => format!("An item named '{name}' already exists here"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Settings format error: {e}"),
        }
    }
}

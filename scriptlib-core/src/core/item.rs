//! Tagged variants for tree entries that may be either a folder or a script.

use crate::{Folder, Script};
use serde::{Deserialize, Serialize};

/// A tree entry handed to the presentation layer.
///
/// Serialized with a `kind` tag so a front-end can switch on
/// `"folder"` / `"script"` without a mapping layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item", rename_all = "camelCase")]
pub enum LibraryItem {
    Folder(Folder),
    Script(Script),
}

impl LibraryItem {
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(f) => &f.name,
            Self::Script(s) => &s.name,
        }
    }

    /// Identity-only reference to this item, if it has been persisted.
    pub fn item_ref(&self) -> Option<ItemRef> {
        match self {
            Self::Folder(f) => f.id.map(ItemRef::Folder),
            Self::Script(s) => s.id.map(ItemRef::Script),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// Identifies a folder or script by ID, e.g. for a drag-and-drop move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ItemRef {
    Folder(i64),
    Script(i64),
}

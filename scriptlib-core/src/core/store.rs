//! The persistence port consumed by [`ScriptManager`](crate::ScriptManager).
//!
//! A [`LibraryStore`] provides durable, key-indexed CRUD over folders and
//! scripts. It knows nothing about materialized paths, cycles, or caching;
//! those invariants belong to the manager. Two adapters ship with the crate:
//! [`Storage`](crate::Storage) (SQLite) and [`MemoryStore`](crate::MemoryStore).

use crate::{Folder, Result, Script};
use chrono::{DateTime, Utc};

/// Case policy for [`LibraryStore::search_scripts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchCase {
    #[default]
    Insensitive,
    Sensitive,
}

/// Outcome of [`LibraryStore::delete_empty_folder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRemoval {
    Deleted,
    NotFound,
    /// The folder gained a child or script between the manager's check and the delete.
    NotEmpty,
}

/// Durable storage for folder and script records.
///
/// Listing methods return records ordered by name. Methods returning `bool`
/// report whether a row with the given ID existed.
pub trait LibraryStore {
    /// Inserts `folder` (its `id` is ignored) and returns the assigned ID.
    fn create_folder(&mut self, folder: &Folder) -> Result<i64>;

    fn get_folder(&self, id: i64) -> Result<Option<Folder>>;

    fn get_all_folders(&self) -> Result<Vec<Folder>>;

    /// Direct children of `parent_id`; `None` selects root-level folders.
    fn get_child_folders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>>;

    /// Writes `name`, `parent_id` and `path` of an existing folder.
    fn update_folder(&mut self, folder: &Folder) -> Result<bool>;

    /// Writes every folder in `folders` atomically.
    ///
    /// Fails with [`ScriptLibError::NotFound`](crate::ScriptLibError::NotFound)
    /// and writes nothing if any of them does not exist.
    fn update_folders(&mut self, folders: &[Folder]) -> Result<()>;

    /// Deletes a folder, cascading to every folder and script it contains.
    fn delete_folder(&mut self, id: i64) -> Result<bool>;

    /// Deletes a folder only if it has no child folders and no scripts.
    ///
    /// The emptiness check and the delete happen in one atomic step.
    fn delete_empty_folder(&mut self, id: i64) -> Result<FolderRemoval>;

    /// Inserts `script` (its `id` is ignored) and returns the assigned ID.
    fn create_script(&mut self, script: &Script) -> Result<i64>;

    fn get_script(&self, id: i64) -> Result<Option<Script>>;

    /// Scripts directly in `folder_id`; `None` selects root-level scripts.
    fn get_scripts_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Script>>;

    /// Writes every mutable field of an existing script, including the
    /// `modified_date` stamped by the caller. `created_date` is never rewritten.
    fn update_script(&mut self, script: &Script) -> Result<bool>;

    /// Writes only `last_opened_date`.
    fn update_script_last_opened(&mut self, id: i64, opened_at: DateTime<Utc>) -> Result<bool>;

    fn delete_script(&mut self, id: i64) -> Result<bool>;

    /// Scripts whose name, content or description contains `query` literally.
    fn search_scripts(&self, query: &str, case: MatchCase) -> Result<Vec<Script>>;
}

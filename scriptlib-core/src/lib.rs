//! Core library for Script Library, a hierarchical store of PowerShell and
//! Batch scripts organized into nested folders.
//!
//! The primary entry point is [`ScriptManager`], which owns an in-memory cache
//! in front of a [`LibraryStore`]. All reads and mutations of folders and
//! scripts go through `ScriptManager` methods.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    error::{Result, ScriptLibError},
    folder::Folder,
    item::{ItemRef, LibraryItem},
    manager::{FolderTree, NewScript, ScriptManager},
    memory::MemoryStore,
    script::{EnvironmentTag, FileType, Script},
    settings::{
        default_database_path, load_settings, load_settings_from, save_settings, save_settings_to,
        settings_file_path, LibrarySettings, SiblingNamePolicy,
    },
    storage::Storage,
    store::{FolderRemoval, LibraryStore, MatchCase},
};

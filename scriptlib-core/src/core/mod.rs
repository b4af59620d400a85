//! Internal domain modules for the Script Library core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod error;
pub mod folder;
pub mod item;
pub mod manager;
pub mod memory;
pub mod script;
pub mod settings;
pub mod storage;
pub mod store;

#[doc(inline)]
pub use error::{Result, ScriptLibError};
#[doc(inline)]
pub use folder::Folder;
#[doc(inline)]
pub use item::{ItemRef, LibraryItem};
#[doc(inline)]
pub use manager::{FolderTree, NewScript, ScriptManager};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use script::{EnvironmentTag, FileType, Script};
#[doc(inline)]
pub use settings::{LibrarySettings, SiblingNamePolicy};
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use store::{FolderRemoval, LibraryStore, MatchCase};

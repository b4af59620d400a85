//! In-memory [`LibraryStore`] for tests and file-less embedding.

use crate::{Folder, FolderRemoval, LibraryStore, MatchCase, Result, Script, ScriptLibError};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Keeps folder and script records in ordered maps.
///
/// Mirrors the SQLite adapter's observable behavior: name ordering, cascading
/// folder deletes, ASCII-only case folding for insensitive search. Write
/// failures can be simulated to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    folders: BTreeMap<i64, Folder>,
    scripts: BTreeMap<i64, Script>,
    next_folder_id: i64,
    next_script_id: i64,
    simulate_write_error: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`ScriptLibError::Storage`].
    pub fn set_simulate_write_error(&mut self, simulate: bool) {
        self.simulate_write_error = simulate;
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error {
            return Err(ScriptLibError::Storage("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn sorted_folders<'a>(&self, folders: impl Iterator<Item = &'a Folder>) -> Vec<Folder> {
        let mut out: Vec<Folder> = folders.cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    fn sorted_scripts<'a>(&self, scripts: impl Iterator<Item = &'a Script>) -> Vec<Script> {
        let mut out: Vec<Script> = scripts.cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }
}

impl LibraryStore for MemoryStore {
    fn create_folder(&mut self, folder: &Folder) -> Result<i64> {
        self.check_writable()?;
        self.next_folder_id += 1;
        let id = self.next_folder_id;
        self.folders.insert(id, Folder { id: Some(id), ..folder.clone() });
        Ok(id)
    }

    fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        Ok(self.folders.get(&id).cloned())
    }

    fn get_all_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.sorted_folders(self.folders.values()))
    }

    fn get_child_folders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        Ok(self.sorted_folders(self.folders.values().filter(|f| f.parent_id == parent_id)))
    }

    fn update_folder(&mut self, folder: &Folder) -> Result<bool> {
        self.check_writable()?;
        let Some(stored) = folder.id.and_then(|id| self.folders.get_mut(&id)) else {
            return Ok(false);
        };
        stored.name = folder.name.clone();
        stored.parent_id = folder.parent_id;
        stored.path = folder.path.clone();
        Ok(true)
    }

    fn update_folders(&mut self, folders: &[Folder]) -> Result<()> {
        self.check_writable()?;
        for folder in folders {
            match folder.id {
                Some(id) if self.folders.contains_key(&id) => {}
                Some(id) => return Err(ScriptLibError::NotFound(format!("folder {id}"))),
                None => {
                    return Err(ScriptLibError::InvalidArgument(
                        "folder has not been persisted".to_string(),
                    ))
                }
            }
        }
        for folder in folders {
            self.update_folder(folder)?;
        }
        Ok(())
    }

    fn delete_folder(&mut self, id: i64) -> Result<bool> {
        self.check_writable()?;
        if !self.folders.contains_key(&id) {
            return Ok(false);
        }

        // Collect the whole subtree, then drop it along with its scripts.
        let mut doomed: HashSet<i64> = HashSet::from([id]);
        let mut worklist = vec![id];
        while let Some(current) = worklist.pop() {
            for (child_id, child) in &self.folders {
                if child.parent_id == Some(current) && doomed.insert(*child_id) {
                    worklist.push(*child_id);
                }
            }
        }
        self.folders.retain(|fid, _| !doomed.contains(fid));
        self.scripts
            .retain(|_, s| !s.folder_id.is_some_and(|fid| doomed.contains(&fid)));
        Ok(true)
    }

    fn delete_empty_folder(&mut self, id: i64) -> Result<FolderRemoval> {
        self.check_writable()?;
        if !self.folders.contains_key(&id) {
            return Ok(FolderRemoval::NotFound);
        }
        let has_children = self.folders.values().any(|f| f.parent_id == Some(id));
        let has_scripts = self.scripts.values().any(|s| s.folder_id == Some(id));
        if has_children || has_scripts {
            return Ok(FolderRemoval::NotEmpty);
        }
        self.folders.remove(&id);
        Ok(FolderRemoval::Deleted)
    }

    fn create_script(&mut self, script: &Script) -> Result<i64> {
        self.check_writable()?;
        self.next_script_id += 1;
        let id = self.next_script_id;
        self.scripts.insert(id, Script { id: Some(id), ..script.clone() });
        Ok(id)
    }

    fn get_script(&self, id: i64) -> Result<Option<Script>> {
        Ok(self.scripts.get(&id).cloned())
    }

    fn get_scripts_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Script>> {
        Ok(self.sorted_scripts(self.scripts.values().filter(|s| s.folder_id == folder_id)))
    }

    fn update_script(&mut self, script: &Script) -> Result<bool> {
        self.check_writable()?;
        let Some(stored) = script.id.and_then(|id| self.scripts.get_mut(&id)) else {
            return Ok(false);
        };
        *stored = Script {
            created_date: stored.created_date,
            ..script.clone()
        };
        Ok(true)
    }

    fn update_script_last_opened(&mut self, id: i64, opened_at: DateTime<Utc>) -> Result<bool> {
        self.check_writable()?;
        match self.scripts.get_mut(&id) {
            Some(stored) => {
                stored.last_opened_date = opened_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_script(&mut self, id: i64) -> Result<bool> {
        self.check_writable()?;
        Ok(self.scripts.remove(&id).is_some())
    }

    fn search_scripts(&self, query: &str, case: MatchCase) -> Result<Vec<Script>> {
        let fold = |s: &str| match case {
            MatchCase::Insensitive => s.to_ascii_lowercase(),
            MatchCase::Sensitive => s.to_string(),
        };
        let needle = fold(query);
        let hits = self.scripts.values().filter(|s| {
            fold(&s.name).contains(&needle)
                || fold(&s.content).contains(&needle)
                || fold(&s.description).contains(&needle)
        });
        Ok(self.sorted_scripts(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnvironmentTag, FileType};

    fn folder(name: &str, parent_id: Option<i64>) -> Folder {
        Folder::new(name, parent_id, format!("/{name}"), Utc::now())
    }

    fn script(name: &str, folder_id: Option<i64>) -> Script {
        let now = Utc::now();
        Script {
            id: None,
            name: name.to_string(),
            folder_id,
            content: String::new(),
            description: String::new(),
            author: String::new(),
            environment_tag: EnvironmentTag::Testing,
            file_type: FileType::Ps1,
            created_date: now,
            modified_date: now,
            last_opened_date: now,
        }
    }

    #[test]
    fn test_ids_are_assigned_sequentially() {
        let mut store = MemoryStore::new();
        assert_eq!(store.create_folder(&folder("A", None)).unwrap(), 1);
        assert_eq!(store.create_folder(&folder("B", None)).unwrap(), 2);
        assert_eq!(store.create_script(&script("s", None)).unwrap(), 1);
    }

    #[test]
    fn test_delete_folder_cascades_through_subtree() {
        let mut store = MemoryStore::new();
        let a = store.create_folder(&folder("A", None)).unwrap();
        let b = store.create_folder(&folder("B", Some(a))).unwrap();
        let c = store.create_folder(&folder("C", Some(b))).unwrap();
        let kept = store.create_folder(&folder("Kept", None)).unwrap();
        let s = store.create_script(&script("s", Some(c))).unwrap();

        assert!(store.delete_folder(a).unwrap());
        assert!(store.get_folder(c).unwrap().is_none());
        assert!(store.get_script(s).unwrap().is_none());
        assert!(store.get_folder(kept).unwrap().is_some());
    }

    #[test]
    fn test_simulated_write_error_blocks_writes_but_not_reads() {
        let mut store = MemoryStore::new();
        let id = store.create_folder(&folder("A", None)).unwrap();
        store.set_simulate_write_error(true);

        assert!(store.create_folder(&folder("B", None)).is_err());
        assert!(store.delete_folder(id).is_err());
        assert!(store.get_folder(id).unwrap().is_some());
    }

    #[test]
    fn test_update_folders_validates_before_writing() {
        let mut store = MemoryStore::new();
        let id = store.create_folder(&folder("A", None)).unwrap();
        let mut renamed = store.get_folder(id).unwrap().unwrap();
        renamed.name = "Renamed".to_string();
        let ghost = Folder { id: Some(99), ..renamed.clone() };

        assert!(store.update_folders(&[renamed, ghost]).is_err());
        assert_eq!(store.get_folder(id).unwrap().unwrap().name, "A");
    }
}

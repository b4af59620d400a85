//! The hierarchical content manager: the single entry point for reading and
//! mutating folders and scripts.

use crate::core::folder::{join_path, validate_folder_name};
use crate::core::script::validate_script_name;
use crate::{
    EnvironmentTag, FileType, Folder, FolderRemoval, ItemRef, LibraryItem, LibrarySettings,
    LibraryStore, MatchCase, Result, Script, ScriptLibError, SiblingNamePolicy, Storage,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

/// One-level adjacency index over all folders, keyed by `parent_id`
/// (`None` holds the root-level folders). Each group is ordered by name.
pub type FolderTree = HashMap<Option<i64>, Vec<Folder>>;

/// Everything needed to create a script; unset metadata falls back to defaults.
#[derive(Debug, Clone, Default)]
pub struct NewScript {
    pub name: String,
    pub folder_id: Option<i64>,
    pub file_type: FileType,
    pub content: String,
    pub description: String,
    pub author: String,
    pub environment_tag: EnvironmentTag,
}

/// Owns a read-through / write-through cache in front of a [`LibraryStore`].
///
/// The caches are plain maps keyed by ID with no eviction policy; entries only
/// leave on delete or [`clear_cache`](Self::clear_cache). Every mutation writes
/// to the store first and touches the cache only after the store reports
/// success, so a failed write leaves the cache exactly as it was.
///
/// Methods that may fill the cache take `&mut self`. A manager shared between
/// threads must sit behind a single `Mutex`, which then guards both caches and
/// the store together.
pub struct ScriptManager<S: LibraryStore> {
    store: S,
    folder_cache: HashMap<i64, Folder>,
    script_cache: HashMap<i64, Script>,
    name_policy: SiblingNamePolicy,
    match_case: MatchCase,
}

impl ScriptManager<Storage> {
    /// Opens (or creates) the SQLite library named in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::Database`] or [`ScriptLibError::Io`] if the
    /// database cannot be opened or its directory cannot be created.
    pub fn open(settings: &LibrarySettings) -> Result<Self> {
        let storage = Storage::open_or_create(&settings.database_path)?;
        Ok(Self::with_settings(storage, settings))
    }
}

impl<S: LibraryStore> ScriptManager<S> {
    /// Wraps `store` with an empty cache and default policies.
    pub fn new(store: S) -> Self {
        Self {
            store,
            folder_cache: HashMap::new(),
            script_cache: HashMap::new(),
            name_policy: SiblingNamePolicy::default(),
            match_case: MatchCase::default(),
        }
    }

    /// Wraps `store` and applies the naming and search policies from `settings`.
    pub fn with_settings(store: S, settings: &LibrarySettings) -> Self {
        let mut manager = Self::new(store);
        manager.name_policy = settings.sibling_name_policy;
        manager.match_case = settings.match_case();
        manager
    }

    pub fn set_sibling_name_policy(&mut self, policy: SiblingNamePolicy) {
        self.name_policy = policy;
    }

    pub fn set_match_case(&mut self, case: MatchCase) {
        self.match_case = case;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the manager and hands back the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Drops every cached entry; later reads go back to the store.
    pub fn clear_cache(&mut self) {
        self.folder_cache.clear();
        self.script_cache.clear();
    }

    pub fn cached_folder_count(&self) -> usize {
        self.folder_cache.len()
    }

    pub fn cached_script_count(&self) -> usize {
        self.script_cache.len()
    }

    // ── Folders ───────────────────────────────────────────────────

    /// Creates a folder under `parent_id` (or at root level) and caches it.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::InvalidArgument`] for a blank name or one
    /// containing `/`, [`ScriptLibError::NotFound`] if `parent_id` does not
    /// exist, [`ScriptLibError::DuplicateName`] under the `Reject` policy, or
    /// a storage error if the insert fails.
    pub fn create_folder(&mut self, name: &str, parent_id: Option<i64>) -> Result<Folder> {
        validate_folder_name(name)?;
        let parent_path = self.parent_path(parent_id)?;
        let name = self.resolve_folder_name(name, parent_id, None)?;
        let path = join_path(parent_path.as_deref(), &name);

        let mut folder = Folder::new(name, parent_id, path, now());
        let id = self.store.create_folder(&folder)?;
        folder.id = Some(id);

        self.folder_cache.insert(id, folder.clone());
        log::info!("Created folder {id} at {}", folder.path);
        Ok(folder)
    }

    /// Returns the folder with `id`, reading through to the store on a cache miss.
    ///
    /// An unknown ID is `Ok(None)`, not an error.
    pub fn get_folder(&mut self, id: i64) -> Result<Option<Folder>> {
        if let Some(folder) = self.folder_cache.get(&id) {
            log::debug!("Folder cache hit for {id}");
            return Ok(Some(folder.clone()));
        }
        log::debug!("Folder cache miss for {id}");
        let folder = self.store.get_folder(id)?;
        if let Some(ref found) = folder {
            self.folder_cache.insert(id, found.clone());
        }
        Ok(folder)
    }

    /// Writes `folder`'s name and parent, recomputing its path and every descendant path.
    ///
    /// The passed-in `path` and `created_date` are ignored. The folder and its
    /// whole subtree are written as one atomic batch; the cache is refreshed
    /// only after the batch commits.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::InvalidArgument`] if the folder has no ID or
    /// an invalid name, [`ScriptLibError::NotFound`] if it or its new parent
    /// does not exist, [`ScriptLibError::CircularReference`] if the new parent
    /// lies inside its own subtree, or a storage error.
    pub fn update_folder(&mut self, folder: Folder) -> Result<Folder> {
        let id = folder.id.ok_or_else(|| {
            ScriptLibError::InvalidArgument("Folder has not been persisted".to_string())
        })?;
        validate_folder_name(&folder.name)?;
        let existing = self.require_folder(id)?;
        let parent_path = self.parent_path(folder.parent_id)?;
        self.check_no_cycle(id, folder.parent_id)?;
        let name = self.resolve_folder_name(&folder.name, folder.parent_id, Some(id))?;

        let updated = Folder {
            id: Some(id),
            path: join_path(parent_path.as_deref(), &name),
            name,
            parent_id: folder.parent_id,
            created_date: existing.created_date,
        };

        let batch = self.rebuild_subtree_paths(&updated)?;
        self.store.update_folders(&batch)?;

        log::debug!("Rewrote {} folder path(s) under {}", batch.len(), updated.path);
        for rewritten in batch {
            if let Some(fid) = rewritten.id {
                self.folder_cache.insert(fid, rewritten);
            }
        }
        Ok(updated)
    }

    /// Deletes an empty folder.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::NonEmptyFolder`] if the folder still holds a
    /// child folder or a script (nothing is deleted), [`ScriptLibError::NotFound`]
    /// if it does not exist, or a storage error.
    pub fn delete_folder(&mut self, id: i64) -> Result<()> {
        self.require_folder(id)?;

        let has_children = !self.store.get_child_folders(Some(id))?.is_empty();
        let has_scripts = !self.store.get_scripts_by_folder(Some(id))?.is_empty();
        if has_children || has_scripts {
            log::warn!("Refusing to delete non-empty folder {id}");
            return Err(ScriptLibError::NonEmptyFolder(id));
        }

        // The store re-checks emptiness inside the delete transaction.
        match self.store.delete_empty_folder(id)? {
            FolderRemoval::Deleted => {
                self.folder_cache.remove(&id);
                log::info!("Deleted folder {id}");
                Ok(())
            }
            FolderRemoval::NotEmpty => {
                log::warn!("Folder {id} gained contents before it could be deleted");
                Err(ScriptLibError::NonEmptyFolder(id))
            }
            FolderRemoval::NotFound => {
                self.folder_cache.remove(&id);
                Err(ScriptLibError::NotFound(format!("folder {id}")))
            }
        }
    }

    /// Reparents folder `id` under `new_parent_id` (or to root level).
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::CircularReference`] without writing anything
    /// if `new_parent_id` is `id` itself or one of its descendants; otherwise
    /// fails as [`update_folder`](Self::update_folder) does.
    pub fn move_folder(&mut self, id: i64, new_parent_id: Option<i64>) -> Result<Folder> {
        let folder = self.require_folder(id)?;
        self.check_no_cycle(id, new_parent_id)?;
        let moved = self.update_folder(Folder {
            parent_id: new_parent_id,
            ..folder
        })?;
        log::info!("Moved folder {id} to {}", moved.path);
        Ok(moved)
    }

    /// Returns every folder ordered by name and refreshes the cache with all of them.
    pub fn get_all_folders(&mut self) -> Result<Vec<Folder>> {
        let folders = self.store.get_all_folders()?;
        for folder in &folders {
            if let Some(id) = folder.id {
                self.folder_cache.insert(id, folder.clone());
            }
        }
        Ok(folders)
    }

    /// Direct children of `parent_id` ordered by name; `None` selects root-level folders.
    pub fn get_child_folders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        self.store.get_child_folders(parent_id)
    }

    /// Groups all folders by parent in a single store read.
    pub fn get_folder_tree(&mut self) -> Result<FolderTree> {
        let mut tree = FolderTree::new();
        for folder in self.get_all_folders()? {
            tree.entry(folder.parent_id).or_default().push(folder);
        }
        Ok(tree)
    }

    // ── Scripts ───────────────────────────────────────────────────

    /// Creates a script with empty metadata; see [`create_script_with`](Self::create_script_with).
    pub fn create_script(
        &mut self,
        name: &str,
        folder_id: Option<i64>,
        file_type: FileType,
        content: &str,
    ) -> Result<Script> {
        self.create_script_with(NewScript {
            name: name.to_string(),
            folder_id,
            file_type,
            content: content.to_string(),
            ..NewScript::default()
        })
    }

    /// Creates a script, stamping its created, modified and last-opened dates with now.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::InvalidArgument`] for a blank name,
    /// [`ScriptLibError::NotFound`] if `folder_id` does not exist,
    /// [`ScriptLibError::DuplicateName`] under the `Reject` policy, or a
    /// storage error.
    pub fn create_script_with(&mut self, new: NewScript) -> Result<Script> {
        validate_script_name(&new.name)?;
        if let Some(folder_id) = new.folder_id {
            self.require_folder(folder_id)?;
        }
        let name = self.resolve_script_name(&new.name, new.folder_id, None)?;

        let stamp = now();
        let mut script = Script {
            id: None,
            name,
            folder_id: new.folder_id,
            content: new.content,
            description: new.description,
            author: new.author,
            environment_tag: new.environment_tag,
            file_type: new.file_type,
            created_date: stamp,
            modified_date: stamp,
            last_opened_date: stamp,
        };
        let id = self.store.create_script(&script)?;
        script.id = Some(id);

        self.script_cache.insert(id, script.clone());
        log::info!("Created script {id} '{}'", script.file_name());
        Ok(script)
    }

    /// Returns the script with `id`, reading through to the store on a cache miss.
    pub fn get_script(&mut self, id: i64) -> Result<Option<Script>> {
        if let Some(script) = self.script_cache.get(&id) {
            log::debug!("Script cache hit for {id}");
            return Ok(Some(script.clone()));
        }
        log::debug!("Script cache miss for {id}");
        let script = self.store.get_script(id)?;
        if let Some(ref found) = script {
            self.script_cache.insert(id, found.clone());
        }
        Ok(script)
    }

    /// Writes every field of `script` and stamps `modified_date`.
    ///
    /// The caller's `modified_date` and `created_date` are ignored; the new
    /// `modified_date` is never earlier than the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::InvalidArgument`] if the script has no ID or
    /// a blank name, [`ScriptLibError::NotFound`] if it or its folder does not
    /// exist, [`ScriptLibError::DuplicateName`] under the `Reject` policy, or
    /// a storage error.
    pub fn update_script(&mut self, script: Script) -> Result<Script> {
        let id = script.id.ok_or_else(|| {
            ScriptLibError::InvalidArgument("Script has not been persisted".to_string())
        })?;
        validate_script_name(&script.name)?;
        let existing = self.require_script(id)?;
        if let Some(folder_id) = script.folder_id {
            self.require_folder(folder_id)?;
        }
        let name = self.resolve_script_name(&script.name, script.folder_id, Some(id))?;

        let updated = Script {
            id: Some(id),
            name,
            created_date: existing.created_date,
            modified_date: now().max(existing.modified_date),
            ..script
        };
        if !self.store.update_script(&updated)? {
            self.script_cache.remove(&id);
            return Err(ScriptLibError::NotFound(format!("script {id}")));
        }

        self.script_cache.insert(id, updated.clone());
        log::debug!("Saved script {id}");
        Ok(updated)
    }

    /// Records that the script was opened for viewing; `modified_date` is untouched.
    pub fn mark_script_opened(&mut self, id: i64) -> Result<()> {
        let opened_at = now();
        if !self.store.update_script_last_opened(id, opened_at)? {
            self.script_cache.remove(&id);
            return Err(ScriptLibError::NotFound(format!("script {id}")));
        }
        if let Some(cached) = self.script_cache.get_mut(&id) {
            cached.last_opened_date = opened_at;
        }
        Ok(())
    }

    /// Deletes a script and evicts it from the cache.
    pub fn delete_script(&mut self, id: i64) -> Result<()> {
        let deleted = self.store.delete_script(id)?;
        self.script_cache.remove(&id);
        if !deleted {
            return Err(ScriptLibError::NotFound(format!("script {id}")));
        }
        log::info!("Deleted script {id}");
        Ok(())
    }

    /// Scripts directly in `folder_id`, ordered by name; always read from the store.
    pub fn get_scripts_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Script>> {
        self.store.get_scripts_by_folder(folder_id)
    }

    /// Moves script `id` into `new_folder_id` (or to root level).
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::NotFound`] if the script or the destination
    /// folder does not exist; otherwise fails as [`update_script`](Self::update_script) does.
    pub fn move_script(&mut self, id: i64, new_folder_id: Option<i64>) -> Result<Script> {
        let script = self.require_script(id)?;
        if let Some(folder_id) = new_folder_id {
            self.require_folder(folder_id)?;
        }
        self.update_script(Script {
            folder_id: new_folder_id,
            ..script
        })
    }

    /// Scripts whose name, content or description contains `query`, ordered by name.
    ///
    /// A blank query returns no scripts. Case handling follows the configured
    /// [`MatchCase`].
    pub fn search_scripts(&self, query: &str) -> Result<Vec<Script>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.store.search_scripts(query, self.match_case)
    }

    // ── Tree items ────────────────────────────────────────────────

    /// Child folders followed by scripts of `folder_id`, each group ordered by name.
    pub fn get_folder_contents(&self, folder_id: Option<i64>) -> Result<Vec<LibraryItem>> {
        let folders = self.store.get_child_folders(folder_id)?;
        let scripts = self.store.get_scripts_by_folder(folder_id)?;
        Ok(folders
            .into_iter()
            .map(LibraryItem::Folder)
            .chain(scripts.into_iter().map(LibraryItem::Script))
            .collect())
    }

    pub fn get_item(&mut self, item: ItemRef) -> Result<Option<LibraryItem>> {
        Ok(match item {
            ItemRef::Folder(id) => self.get_folder(id)?.map(LibraryItem::Folder),
            ItemRef::Script(id) => self.get_script(id)?.map(LibraryItem::Script),
        })
    }

    /// Moves a folder or script into `target_folder_id`, e.g. after a drag-and-drop.
    pub fn move_item(&mut self, item: ItemRef, target_folder_id: Option<i64>) -> Result<LibraryItem> {
        match item {
            ItemRef::Folder(id) => self.move_folder(id, target_folder_id).map(LibraryItem::Folder),
            ItemRef::Script(id) => self.move_script(id, target_folder_id).map(LibraryItem::Script),
        }
    }

    pub fn rename_item(&mut self, item: ItemRef, new_name: &str) -> Result<LibraryItem> {
        match item {
            ItemRef::Folder(id) => {
                let folder = self.require_folder(id)?;
                self.update_folder(Folder {
                    name: new_name.to_string(),
                    ..folder
                })
                .map(LibraryItem::Folder)
            }
            ItemRef::Script(id) => {
                let script = self.require_script(id)?;
                self.update_script(Script {
                    name: new_name.to_string(),
                    ..script
                })
                .map(LibraryItem::Script)
            }
        }
    }

    pub fn delete_item(&mut self, item: ItemRef) -> Result<()> {
        match item {
            ItemRef::Folder(id) => self.delete_folder(id),
            ItemRef::Script(id) => self.delete_script(id),
        }
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn require_folder(&mut self, id: i64) -> Result<Folder> {
        self.get_folder(id)?
            .ok_or_else(|| ScriptLibError::NotFound(format!("folder {id}")))
    }

    fn require_script(&mut self, id: i64) -> Result<Script> {
        self.get_script(id)?
            .ok_or_else(|| ScriptLibError::NotFound(format!("script {id}")))
    }

    /// Path of the folder that will contain a child; `None` for the root.
    fn parent_path(&mut self, parent_id: Option<i64>) -> Result<Option<String>> {
        match parent_id {
            Some(pid) => Ok(Some(self.require_folder(pid)?.path)),
            None => Ok(None),
        }
    }

    /// Walks the ancestor chain upward from `new_parent_id`; fails if `folder_id` is on it.
    fn check_no_cycle(&mut self, folder_id: i64, new_parent_id: Option<i64>) -> Result<()> {
        let mut seen = HashSet::new();
        let mut current = new_parent_id;
        while let Some(ancestor) = current {
            if ancestor == folder_id {
                log::warn!("Rejected moving folder {folder_id} under its own subtree");
                return Err(ScriptLibError::CircularReference(format!(
                    "folder {folder_id} cannot be placed inside itself or one of its descendants"
                )));
            }
            if !seen.insert(ancestor) {
                return Err(ScriptLibError::CircularReference(format!(
                    "ancestor chain of folder {ancestor} already loops"
                )));
            }
            current = self.get_folder(ancestor)?.and_then(|f| f.parent_id);
        }
        Ok(())
    }

    /// Returns `root` followed by every descendant with a recomputed path,
    /// breadth-first so each parent precedes its children.
    fn rebuild_subtree_paths(&self, root: &Folder) -> Result<Vec<Folder>> {
        let mut batch = vec![root.clone()];
        let Some(root_id) = root.id else {
            return Ok(batch);
        };

        let mut visited = HashSet::from([root_id]);
        let mut queue = VecDeque::from([(root_id, root.path.clone())]);
        while let Some((parent_id, parent_path)) = queue.pop_front() {
            for mut child in self.store.get_child_folders(Some(parent_id))? {
                let Some(child_id) = child.id else { continue };
                if !visited.insert(child_id) {
                    continue;
                }
                child.path = join_path(Some(&parent_path), &child.name);
                queue.push_back((child_id, child.path.clone()));
                batch.push(child);
            }
        }
        Ok(batch)
    }

    fn resolve_folder_name(&self, name: &str, parent_id: Option<i64>, exclude: Option<i64>) -> Result<String> {
        if self.name_policy == SiblingNamePolicy::Permit {
            return Ok(name.to_string());
        }
        let taken: HashSet<String> = self
            .store
            .get_child_folders(parent_id)?
            .into_iter()
            .filter(|f| exclude.is_none() || f.id != exclude)
            .map(|f| f.name)
            .collect();
        apply_name_policy(self.name_policy, name, &taken)
    }

    fn resolve_script_name(&self, name: &str, folder_id: Option<i64>, exclude: Option<i64>) -> Result<String> {
        if self.name_policy == SiblingNamePolicy::Permit {
            return Ok(name.to_string());
        }
        let taken: HashSet<String> = self
            .store
            .get_scripts_by_folder(folder_id)?
            .into_iter()
            .filter(|s| exclude.is_none() || s.id != exclude)
            .map(|s| s.name)
            .collect();
        apply_name_policy(self.name_policy, name, &taken)
    }
}

fn apply_name_policy(policy: SiblingNamePolicy, name: &str, taken: &HashSet<String>) -> Result<String> {
    if !taken.contains(name) {
        return Ok(name.to_string());
    }
    match policy {
        SiblingNamePolicy::Permit => Ok(name.to_string()),
        SiblingNamePolicy::Reject => Err(ScriptLibError::DuplicateName(name.to_string())),
        SiblingNamePolicy::AutoSuffix => {
            let mut n = 2;
            loop {
                let candidate = format!("{name} ({n})");
                if !taken.contains(&candidate) {
                    return Ok(candidate);
                }
                n += 1;
            }
        }
    }
}

/// Current time at the millisecond precision the stores persist.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

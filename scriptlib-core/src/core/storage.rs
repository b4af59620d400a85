//! SQLite-backed [`LibraryStore`].

use crate::{
    EnvironmentTag, FileType, Folder, FolderRemoval, LibraryStore, MatchCase, Result, Script,
    ScriptLibError,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

const FOLDER_COLUMNS: &str = "id, name, parent_id, path, created_date";

const SCRIPT_COLUMNS: &str = "id, name, folder_id, content, description, author,
    environment_tag, file_type, created_date, modified_date, last_opened_date";

/// A script library database file.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Creates (or re-initialises) a library database at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(include_str!("schema.sql"))?;
        log::info!("Initialised script library at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Opens an existing library database, validating its structure.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptLibError::Storage`] if the file does not contain the
    /// `folders` and `scripts` tables, or [`ScriptLibError::Database`] if it
    /// is not a SQLite database at all.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('folders', 'scripts')",
            [],
            |row| row.get(0),
        )?;

        if table_count != 2 {
            return Err(ScriptLibError::Storage(
                "Not a valid script library database".to_string(),
            ));
        }

        // Foreign-key enforcement is per connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        log::info!("Opened script library at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    /// Opens the database at `path`, creating it first if the file is missing or empty.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_populated = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if is_populated {
            Self::open(path)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Self::create(path)
        }
    }

    /// Opens a private, non-persistent database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LibraryStore for Storage {
    fn create_folder(&mut self, folder: &Folder) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO folders (name, parent_id, path, created_date) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                folder.name,
                folder.parent_id,
                folder.path,
                folder.created_date.timestamp_millis(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_folder(&self, id: i64) -> Result<Option<Folder>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1"),
                [id],
                map_folder_row,
            )
            .optional()?;
        row.map(folder_from_row_tuple).transpose()
    }

    fn get_all_folders(&self) -> Result<Vec<Folder>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY name, id"))?;
        let rows = stmt
            .query_map([], map_folder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(folder_from_row_tuple).collect()
    }

    fn get_child_folders(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        // `IS` matches NULL for root-level folders as well as concrete IDs.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id IS ?1 ORDER BY name, id"
        ))?;
        let rows = stmt
            .query_map([parent_id], map_folder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(folder_from_row_tuple).collect()
    }

    fn update_folder(&mut self, folder: &Folder) -> Result<bool> {
        let id = require_id(folder.id, "folder")?;
        let changed = self.conn.execute(
            "UPDATE folders SET name = ?1, parent_id = ?2, path = ?3 WHERE id = ?4",
            rusqlite::params![folder.name, folder.parent_id, folder.path, id],
        )?;
        Ok(changed > 0)
    }

    fn update_folders(&mut self, folders: &[Folder]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for folder in folders {
            let id = require_id(folder.id, "folder")?;
            tx.execute(
                "UPDATE folders SET name = ?1, parent_id = ?2, path = ?3 WHERE id = ?4",
                rusqlite::params![folder.name, folder.parent_id, folder.path, id],
            )?;
            // Dropping `tx` on the early return rolls back the batch.
            if tx.changes() == 0 {
                return Err(ScriptLibError::NotFound(format!("folder {id}")));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_folder(&mut self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM folders WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn delete_empty_folder(&mut self, id: i64) -> Result<FolderRemoval> {
        let tx = self.conn.transaction()?;

        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM folders WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(FolderRemoval::NotFound);
        }

        let contents: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM folders WHERE parent_id = ?1)
                  + (SELECT COUNT(*) FROM scripts WHERE folder_id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        if contents > 0 {
            return Ok(FolderRemoval::NotEmpty);
        }

        tx.execute("DELETE FROM folders WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(FolderRemoval::Deleted)
    }

    fn create_script(&mut self, script: &Script) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO scripts (name, folder_id, content, description, author,
                                  environment_tag, file_type, created_date,
                                  modified_date, last_opened_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                script.name,
                script.folder_id,
                script.content,
                script.description,
                script.author,
                script.environment_tag.as_str(),
                script.file_type.as_str(),
                script.created_date.timestamp_millis(),
                script.modified_date.timestamp_millis(),
                script.last_opened_date.timestamp_millis(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_script(&self, id: i64) -> Result<Option<Script>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = ?1"),
                [id],
                map_script_row,
            )
            .optional()?;
        row.map(script_from_row_tuple).transpose()
    }

    fn get_scripts_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Script>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCRIPT_COLUMNS} FROM scripts WHERE folder_id IS ?1 ORDER BY name, id"
        ))?;
        let rows = stmt
            .query_map([folder_id], map_script_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(script_from_row_tuple).collect()
    }

    fn update_script(&mut self, script: &Script) -> Result<bool> {
        let id = require_id(script.id, "script")?;
        let changed = self.conn.execute(
            "UPDATE scripts
             SET name = ?1, folder_id = ?2, content = ?3, description = ?4,
                 author = ?5, environment_tag = ?6, file_type = ?7,
                 modified_date = ?8, last_opened_date = ?9
             WHERE id = ?10",
            rusqlite::params![
                script.name,
                script.folder_id,
                script.content,
                script.description,
                script.author,
                script.environment_tag.as_str(),
                script.file_type.as_str(),
                script.modified_date.timestamp_millis(),
                script.last_opened_date.timestamp_millis(),
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn update_script_last_opened(&mut self, id: i64, opened_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE scripts SET last_opened_date = ?1 WHERE id = ?2",
            rusqlite::params![opened_at.timestamp_millis(), id],
        )?;
        Ok(changed > 0)
    }

    fn delete_script(&mut self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM scripts WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn search_scripts(&self, query: &str, case: MatchCase) -> Result<Vec<Script>> {
        let (sql, needle) = match case {
            // LIKE folds ASCII case only.
            MatchCase::Insensitive => (
                format!(
                    "SELECT {SCRIPT_COLUMNS} FROM scripts
                     WHERE name LIKE ?1 ESCAPE '\\'
                        OR content LIKE ?1 ESCAPE '\\'
                        OR description LIKE ?1 ESCAPE '\\'
                     ORDER BY name, id"
                ),
                format!("%{}%", escape_like(query)),
            ),
            MatchCase::Sensitive => (
                format!(
                    "SELECT {SCRIPT_COLUMNS} FROM scripts
                     WHERE instr(name, ?1) > 0
                        OR instr(content, ?1) > 0
                        OR instr(description, ?1) > 0
                     ORDER BY name, id"
                ),
                query.to_string(),
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([needle], map_script_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(script_from_row_tuple).collect()
    }
}

fn require_id(id: Option<i64>, kind: &str) -> Result<i64> {
    id.ok_or_else(|| ScriptLibError::InvalidArgument(format!("{kind} has not been persisted")))
}

/// Escapes LIKE wildcards so the query matches as a literal substring.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ScriptLibError::Storage(format!("Stored timestamp {ms} is out of range")))
}

/// Raw 5-column tuple extracted from a `folders` row.
type FolderRow = (i64, String, Option<i64>, String, i64);

fn map_folder_row(row: &rusqlite::Row) -> rusqlite::Result<FolderRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn folder_from_row_tuple((id, name, parent_id, path, created_date): FolderRow) -> Result<Folder> {
    Ok(Folder {
        id: Some(id),
        name,
        parent_id,
        path,
        created_date: timestamp_from_millis(created_date)?,
    })
}

/// Raw 11-column tuple extracted from a `scripts` row.
type ScriptRow = (
    i64,
    String,
    Option<i64>,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    i64,
);

fn map_script_row(row: &rusqlite::Row) -> rusqlite::Result<ScriptRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

/// Converts a raw tuple into a [`Script`], parsing the stored enum text.
fn script_from_row_tuple(
    (id, name, folder_id, content, description, author, environment_tag, file_type, created, modified, opened): ScriptRow,
) -> Result<Script> {
    let environment_tag: EnvironmentTag = environment_tag
        .parse()
        .map_err(|e: ScriptLibError| ScriptLibError::Storage(e.to_string()))?;
    let file_type: FileType = file_type
        .parse()
        .map_err(|e: ScriptLibError| ScriptLibError::Storage(e.to_string()))?;
    Ok(Script {
        id: Some(id),
        name,
        folder_id,
        content,
        description,
        author,
        environment_tag,
        file_type,
        created_date: timestamp_from_millis(created)?,
        modified_date: timestamp_from_millis(modified)?,
        last_opened_date: timestamp_from_millis(opened)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn folder(name: &str, parent_id: Option<i64>, path: &str) -> Folder {
        Folder::new(name, parent_id, path.to_string(), ts(1_700_000_000_000))
    }

    fn script(name: &str, folder_id: Option<i64>, content: &str, description: &str) -> Script {
        Script {
            id: None,
            name: name.to_string(),
            folder_id,
            content: content.to_string(),
            description: description.to_string(),
            author: "ops".to_string(),
            environment_tag: EnvironmentTag::Production,
            file_type: FileType::Bat,
            created_date: ts(1_700_000_000_000),
            modified_date: ts(1_700_000_000_500),
            last_opened_date: ts(1_700_000_001_000),
        }
    }

    fn table_names(storage: &Storage) -> Vec<String> {
        storage
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_create_storage() {
        let temp = NamedTempFile::new().unwrap();
        let storage = Storage::create(temp.path()).unwrap();

        let tables = table_names(&storage);
        assert!(tables.contains(&"folders".to_string()));
        assert!(tables.contains(&"scripts".to_string()));
    }

    #[test]
    fn test_open_existing_storage() {
        let temp = NamedTempFile::new().unwrap();
        Storage::create(temp.path()).unwrap();

        let storage = Storage::open(temp.path()).unwrap();
        assert!(table_names(&storage).contains(&"scripts".to_string()));
    }

    #[test]
    fn test_open_invalid_database() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "not a database").unwrap();

        assert!(Storage::open(temp.path()).is_err());
    }

    #[test]
    fn test_open_or_create_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.db");

        {
            let mut storage = Storage::open_or_create(&path).unwrap();
            storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();
        }

        let storage = Storage::open_or_create(&path).unwrap();
        assert_eq!(storage.get_all_folders().unwrap().len(), 1);
    }

    #[test]
    fn test_folder_round_trip() {
        let mut storage = Storage::in_memory().unwrap();
        let id = storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();

        let loaded = storage.get_folder(id).unwrap().unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.path, "/Ops");
        assert_eq!(loaded.created_date, ts(1_700_000_000_000));
        assert!(storage.get_folder(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_child_folders_ordered_by_name_with_root_selection() {
        let mut storage = Storage::in_memory().unwrap();
        let ops = storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();
        storage.create_folder(&folder("Admin", None, "/Admin")).unwrap();
        storage.create_folder(&folder("Zeta", Some(ops), "/Ops/Zeta")).unwrap();
        storage.create_folder(&folder("Beta", Some(ops), "/Ops/Beta")).unwrap();

        let roots: Vec<String> = storage
            .get_child_folders(None)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(roots, vec!["Admin", "Ops"]);

        let children: Vec<String> = storage
            .get_child_folders(Some(ops))
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(children, vec!["Beta", "Zeta"]);
    }

    #[test]
    fn test_update_folders_is_atomic() {
        let mut storage = Storage::in_memory().unwrap();
        let id = storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();

        let mut renamed = storage.get_folder(id).unwrap().unwrap();
        renamed.name = "Infra".to_string();
        renamed.path = "/Infra".to_string();
        let mut ghost = renamed.clone();
        ghost.id = Some(id + 99);

        let result = storage.update_folders(&[renamed, ghost]);
        assert!(matches!(result, Err(ScriptLibError::NotFound(_))));
        assert_eq!(storage.get_folder(id).unwrap().unwrap().name, "Ops");
    }

    #[test]
    fn test_delete_folder_cascades() {
        let mut storage = Storage::in_memory().unwrap();
        let ops = storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();
        let deploy = storage
            .create_folder(&folder("Deploy", Some(ops), "/Ops/Deploy"))
            .unwrap();
        let script_id = storage
            .create_script(&script("run", Some(deploy), "", ""))
            .unwrap();

        assert!(storage.delete_folder(ops).unwrap());
        assert!(storage.get_folder(deploy).unwrap().is_none());
        assert!(storage.get_script(script_id).unwrap().is_none());
        assert!(!storage.delete_folder(ops).unwrap());
    }

    #[test]
    fn test_delete_empty_folder_outcomes() {
        let mut storage = Storage::in_memory().unwrap();
        let ops = storage.create_folder(&folder("Ops", None, "/Ops")).unwrap();
        let script_id = storage.create_script(&script("run", Some(ops), "", "")).unwrap();

        assert_eq!(storage.delete_empty_folder(ops).unwrap(), FolderRemoval::NotEmpty);
        assert!(storage.get_folder(ops).unwrap().is_some());

        storage.delete_script(script_id).unwrap();
        assert_eq!(storage.delete_empty_folder(ops).unwrap(), FolderRemoval::Deleted);
        assert_eq!(storage.delete_empty_folder(ops).unwrap(), FolderRemoval::NotFound);
    }

    #[test]
    fn test_script_round_trip() {
        let mut storage = Storage::in_memory().unwrap();
        let original = script("deploy", None, "Write-Host hi", "says hi");
        let id = storage.create_script(&original).unwrap();

        let loaded = storage.get_script(id).unwrap().unwrap();
        assert_eq!(loaded, Script { id: Some(id), ..original });
    }

    #[test]
    fn test_update_script_last_opened_only() {
        let mut storage = Storage::in_memory().unwrap();
        let id = storage.create_script(&script("deploy", None, "", "")).unwrap();

        assert!(storage.update_script_last_opened(id, ts(1_800_000_000_000)).unwrap());
        let loaded = storage.get_script(id).unwrap().unwrap();
        assert_eq!(loaded.last_opened_date, ts(1_800_000_000_000));
        assert_eq!(loaded.modified_date, ts(1_700_000_000_500));
        assert!(!storage.update_script_last_opened(id + 1, ts(0)).unwrap());
    }

    #[test]
    fn test_update_script_never_rewrites_created_date() {
        let mut storage = Storage::in_memory().unwrap();
        let id = storage.create_script(&script("deploy", None, "", "")).unwrap();

        let mut changed = storage.get_script(id).unwrap().unwrap();
        changed.created_date = ts(5);
        changed.content = "new".to_string();
        assert!(storage.update_script(&changed).unwrap());

        let loaded = storage.get_script(id).unwrap().unwrap();
        assert_eq!(loaded.content, "new");
        assert_eq!(loaded.created_date, ts(1_700_000_000_000));
    }

    #[test]
    fn test_search_case_policies() {
        let mut storage = Storage::in_memory().unwrap();
        storage.create_script(&script("Backup", None, "", "")).unwrap();
        storage.create_script(&script("cleanup", None, "Remove-Item backup", "")).unwrap();
        storage.create_script(&script("report", None, "", "weekly BACKUP report")).unwrap();
        storage.create_script(&script("unrelated", None, "", "")).unwrap();

        let names = |scripts: Vec<Script>| scripts.into_iter().map(|s| s.name).collect::<Vec<_>>();

        let insensitive = storage.search_scripts("backup", MatchCase::Insensitive).unwrap();
        assert_eq!(names(insensitive), vec!["Backup", "cleanup", "report"]);

        let sensitive = storage.search_scripts("backup", MatchCase::Sensitive).unwrap();
        assert_eq!(names(sensitive), vec!["cleanup"]);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let mut storage = Storage::in_memory().unwrap();
        storage.create_script(&script("100%_done", None, "", "")).unwrap();
        storage.create_script(&script("1000 done", None, "", "")).unwrap();

        let hits = storage.search_scripts("0%_", MatchCase::Insensitive).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100%_done");
    }

    #[test]
    fn test_corrupt_enum_text_is_a_storage_error() {
        let mut storage = Storage::in_memory().unwrap();
        let id = storage.create_script(&script("deploy", None, "", "")).unwrap();
        storage
            .connection()
            .execute("UPDATE scripts SET file_type = 'sh' WHERE id = ?1", [id])
            .unwrap();

        let result = storage.get_script(id);
        assert!(matches!(result, Err(ScriptLibError::Storage(_))));
    }
}

//! Keyed record store collaborators.
//!
//! # Contracts
//!
//! - [`RecordStore::query_group`] — secondary-index lookup by exact
//!   (client, category); returns every record in the group, unpaginated.
//! - [`RecordSink::upsert`] — idempotent single-record write keyed by
//!   (client, category, fingerprint). The latest write for a key wins.
//!
//! # Implementations
//!
//! - [`MemoryStore`] — `BTreeMap` keyed by [`RecordKey`]; test double.
//! - [`JsonFileStore`] — one JSON document on disk:
//!
//! ```text
//! ~/.freshen/
//!   store.json          (mode 0600)
//! ```
//!
//! Every upsert rewrites the document with the atomic `.tmp` + rename pattern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::{Category, ClientId, Record, RecordKey};

// ---------------------------------------------------------------------------
// 1. Traits
// ---------------------------------------------------------------------------

/// Read side of the store: the (client, category) secondary index.
pub trait RecordStore {
    fn query_group(&self, client: &ClientId, category: &Category)
        -> Result<Vec<Record>, StoreError>;
}

/// Write side of the store: idempotent upsert on the logical key.
pub trait RecordSink {
    fn upsert(&mut self, record: Record) -> Result<(), StoreError>;
}

fn select_group(
    records: &BTreeMap<RecordKey, Record>,
    client: &ClientId,
    category: &Category,
) -> Vec<Record> {
    records
        .values()
        .filter(|r| &r.client == client && &r.category == category)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// 2. In-memory store
// ---------------------------------------------------------------------------

/// Store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<RecordKey, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records` (later duplicates of a key win).
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.records.insert(record.key(), record);
        }
        store
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn query_group(
        &self,
        client: &ClientId,
        category: &Category,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(select_group(&self.records, client, category))
    }
}

impl RecordSink for MemoryStore {
    fn upsert(&mut self, record: Record) -> Result<(), StoreError> {
        self.records.insert(record.key(), record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 3. JSON file store
// ---------------------------------------------------------------------------

/// On-disk store payload.
#[derive(Debug, Serialize)]
struct StoreFile<'a> {
    updated_at: DateTime<Utc>,
    records: Vec<&'a Record>,
}

// A bare array of records is also accepted, matching table exports.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreFileCompat {
    Structured { records: Vec<Record> },
    Export(Vec<Record>),
}

/// Record store persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<RecordKey, Record>,
}

/// `<home>/.freshen/store.json`. Pure, no I/O.
pub fn default_store_path_at(home: &Path) -> PathBuf {
    home.join(".freshen").join("store.json")
}

/// `default_store_path_at` convenience wrapper using `dirs::home_dir()`.
pub fn default_store_path() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| default_store_path_at(&home))
        .ok_or(StoreError::HomeNotFound)
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// Returns an empty store if the file does not yet exist,
    /// `StoreError::Parse` (with path) if the document is malformed.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("no store at {}, starting empty", path.display());
            return Ok(Self {
                path,
                records: BTreeMap::new(),
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let loaded = match serde_json::from_str::<StoreFileCompat>(&contents) {
            Ok(StoreFileCompat::Structured { records }) => records,
            Ok(StoreFileCompat::Export(records)) => records,
            Err(source) => return Err(StoreError::Parse { path, source }),
        };

        let mut records = BTreeMap::new();
        for record in loaded {
            records.insert(record.key(), record);
        }
        tracing::debug!("loaded {} record(s) from {}", records.len(), path.display());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Atomically persist the current records.
    ///
    /// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
    fn save(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            }
        }

        let file = StoreFile {
            updated_at: Utc::now(),
            records: self.records.values().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        let finished = set_file_permissions(&tmp).and_then(|()| {
            std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
        });
        if finished.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        finished
    }
}

impl RecordStore for JsonFileStore {
    fn query_group(
        &self,
        client: &ClientId,
        category: &Category,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(select_group(&self.records, client, category))
    }
}

impl RecordSink for JsonFileStore {
    fn upsert(&mut self, record: Record) -> Result<(), StoreError> {
        let key = record.key();
        let previous = self.records.insert(key.clone(), record);
        if let Err(err) = self.save() {
            // Keep memory in step with disk when the write did not land.
            match previous {
                Some(prev) => self.records.insert(key, prev),
                None => self.records.remove(&key),
            };
            return Err(err);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 4. Permission helpers (Unix-only; no-ops on other platforms)
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fingerprint, GenerationId, Payload};
    use tempfile::TempDir;

    fn record(client: &str, category: &str, fp: &str, id: u64) -> Record {
        Record {
            client: ClientId::from(client),
            category: Category::from(category),
            fingerprint: Fingerprint::from(fp),
            generation: GenerationId(id),
            timestamp: Some(1_000),
            payload: Payload::new(),
        }
    }

    #[test]
    fn memory_query_filters_by_client_and_category() {
        let store = MemoryStore::with_records([
            record("c1", "love", "h1", 1),
            record("c1", "letter", "h1", 4),
            record("c2", "love", "h1", 7),
        ]);
        let group = store
            .query_group(&ClientId::from("c1"), &Category::from("love"))
            .unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].generation, GenerationId(1));
    }

    #[test]
    fn memory_upsert_replaces_same_key() {
        let mut store = MemoryStore::new();
        store.upsert(record("c1", "love", "h1", 1)).unwrap();
        store.upsert(record("c1", "love", "h1", 2)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.records().next().map(|r| r.generation),
            Some(GenerationId(2))
        );
    }

    #[test]
    fn json_store_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let store = JsonFileStore::open_at(&path).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn tmp_file_cleaned_up_after_upsert() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("store.json");
        let mut store = JsonFileStore::open_at(&path).unwrap();
        store.upsert(record("c1", "love", "h1", 1)).unwrap();
        assert!(path.exists());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn failed_save_rolls_back_memory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut store = JsonFileStore::open_at(&path).unwrap();
        // A directory squatting on the tmp path makes the write fail.
        std::fs::create_dir_all(path.with_extension("json.tmp")).unwrap();

        let result = store.upsert(record("c1", "love", "h1", 1));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(store.is_empty(), "failed upsert must not linger in memory");
        assert!(!path.exists());
    }

    #[test]
    fn failed_finish_removes_tmp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut store = JsonFileStore::open_at(&path).unwrap();
        // A non-empty directory at the target makes the final rename fail.
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let result = store.upsert(record("c1", "love", "h1", 1));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(store.is_empty());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file must not be left behind"
        );
    }
}

//! Persistence of the most recent snapshot between runs.
//!
//! Only one snapshot is retained: every save replaces the previous one.
//!
//! # Storage Format
//!
//! [`JsonFileStore`] writes a single pretty-printed JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "timestamp": "2024-01-01T00:01:00Z",
//!   "groups": { "<event hub>": { "<consumer group>": { "<partition>": {
//!     "sequence_number": 1100, "offset": 4096 } } } }
//! }
//! ```
//!
//! Nothing guards against two runs sharing one file at the same time; callers
//! must serialise runs themselves.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::snapshot::{EventHubs, Snapshot};

pub const FORMAT_VERSION: u32 = 1;

pub trait SnapshotStore {
    /// Replace the retained snapshot with `snapshot`.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// The retained snapshot, or `None` if nothing has been saved yet.
    fn load_latest(&self) -> Result<Option<Snapshot>>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    #[serde(default = "default_version")]
    version: u32,
    timestamp: DateTime<Utc>,
    groups: EventHubs,
}

fn default_version() -> u32 {
    FORMAT_VERSION
}

/// Keeps the snapshot in one JSON file, replaced atomically via rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> AnalyzerError {
        AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let persisted = PersistedSnapshot {
            version: FORMAT_VERSION,
            timestamp: snapshot.timestamp,
            groups: snapshot.groups.clone(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| self.io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(&self.path, e))?;

        info!(
            "saved snapshot of {} partition(s) at {} to {}",
            snapshot.partition_count(),
            snapshot.timestamp,
            self.path.display()
        );
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<Snapshot>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };
        let persisted: PersistedSnapshot = serde_json::from_str(&contents)?;
        Ok(Some(Snapshot {
            timestamp: persisted.timestamp,
            groups: persisted.groups,
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Single-slot store living for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: RefCell<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: RefCell::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.slot.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<Snapshot>> {
        Ok(self.slot.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RawCheckpointRecord;
    use chrono::TimeZone;

    fn snapshot(seq: i64, minute: u32) -> Snapshot {
        let records = vec![RawCheckpointRecord {
            event_hub: "eh".to_string(),
            consumer_group: "$default".to_string(),
            partition_id: "0".to_string(),
            sequence_number: seq,
            offset: seq * 10,
        }];
        Snapshot::build(
            &records,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        )
    }

    // -----------------------------------------------------------------------
    // JsonFileStore
    // -----------------------------------------------------------------------

    #[test]
    fn test_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));
        let snap = snapshot(1000, 0);

        store.save(&snap).unwrap();
        assert_eq!(store.load_latest().unwrap(), Some(snap));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_replaces_previous() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));
        store.save(&snapshot(1000, 0)).unwrap();
        store.save(&snapshot(1100, 1)).unwrap();

        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded, snapshot(1100, 1));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("state/nested/data.json"));
        store.save(&snapshot(1, 0)).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_format() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));
        store.save(&snapshot(1100, 1)).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["timestamp"], "2024-01-01T00:01:00Z");
        assert_eq!(json["groups"]["eh"]["$default"]["0"]["sequence_number"], 1100);
    }

    #[test]
    fn test_load_without_version_field() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"timestamp":"2024-01-01T00:00:00+00:00","groups":{"eh":{"cg":{"0":{"sequence_number":5,"offset":6}}}}}"#,
        )
        .unwrap();
        let loaded = JsonFileStore::new(&path).load_latest().unwrap().unwrap();
        assert_eq!(loaded.get("eh", "cg", "0").unwrap().offset, 6);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::new(&path).load_latest(),
            Err(AnalyzerError::Json(_))
        ));
    }

    // -----------------------------------------------------------------------
    // MemoryStore
    // -----------------------------------------------------------------------

    #[test]
    fn test_memory_store_single_slot() {
        let store = MemoryStore::new();
        assert!(store.load_latest().unwrap().is_none());
        store.save(&snapshot(1, 0)).unwrap();
        store.save(&snapshot(2, 1)).unwrap();
        assert_eq!(store.load_latest().unwrap(), Some(snapshot(2, 1)));
    }
}

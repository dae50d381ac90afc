use crate::error::StoreError;
use crate::models::{HourAggregate, PendingDiff, SNAPSHOT_VERSION, Snapshot};
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Durable home of the [`Snapshot`]. Every save replaces the whole record.
///
/// The per-slot accessors each cost a full read and rewrite. A phase that
/// changes both slots goes through [`SnapshotStore::save`] once so a crash
/// cannot leave new totals next to a stale diff.
pub trait SnapshotStore {
    fn load(&self) -> Result<Snapshot, StoreError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    #[allow(dead_code)]
    fn load_all_hours(&self) -> Result<HourAggregate, StoreError> {
        Ok(self.load()?.all_hours)
    }

    #[allow(dead_code)]
    fn save_all_hours(&self, hours: &HourAggregate) -> Result<(), StoreError> {
        let mut snapshot = self.load()?;
        snapshot.all_hours = hours.clone();
        self.save(&snapshot)
    }

    #[allow(dead_code)]
    fn load_pending_diff(&self) -> Result<Option<PendingDiff>, StoreError> {
        Ok(self.load()?.pending_diff)
    }

    #[allow(dead_code)]
    fn save_pending_diff(&self, dirty: bool, hours: &HourAggregate) -> Result<(), StoreError> {
        let mut snapshot = self.load()?;
        snapshot.pending_diff = Some(PendingDiff {
            update_data: dirty,
            hours: hours.clone(),
            staged_at: Some(Utc::now()),
        });
        self.save(&snapshot)
    }
}

/// Snapshot kept as one JSON document, swapped in with a rename.
#[derive(Clone, Debug)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(SNAPSHOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, source: serde_json::Error) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;

        let probe: VersionProbe = serde_json::from_str(&content).map_err(|e| self.corrupt(e))?;
        if probe.version > SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: probe.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let mut snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| self.corrupt(e))?;
        snapshot.version = SNAPSHOT_VERSION;
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.io_error(e))?;

        let content = serde_json::to_vec_pretty(snapshot).map_err(|e| self.corrupt(e))?;
        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| self.io_error(e))?;
        tmp.write_all(&content).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

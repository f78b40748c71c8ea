//! History Store: durable record of completed files, persisted as a single
//! JSON document and merged back into the Registry on demand.
//!
//! Writes are atomic (write-to-temp, rename) so a crash mid-save never
//! corrupts the store; reads tolerate absence and malformed content by
//! falling back to an empty result with a warning log, never a crash.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::FileRecord;
use crate::error::{CoreError, CoreResult};

/// On-disk shape of `transcripts/history_records.json`.
///
/// `completed_files` is derived from `files` on every save rather than
/// tracked independently: we keep both keys on the wire for compatibility
/// but treat `files` as the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HistoryDocument {
    #[serde(default)]
    files: Vec<FileRecord>,
    #[serde(default)]
    completed_files: Vec<String>,
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the on-disk file. Absence or malformed content yields an empty
    /// result; never returns an error to the caller.
    pub fn load(&self) -> Vec<FileRecord> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_slice::<HistoryDocument>(&bytes) {
            Ok(doc) => doc.files,
            Err(err) => {
                tracing::warn!(
                    target: "meetscribe.history",
                    path = %self.path.display(),
                    error = %err,
                    "history file is malformed; treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Serialise `records` atomically: write to a sibling temp file, then
    /// rename over the destination.
    pub fn save(&self, records: &[FileRecord]) -> CoreResult<()> {
        let doc = HistoryDocument {
            files: records.to_vec(),
            completed_files: records.iter().map(|r| r.id.to_string()).collect(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| CoreError::Persistence(format!("serialize history: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::Persistence(format!("create history dir: {e}")))?;
        }

        write_atomic(&self.path, &bytes)
            .map_err(|e| CoreError::Persistence(format!("write history: {e}")))
    }

    /// Truncate to an empty document.
    pub fn clear(&self) -> CoreResult<()> {
        self.save(&[])
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileState, Language};

    fn completed_record(name: &str) -> FileRecord {
        let mut rec = FileRecord::new_uploaded(
            name.into(),
            format!("{name}_stored"),
            format!("/tmp/{name}").into(),
            10,
            Language::Zh,
        );
        rec.state = FileState::Completed;
        rec.progress = 100;
        rec
    }

    #[test]
    fn load_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn load_of_malformed_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = HistoryStore::new(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let records = vec![completed_record("a.mp3"), completed_record("b.mp3")];
        store.save(&records).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].original_name, "a.mp3");
    }

    #[test]
    fn clear_truncates_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        store.save(&[completed_record("a.mp3")]).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_empty());
    }
}

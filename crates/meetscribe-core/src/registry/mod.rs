//! File Registry: the single source of truth for `FileRecord`s in memory.
//!
//! Concurrency model: one lock guards the catalogue; every accessor hands
//! back an owned copy so readers never hold the lock. Mutations run a
//! caller-supplied closure against a clone, validate state-machine
//! invariants against the result, and only then commit — a failing
//! mutation never partially applies.

use std::collections::HashSet;
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::domain::{FileId, FileRecord, FileState};
use crate::error::{CoreError, CoreResult};

/// Optional filters and pagination cursor for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<FileState>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Unfiltered counts per state, always computed over the whole catalogue
/// regardless of `ListFilter` (the HTTP surface calls these `statistics`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub uploaded: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl Statistics {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.uploaded + self.processing + self.completed + self.error
    }
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<FileRecord>,
    pub statistics: Statistics,
    pub total_matching: usize,
}

struct Inner {
    files: IndexMap<FileId, FileRecord>,
    processing: HashSet<FileId>,
    completed: HashSet<FileId>,
}

pub struct Registry {
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                files: IndexMap::new(),
                processing: HashSet::new(),
                completed: HashSet::new(),
            }),
        }
    }

    pub fn add(&self, record: FileRecord) -> CoreResult<FileId> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.files.contains_key(&record.id) {
            return Err(CoreError::Validation(format!(
                "duplicate file id: {}",
                record.id
            )));
        }
        let id = record.id;
        track_indices(&mut inner, &record);
        inner.files.insert(id, record);
        Ok(id)
    }

    pub fn get(&self, id: FileId) -> CoreResult<FileRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .files
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound(id))
    }

    pub fn has(&self, id: FileId) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.files.contains_key(&id)
    }

    /// Is `id` currently occupying a scheduler worker slot?
    pub fn is_processing(&self, id: FileId) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.processing.contains(&id)
    }

    pub fn list(&self, filter: &ListFilter) -> ListResult {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let mut statistics = Statistics::default();
        for rec in inner.files.values() {
            match rec.state {
                FileState::Uploaded => statistics.uploaded += 1,
                FileState::Processing => statistics.processing += 1,
                FileState::Completed => statistics.completed += 1,
                FileState::Error => statistics.error += 1,
            }
        }

        let mut matching: Vec<FileRecord> = inner
            .files
            .values()
            .filter(|r| filter.state.is_none_or(|s| r.state == s))
            .cloned()
            .collect();

        // processing > uploaded > completed > error, then upload_time descending.
        matching.sort_by(|a, b| {
            a.state
                .list_priority()
                .cmp(&b.state.list_priority())
                .then_with(|| b.upload_time.cmp(&a.upload_time))
        });

        let total_matching = matching.len();
        let items = match (filter.limit, filter.offset) {
            (Some(limit), offset) => matching.into_iter().skip(offset).take(limit).collect(),
            (None, 0) => matching,
            (None, offset) => matching.into_iter().skip(offset).collect(),
        };

        ListResult {
            items,
            statistics,
            total_matching,
        }
    }

    /// Apply `mutate` to a clone of the record, validate the result against
    /// invariants 1-4, then commit. Rejected mutations leave the record
    /// untouched.
    pub fn update<F>(&self, id: FileId, mutate: F) -> CoreResult<FileRecord>
    where
        F: FnOnce(&mut FileRecord),
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let old = inner.files.get(&id).ok_or(CoreError::NotFound(id))?.clone();
        let mut updated = old.clone();
        mutate(&mut updated);
        validate_transition(&old, &updated)?;

        untrack_indices(&mut inner, &old);
        track_indices(&mut inner, &updated);
        inner.files.insert(id, updated.clone());
        Ok(updated)
    }

    /// Forbidden while `state = Processing && !cancelled` (invariant in
    /// `FileRecord` lifecycle, §3.3).
    pub fn remove(&self, id: FileId) -> CoreResult<FileRecord> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let rec = inner.files.get(&id).ok_or(CoreError::NotFound(id))?.clone();
        if rec.state == FileState::Processing && !rec.cancelled {
            return Err(CoreError::conflict(
                "cannot delete a file while it is processing; stop it first",
            ));
        }
        untrack_indices(&mut inner, &rec);
        inner.files.shift_remove(&id);
        Ok(rec)
    }

    /// Remove every non-processing record and return the removed records, so
    /// the caller can also clean up their on-disk artifacts. Used by the
    /// `_clear_all` delete target.
    pub fn clear_all_non_processing(&self) -> Vec<FileRecord> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let to_remove: Vec<FileId> = inner
            .files
            .values()
            .filter(|r| r.state != FileState::Processing)
            .map(|r| r.id)
            .collect();
        let mut removed = Vec::with_capacity(to_remove.len());
        for id in &to_remove {
            if let Some(rec) = inner.files.get(id).cloned() {
                untrack_indices(&mut inner, &rec);
                removed.push(rec);
            }
            inner.files.shift_remove(id);
        }
        removed
    }

    /// Merge history records into the live catalogue, never overwriting a
    /// record currently `Processing` or `Uploaded`.
    pub fn merge_history(&self, records: Vec<FileRecord>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for rec in records {
            match inner.files.get(&rec.id) {
                Some(existing)
                    if matches!(existing.state, FileState::Processing | FileState::Uploaded) =>
                {
                    continue;
                }
                _ => {
                    track_indices(&mut inner, &rec);
                    inner.files.insert(rec.id, rec);
                }
            }
        }
    }

    /// Snapshot of every `Completed` record, for `HistoryStore::save`.
    pub fn completed_snapshot(&self) -> Vec<FileRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .completed
            .iter()
            .filter_map(|id| inner.files.get(id).cloned())
            .collect()
    }
}

fn track_indices(inner: &mut Inner, rec: &FileRecord) {
    match rec.state {
        FileState::Processing => {
            inner.processing.insert(rec.id);
            inner.completed.remove(&rec.id);
        }
        FileState::Completed => {
            inner.completed.insert(rec.id);
            inner.processing.remove(&rec.id);
        }
        _ => {
            inner.processing.remove(&rec.id);
            inner.completed.remove(&rec.id);
        }
    }
}

fn untrack_indices(inner: &mut Inner, rec: &FileRecord) {
    inner.processing.remove(&rec.id);
    inner.completed.remove(&rec.id);
}

/// Invariants 2 & 3 from the data model.
fn validate_transition(old: &FileRecord, new: &FileRecord) -> CoreResult<()> {
    if old.id != new.id {
        return Err(CoreError::Internal("id changed during update".into()));
    }

    // Progress may only regress when the record is entering `Error` (an
    // error can land at any point) or `Uploaded` (a cancellation reset to
    // zero) — never while it stays in place.
    let regression_allowed = matches!(new.state, FileState::Error | FileState::Uploaded);
    if !regression_allowed && new.progress < old.progress {
        return Err(CoreError::validation(format!(
            "progress regression for {}: {} -> {}",
            old.id, old.progress, new.progress
        )));
    }

    match old.state {
        FileState::Completed if new.state != FileState::Completed => Err(CoreError::conflict(
            "completed records are terminal except for deletion",
        )),
        FileState::Error if !matches!(new.state, FileState::Error | FileState::Processing) => {
            Err(CoreError::conflict(
                "error records may only transition to processing via retranscribe",
            ))
        }
        _ => Ok(()),
    }
}

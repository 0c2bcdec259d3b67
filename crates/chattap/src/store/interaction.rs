//! JSON-file interaction log with per-conversation merge
//!
//! Every capture goes through [`InteractionStore::merge_or_append`]:
//! 1. an in-memory map of `conv_id -> highest messages_count` drops captures
//!    that are no more complete than one already seen;
//! 2. under the exclusive write lock the document is loaded, the record either
//!    replaces the slot with the same `conv_id` or is appended, and the whole
//!    document is atomically replaced on disk.
//!
//! Readers take the shared lock and never observe a partially written file.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::types::{InteractionRecord, StoreDocument, iso_now};
use crate::conversation::short_id;
use crate::error::{ChatTapError, Result};

/// What `merge_or_append` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A capture at least as complete was already seen in this process
    Stale { cached: usize },
    /// The stored record is more complete than this one
    Superseded { stored: usize },
    /// Replaced the existing record at `index`
    Replaced { index: usize },
    /// Appended a new record at `index`
    Appended { index: usize },
}

/// Process-wide owner of the interaction log file
#[derive(Debug)]
pub struct InteractionStore {
    path: PathBuf,
    lock: RwLock<()>,
    seen: DashMap<String, usize>,
}

impl InteractionStore {
    /// Open the log at `path`, creating its parent directory if needed.
    ///
    /// The file itself is only created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let dir = parent_dir(&path);
        std::fs::create_dir_all(&dir).map_err(|e| {
            ChatTapError::Storage(format!(
                "Failed to create data directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            path,
            lock: RwLock::new(()),
            seen: DashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge a captured record into the log.
    ///
    /// Blocking: call from `spawn_blocking` when on an async runtime.
    pub fn merge_or_append(&self, mut record: InteractionRecord) -> Result<MergeOutcome> {
        let count = record.messages_count;

        match self.seen.entry(record.conv_id.clone()) {
            Entry::Occupied(mut entry) => {
                let cached = *entry.get();
                if cached >= count {
                    debug!(
                        conv_id = short_id(&record.conv_id),
                        cached, count, "Skipping capture, already seen a complete one"
                    );
                    return Ok(MergeOutcome::Stale { cached });
                }
                entry.insert(count);
            }
            Entry::Vacant(entry) => {
                entry.insert(count);
            }
        }

        let _guard = self.write_guard();
        let mut document = self.load_document();

        let outcome = match document.position(&record.conv_id) {
            Some(index) => {
                let existing = &document.prompts[index];
                if existing.messages_count > count {
                    let stored = existing.messages_count;
                    self.seen.insert(record.conv_id.clone(), stored);
                    return Ok(MergeOutcome::Superseded { stored });
                }
                if !existing.timestamp.is_empty() {
                    record.timestamp = existing.timestamp.clone();
                }
                record.updated_at = iso_now();
                document.prompts[index] = record;
                MergeOutcome::Replaced { index }
            }
            None => {
                document.prompts.push(record);
                MergeOutcome::Appended {
                    index: document.prompts.len() - 1,
                }
            }
        };

        document.stamp();
        self.persist(&document)?;
        Ok(outcome)
    }

    /// Current document, or a fresh empty one when the file is absent,
    /// empty, or unreadable.
    pub fn read_snapshot(&self) -> StoreDocument {
        let _guard = self.read_guard();
        self.load_document()
    }

    /// Last modification time of the log file
    pub fn modified_time(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_document(&self) -> StoreDocument {
        read_document(&self.path)
    }

    fn persist(&self, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let dir = parent_dir(&self.path);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
            ChatTapError::Storage(format!(
                "Failed to create temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            ChatTapError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

/// Read the log at `path` without touching the filesystem otherwise.
///
/// A missing, empty, or unreadable file yields an empty document.
pub fn read_document(path: &Path) -> StoreDocument {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return StoreDocument::empty(),
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            return StoreDocument::empty();
        }
    };

    if content.trim().is_empty() {
        return StoreDocument::empty();
    }

    match serde_json::from_str::<StoreDocument>(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!(
                "Interaction log {} is not a valid document, starting fresh: {e}",
                path.display()
            );
            StoreDocument::empty()
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("log.json")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("data/log.json")),
            PathBuf::from("data")
        );
    }

    #[test]
    fn test_open_creates_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("log.json");
        let store = InteractionStore::open(&path).unwrap();

        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
        assert!(store.modified_time().is_none());
    }

    #[test]
    fn test_read_document_creates_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("absent").join("ai_prompts.json");

        let document = read_document(&missing);

        assert_eq!(document.total_prompts, 0);
        assert!(!temp_dir.path().join("absent").exists());
    }
}

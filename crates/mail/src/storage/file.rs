//! File-backed record storage, one pretty-printed JSON file per message

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use super::RecordStore;
use crate::config::RecordNaming;
use crate::models::MessageRecord;

/// File-based record storage
///
/// Directory structure:
/// ```text
/// records/
///   18c2f0e4d1a2b3c4.json     # keyed by Gmail message ID (default)
///   email_1.json              # or by download position (ordinal naming)
/// ```
///
/// The directory is created lazily on first write, so a store that was never
/// written to simply loads as empty.
pub struct FileRecordStore {
    root: PathBuf,
    naming: RecordNaming,
}

impl FileRecordStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl AsRef<Path>, naming: RecordNaming) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            naming,
        }
    }

    /// Directory holding the record files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the file path for a record
    fn record_path(&self, ordinal: usize, record: &MessageRecord) -> PathBuf {
        let filename = match self.naming {
            RecordNaming::MessageId if !record.id.is_empty() => {
                format!("{}.json", sanitize_file_stem(&record.id))
            }
            _ => format!("email_{}.json", ordinal),
        };
        self.root.join(filename)
    }

    /// Read and parse a single record file
    fn read_record(path: &Path) -> Result<MessageRecord> {
        let content = fs::read_to_string(path)?;
        let record = serde_json::from_str(&content)?;
        Ok(record)
    }
}

/// Replace anything that is not safe in a file name
fn sanitize_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl RecordStore for FileRecordStore {
    fn put(&self, ordinal: usize, record: &MessageRecord) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create records directory: {}", self.root.display())
        })?;

        let path = self.record_path(ordinal, record);
        let content = serde_json::to_string_pretty(record)?;

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to move record into {}", path.display()))?;

        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MessageRecord>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Records folder not found: {}", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list records directory: {}", self.root.display())
                });
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Error listing {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Error reading {}: {:#}", path.display(), e),
            }
        }

        info!("Loaded {} emails from '{}'", records.len(), self.root.display());
        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to delete {}", self.root.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str) -> MessageRecord {
        MessageRecord::new(id)
            .with_subject(format!("Subject {id}"))
            .with_body("Hello")
    }

    #[test]
    fn test_put_load_by_message_id() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().join("records"), RecordNaming::MessageId);

        store.put(1, &record("abc123")).unwrap();
        store.put(2, &record("def456")).unwrap();

        assert!(dir.path().join("records/abc123.json").exists());
        let mut loaded = store.load_all().unwrap();
        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(loaded, vec![record("abc123"), record("def456")]);
    }

    #[test]
    fn test_same_id_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), RecordNaming::MessageId);

        store.put(1, &record("abc123")).unwrap();
        store.put(7, &record("abc123").with_body("Updated")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].body, "Updated");
    }

    #[test]
    fn test_ordinal_naming() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), RecordNaming::Ordinal);

        store.put(1, &record("abc123")).unwrap();
        store.put(2, &record("abc123")).unwrap();

        assert!(dir.path().join("email_1.json").exists());
        assert!(dir.path().join("email_2.json").exists());
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_unsafe_ids_are_sanitized() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), RecordNaming::MessageId);

        store.put(1, &record("../escape")).unwrap();

        assert!(dir.path().join("___escape.json").exists());
        assert_eq!(store.load_all().unwrap()[0].id, "../escape");
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().join("never-created"), RecordNaming::MessageId);

        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_malformed_and_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::new(dir.path(), RecordNaming::MessageId);

        store.put(1, &record("good1")).unwrap();
        store.put(2, &record("good2")).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut ids: Vec<String> = store.load_all().unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["good1", "good2"]);
    }

    #[test]
    fn test_clear_removes_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("records");
        let store = FileRecordStore::new(&root, RecordNaming::MessageId);

        store.put(1, &record("abc123")).unwrap();
        store.clear().unwrap();

        assert!(!root.exists());
        assert!(store.load_all().unwrap().is_empty());
        // Clearing an absent directory is not an error
        store.clear().unwrap();
    }
}

//! In-memory storage implementation, used for testing

use anyhow::{Result, anyhow};
use std::sync::Mutex;

use super::RecordStore;
use crate::models::MessageRecord;

/// In-memory implementation of RecordStore
///
/// Keeps records in write order. Writing a record whose ID is already stored
/// replaces it, mirroring the file store's default naming.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<MessageRecord>>,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: Vec<MessageRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, _ordinal: usize, record: &MessageRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))?;

        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<MessageRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))?;
        Ok(records.clone())
    }

    fn clear(&self) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_replaces_same_id() {
        let store = InMemoryRecordStore::new();
        store.put(1, &MessageRecord::new("m1").with_subject("first")).unwrap();
        store.put(2, &MessageRecord::new("m1").with_subject("second")).unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject, "second");
    }

    #[test]
    fn test_clear() {
        let store = InMemoryRecordStore::with_records(vec![MessageRecord::new("m1")]);
        assert_eq!(store.len(), 1);
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}

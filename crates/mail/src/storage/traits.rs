//! Storage trait definitions

use std::sync::Arc;

use crate::models::MessageRecord;
use anyhow::Result;

/// Trait for message record storage
pub trait RecordStore: Send + Sync {
    /// Persist one record
    ///
    /// `ordinal` is the record's 1-based position in the current download;
    /// stores that key by message ID ignore it.
    fn put(&self, ordinal: usize, record: &MessageRecord) -> Result<()>;

    /// Load every stored record
    ///
    /// A store that was never written to is empty, not an error. Records that
    /// cannot be read are skipped. Order is unspecified.
    fn load_all(&self) -> Result<Vec<MessageRecord>>;

    /// Delete every stored record
    fn clear(&self) -> Result<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn put(&self, ordinal: usize, record: &MessageRecord) -> Result<()> {
        (**self).put(ordinal, record)
    }

    fn load_all(&self) -> Result<Vec<MessageRecord>> {
        (**self).load_all()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

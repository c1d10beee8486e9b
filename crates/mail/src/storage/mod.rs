//! Storage for downloaded message records
//!
//! The trait-based design allows swapping between the file-backed store used
//! by the tools and an in-memory store used in tests.

mod file;
mod memory;
mod traits;

pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;

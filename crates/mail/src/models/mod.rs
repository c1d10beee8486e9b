//! Domain models for downloaded mail and the model catalog

mod catalog;
mod label;
mod record;

pub use catalog::{ModelCatalog, ModelDescriptor};
pub use label::Label;
pub use record::{MessageRecord, NO_SUBJECT, UNKNOWN_DATE, UNKNOWN_RECIPIENT, UNKNOWN_SENDER};

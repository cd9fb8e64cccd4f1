//! Record of finished jobs.

pub mod record;
pub mod store;

pub use record::{HistoryFilter, HistoryRecord, OutputDescriptor, RecordStatus};
pub use store::HistoryStore;

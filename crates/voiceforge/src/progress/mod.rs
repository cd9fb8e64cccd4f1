//! Job progress: derived snapshots and the live event stream.

pub mod aggregate;
pub mod broadcaster;

pub use aggregate::{snapshot, ItemView, JobProgress, ProgressSnapshot};
pub use broadcaster::{JobProgressBroadcaster, ProgressEvent, ProgressEventKind};

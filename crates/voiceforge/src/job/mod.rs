//! Job data model: items, batch jobs and their settings.

pub mod batch;
pub mod item;
pub mod settings;

pub use batch::{BatchJob, ExecutionPolicy, JobKind, JobStatus};
pub use item::{ItemStatus, JobItem, TransitionError};
pub use settings::{
    AudioFormat, OutputNaming, OutputQuality, OutputSettings, VoiceAssignment, VoiceRef,
    VoiceSettings,
};

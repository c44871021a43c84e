//! Data models for marathon-ingest
//!
//! - Reference snapshot (event + categories) captured per run
//! - Row/candidate/result records flowing through the pipeline
//! - Run state machine and statistics
//! - Fault-tolerance policy

pub mod policy;
pub mod record;
pub mod reference;
pub mod run;

pub use policy::PipelinePolicy;
pub use record::{
    CandidateRecord, Cell, CheckpointEntry, NewCheckpoint, NewResult, PersistedCheckpoint,
    PersistedResult, RawRow,
};
pub use reference::{Event, EventCategory, ReferenceSnapshot, SnapshotPayload};
pub use run::{PipelineStage, RunState, RunStatistics, SkippedRow};

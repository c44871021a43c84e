//! Bulk result ingestion
//!
//! RowSource → RowParser → RecordValidator → RecordAssembler → BatchWriter,
//! driven chunk by chunk by `ChunkPipeline` and launched by `JobRunner`.

pub mod assembler;
pub mod error;
pub mod job_runner;
pub mod pipeline;
pub mod reference_cache;
pub mod retry;
pub mod row_parser;
pub mod row_source;
pub mod validator;
pub mod writer;

pub use error::{ErrorKind, PipelineError, RowError, StartError, StoreError};
pub use job_runner::{JobRunner, StatusStore};
pub use pipeline::{ChunkPipeline, RunContext};
pub use row_source::{open_row_source, MemoryRowSource, RowSource};

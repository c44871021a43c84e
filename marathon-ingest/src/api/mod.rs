//! HTTP API handlers for marathon-ingest

pub mod batch_upload;
pub mod health;
pub mod sse;

pub use batch_upload::batch_routes;
pub use health::health_routes;
pub use sse::batch_event_stream;

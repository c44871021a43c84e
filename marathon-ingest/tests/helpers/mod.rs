//! Test Helper Utilities
//!
//! Shared fixtures for marathon-ingest integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;
pub mod flaky_store;

pub use db_utils::{create_test_db, seed_event, SeededEvent};
pub use fixtures::{memory_source, result_cells, wait_for_terminal, write_csv};
pub use flaky_store::FlakyStore;

//! Database Test Utilities

use chrono::{NaiveDate, NaiveTime};
use marathon_ingest::db::events::{insert_category, insert_event};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tempfile::TempDir;

/// Category names seeded for every test event
pub const CATEGORIES: [&str; 3] = ["Full Marathon (42K)", "Half Marathon (21K)", "10K"];

/// Create a temporary database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test_marathon.db");
    let pool = marathon_ingest::db::init_database(&db_path)
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

pub struct SeededEvent {
    pub event_id: i64,
    pub category_ids: HashMap<String, i64>,
}

/// Insert an event with the standard categories
pub async fn seed_event(pool: &SqlitePool) -> SeededEvent {
    let event_id = insert_event(
        pool,
        "City Marathon",
        NaiveDate::from_ymd_opt(2025, 1, 19).unwrap(),
        Some("Mumbai"),
    )
    .await
    .expect("Failed to insert event");

    let mut category_ids = HashMap::new();
    for name in CATEGORIES {
        let id = insert_category(pool, event_id, name, NaiveTime::from_hms_opt(5, 30, 0))
            .await
            .expect("Failed to insert category");
        category_ids.insert(name.to_string(), id);
    }

    SeededEvent {
        event_id,
        category_ids,
    }
}

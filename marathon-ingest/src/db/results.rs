//! Result and checkpoint database operations

use chrono::NaiveTime;
use marathon_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;

use crate::models::{NewResult, PersistedCheckpoint, PersistedResult};

/// Whether a bib number is already taken for an event
pub async fn exists_duplicate(pool: &SqlitePool, event_id: i64, bib_number: &str) -> Result<bool> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM results WHERE event_id = ? AND bib_number = ?)",
    )
    .bind(event_id)
    .bind(bib_number)
    .fetch_one(pool)
    .await?;

    Ok(exists != 0)
}

/// Insert results with their checkpoints in one transaction
///
/// Any failure rolls back the whole set. Returns the new result ids in
/// input order.
pub async fn save_all(pool: &SqlitePool, records: &[NewResult]) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(records.len());

    for record in records {
        ids.push(insert_result(&mut *tx, record).await?);
    }

    tx.commit().await?;
    Ok(ids)
}

async fn insert_result(conn: &mut SqliteConnection, record: &NewResult) -> Result<i64> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO results (
            event_id, category_id, bib_number, participant_name, gender,
            age_category, overall_rank, gender_rank, age_category_rank,
            chip_time, gun_time
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.event_id)
    .bind(record.category_id)
    .bind(&record.bib_number)
    .bind(&record.participant_name)
    .bind(&record.gender)
    .bind(&record.age_category)
    .bind(&record.overall_rank)
    .bind(&record.gender_rank)
    .bind(&record.age_category_rank)
    .bind(record.chip_time)
    .bind(record.gun_time)
    .execute(&mut *conn)
    .await?;

    let result_id = inserted.last_insert_rowid();

    for checkpoint in &record.checkpoints {
        sqlx::query("INSERT INTO checkpoints (result_id, checkpoint_number, time) VALUES (?, ?, ?)")
            .bind(result_id)
            .bind(checkpoint.checkpoint_number as i64)
            .bind(checkpoint.time)
            .execute(&mut *conn)
            .await?;
    }

    Ok(result_id)
}

/// Number of results stored for an event
pub async fn count_by_event(pool: &SqlitePool, event_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE event_id = ?")
        .bind(event_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Delete every result of an event (checkpoints cascade)
///
/// Returns the number of results deleted.
pub async fn delete_all_by_event(pool: &SqlitePool, event_id: i64) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM results WHERE event_id = ?")
        .bind(event_id)
        .execute(pool)
        .await?;

    Ok(deleted.rows_affected())
}

/// Results of an event with category name and ordered checkpoints
pub async fn results_for_event(pool: &SqlitePool, event_id: i64) -> Result<Vec<PersistedResult>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.event_id, r.category_id, c.category_name, r.bib_number,
               r.participant_name, r.gender, r.age_category, r.overall_rank,
               r.gender_rank, r.age_category_rank, r.chip_time, r.gun_time
        FROM results r
        JOIN event_categories c ON c.id = r.category_id
        WHERE r.event_id = ?
        ORDER BY r.id
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    let mut checkpoints = checkpoints_for_event(pool, event_id).await?;

    rows.into_iter()
        .map(|row| -> Result<PersistedResult> {
            let id: i64 = row.try_get("id")?;
            Ok(PersistedResult {
                id,
                event_id: row.try_get("event_id")?,
                category_id: row.try_get("category_id")?,
                category_name: row.try_get("category_name")?,
                bib_number: row.try_get("bib_number")?,
                participant_name: row.try_get("participant_name")?,
                gender: row.try_get("gender")?,
                age_category: row.try_get("age_category")?,
                overall_rank: row.try_get("overall_rank")?,
                gender_rank: row.try_get("gender_rank")?,
                age_category_rank: row.try_get("age_category_rank")?,
                chip_time: row.try_get("chip_time")?,
                gun_time: row.try_get("gun_time")?,
                checkpoints: checkpoints.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

async fn checkpoints_for_event(
    pool: &SqlitePool,
    event_id: i64,
) -> Result<HashMap<i64, Vec<PersistedCheckpoint>>> {
    let rows = sqlx::query(
        r#"
        SELECT cp.id, cp.result_id, cp.checkpoint_number, cp.time
        FROM checkpoints cp
        JOIN results r ON r.id = cp.result_id
        WHERE r.event_id = ?
        ORDER BY cp.result_id, cp.checkpoint_number
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    let mut by_result: HashMap<i64, Vec<PersistedCheckpoint>> = HashMap::new();
    for row in rows {
        let number: i64 = row.try_get("checkpoint_number")?;
        let time: NaiveTime = row.try_get("time")?;
        let checkpoint = PersistedCheckpoint {
            id: row.try_get("id")?,
            result_id: row.try_get("result_id")?,
            checkpoint_number: number as u32,
            time,
        };
        by_result
            .entry(checkpoint.result_id)
            .or_default()
            .push(checkpoint);
    }

    Ok(by_result)
}

/// Number of checkpoint rows stored for an event
pub async fn count_checkpoints_by_event(pool: &SqlitePool, event_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM checkpoints cp JOIN results r ON r.id = cp.result_id WHERE r.event_id = ?",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

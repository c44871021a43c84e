//! Event and category database operations

use chrono::{NaiveDate, NaiveTime};
use marathon_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{Event, EventCategory};

/// Insert an event, returning its id
pub async fn insert_event(
    pool: &SqlitePool,
    event_name: &str,
    event_date: NaiveDate,
    city: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO events (event_name, event_date, city) VALUES (?, ?, ?)")
        .bind(event_name)
        .bind(event_date)
        .bind(city)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert a race category for an event, returning its id
pub async fn insert_category(
    pool: &SqlitePool,
    event_id: i64,
    category_name: &str,
    flag_off_time: Option<NaiveTime>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO event_categories (event_id, category_name, flag_off_time) VALUES (?, ?, ?)",
    )
    .bind(event_id)
    .bind(category_name)
    .bind(flag_off_time)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load an event by id
pub async fn find_event(pool: &SqlitePool, event_id: i64) -> Result<Option<Event>> {
    let row = sqlx::query(
        r#"
        SELECT id, event_name, event_date, event_description, organizer_name,
               organizer_website, city, state, country, image_url
        FROM events
        WHERE id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(Event {
        id: row.try_get("id")?,
        event_name: row.try_get("event_name")?,
        event_date: row.try_get("event_date")?,
        event_description: row.try_get("event_description")?,
        organizer_name: row.try_get("organizer_name")?,
        organizer_website: row.try_get("organizer_website")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        image_url: row.try_get("image_url")?,
    }))
}

/// All categories of an event, ordered by id
pub async fn categories_for_event(pool: &SqlitePool, event_id: i64) -> Result<Vec<EventCategory>> {
    let rows = sqlx::query(
        "SELECT id, event_id, category_name, flag_off_time FROM event_categories WHERE event_id = ? ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<EventCategory> {
            Ok(EventCategory {
                id: row.try_get("id")?,
                event_id: row.try_get("event_id")?,
                category_name: row.try_get("category_name")?,
                flag_off_time: row.try_get("flag_off_time")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let pool = crate::db::init_database(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (temp_dir, pool)
    }

    #[tokio::test]
    async fn test_event_round_trip() {
        let (_dir, pool) = setup().await;
        let date = NaiveDate::from_ymd_opt(2025, 1, 19).unwrap();

        let id = insert_event(&pool, "City Marathon", date, Some("Mumbai"))
            .await
            .unwrap();
        let event = find_event(&pool, id).await.unwrap().unwrap();

        assert_eq!(event.event_name, "City Marathon");
        assert_eq!(event.event_date, date);
        assert_eq!(event.city.as_deref(), Some("Mumbai"));
        assert_eq!(event.country, None);
    }

    #[tokio::test]
    async fn test_missing_event_is_none() {
        let (_dir, pool) = setup().await;
        assert!(find_event(&pool, 404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_in_insert_order() {
        let (_dir, pool) = setup().await;
        let date = NaiveDate::from_ymd_opt(2025, 1, 19).unwrap();
        let event_id = insert_event(&pool, "City Marathon", date, None).await.unwrap();

        let flag_off = NaiveTime::from_hms_opt(5, 30, 0);
        insert_category(&pool, event_id, "Full Marathon (42K)", flag_off)
            .await
            .unwrap();
        insert_category(&pool, event_id, "10K", None).await.unwrap();

        let categories = categories_for_event(&pool, event_id).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].category_name, "Full Marathon (42K)");
        assert_eq!(categories[0].flag_off_time, flag_off);
        assert_eq!(categories[1].flag_off_time, None);
    }
}

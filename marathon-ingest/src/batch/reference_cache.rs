//! Per-run reference data
//!
//! `load_snapshot` fetches the event and its categories once, at start.
//! The snapshot then travels to the run as a `SnapshotPayload` and is
//! decoded by `ReferenceCache`, which only rebuilds when asked for a
//! different event than the one it holds.

use std::sync::Arc;

use super::error::{PipelineError, StartError};
use crate::models::{ReferenceSnapshot, SnapshotPayload};
use crate::store::ResultStore;

/// Fetch the event and categories; fails if the event does not exist
pub async fn load_snapshot(
    store: &dyn ResultStore,
    event_id: i64,
) -> Result<ReferenceSnapshot, StartError> {
    let event = store
        .find_event_by_id(event_id)
        .await?
        .ok_or(StartError::EventNotFound(event_id))?;
    let categories = store.categories_for_event(event_id).await?;

    tracing::debug!(
        event_id,
        event_name = %event.event_name,
        categories = categories.len(),
        "Loaded reference data"
    );

    Ok(ReferenceSnapshot::new(event, categories))
}

/// Decoded snapshot keyed by event id
#[derive(Debug, Default)]
pub struct ReferenceCache {
    current_event_id: Option<i64>,
    snapshot: Option<Arc<ReferenceSnapshot>>,
    builds: u32,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for the payload's event, decoding only on event change
    pub fn ensure(&mut self, payload: &SnapshotPayload) -> Result<Arc<ReferenceSnapshot>, PipelineError> {
        if let (Some(current), Some(snapshot)) = (self.current_event_id, &self.snapshot) {
            if current == payload.event_id {
                return Ok(Arc::clone(snapshot));
            }
        }

        tracing::info!(
            event_id = payload.event_id,
            previous = ?self.current_event_id,
            "Building reference snapshot"
        );

        let snapshot = payload.decode().map_err(|e| PipelineError::Snapshot {
            event_id: payload.event_id,
            message: e.to_string(),
        })?;

        tracing::info!(
            event_id = payload.event_id,
            event_name = %snapshot.event().event_name,
            categories = snapshot.category_count(),
            "Reference snapshot ready"
        );

        let snapshot = Arc::new(snapshot);
        self.current_event_id = Some(payload.event_id);
        self.snapshot = Some(Arc::clone(&snapshot));
        self.builds += 1;
        Ok(snapshot)
    }

    pub fn current_event_id(&self) -> Option<i64> {
        self.current_event_id
    }

    /// Number of times a snapshot was decoded
    pub fn build_count(&self) -> u32 {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, EventCategory};
    use chrono::NaiveDate;

    fn payload(event_id: i64, categories: &[&str]) -> SnapshotPayload {
        let event = Event {
            id: event_id,
            event_name: format!("Event {}", event_id),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 19).unwrap(),
            event_description: None,
            organizer_name: None,
            organizer_website: None,
            city: None,
            state: None,
            country: None,
            image_url: None,
        };
        let categories = categories
            .iter()
            .enumerate()
            .map(|(i, name)| EventCategory {
                id: i as i64 + 1,
                event_id,
                category_name: name.to_string(),
                flag_off_time: None,
            })
            .collect();
        ReferenceSnapshot::new(event, categories).encode().unwrap()
    }

    #[test]
    fn test_same_event_is_not_rebuilt() {
        let mut cache = ReferenceCache::new();
        let p = payload(1, &["10K", "21K"]);

        let first = cache.ensure(&p).unwrap();
        let second = cache.ensure(&p).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.current_event_id(), Some(1));
        assert!(first.category_by_name("21K").is_some());
    }

    #[test]
    fn test_different_event_rebuilds() {
        let mut cache = ReferenceCache::new();
        cache.ensure(&payload(1, &["10K"])).unwrap();
        let snapshot = cache.ensure(&payload(2, &["5K"])).unwrap();

        assert_eq!(cache.build_count(), 2);
        assert_eq!(snapshot.event_id(), 2);
        assert!(snapshot.category_by_name("10K").is_none());
    }

    #[test]
    fn test_corrupt_payload_fails() {
        let mut cache = ReferenceCache::new();
        let mut p = payload(1, &["10K"]);
        p.categories_data = "not json".to_string();

        let err = cache.ensure(&p).unwrap_err();
        assert!(matches!(err, PipelineError::Snapshot { event_id: 1, .. }));
        assert_eq!(cache.current_event_id(), None);
    }
}

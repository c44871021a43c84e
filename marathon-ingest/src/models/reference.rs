//! Reference data captured once per run
//!
//! The snapshot (event + category mapping) is immutable for the lifetime of a
//! run so every category lookup sees the same data, even if the event is
//! edited while the run is in progress.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Race event metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub organizer_website: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Race category belonging to an event (e.g. "Half Marathon")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id: i64,
    pub event_id: i64,
    pub category_name: String,
    #[serde(default)]
    pub flag_off_time: Option<NaiveTime>,
}

/// Immutable (event, category-name → category) pair used by a run
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    event: Event,
    categories: HashMap<String, EventCategory>,
}

impl ReferenceSnapshot {
    /// Build a snapshot from an event and its categories
    ///
    /// Category names are matched case-sensitively. When two categories share
    /// a name the first one wins.
    pub fn new(event: Event, categories: Vec<EventCategory>) -> Self {
        let mut by_name = HashMap::with_capacity(categories.len());
        for category in categories {
            if by_name.contains_key(&category.category_name) {
                tracing::warn!(
                    event_id = event.id,
                    category = %category.category_name,
                    "Duplicate category name in event, keeping first"
                );
                continue;
            }
            by_name.insert(category.category_name.clone(), category);
        }

        Self {
            event,
            categories: by_name,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_id(&self) -> i64 {
        self.event.id
    }

    /// Look up a category by exact name
    pub fn category_by_name(&self, name: &str) -> Option<&EventCategory> {
        self.categories.get(name)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Categories sorted by id (stable order for serialization)
    pub fn categories(&self) -> Vec<&EventCategory> {
        let mut categories: Vec<&EventCategory> = self.categories.values().collect();
        categories.sort_by_key(|c| c.id);
        categories
    }

    /// Serialize for transport into the run's execution context
    pub fn encode(&self) -> serde_json::Result<SnapshotPayload> {
        Ok(SnapshotPayload {
            event_id: self.event.id,
            event_data: serde_json::to_string(&self.event)?,
            categories_data: serde_json::to_string(&self.categories())?,
        })
    }
}

/// Text form of a snapshot, carried as run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub event_id: i64,
    pub event_data: String,
    pub categories_data: String,
}

impl SnapshotPayload {
    /// Rebuild the structured snapshot
    pub fn decode(&self) -> serde_json::Result<ReferenceSnapshot> {
        let event: Event = serde_json::from_str(&self.event_data)?;
        let categories: Vec<EventCategory> = serde_json::from_str(&self.categories_data)?;
        Ok(ReferenceSnapshot::new(event, categories))
    }
}

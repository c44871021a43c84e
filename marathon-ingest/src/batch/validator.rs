//! Candidate record validation
//!
//! Checks run in order: field constraints, duplicate bib, race category.
//! Every violation is collected; the error kind is that of the first one.

use super::error::{ErrorKind, RowError};
use crate::models::{CandidateRecord, ReferenceSnapshot};

pub const MAX_BIB_LENGTH: usize = 20;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_CHECKPOINT_NUMBER: u32 = 1;
pub const MAX_CHECKPOINT_NUMBER: u32 = 20;

const ALLOWED_GENDERS: [&str; 6] = ["M", "F", "O", "Male", "Female", "OTHER"];

/// Validate a candidate against the run snapshot
///
/// `exists_duplicate` answers whether `(event_id, bib)` is already taken.
pub fn validate<F>(
    candidate: &CandidateRecord,
    snapshot: &ReferenceSnapshot,
    exists_duplicate: F,
) -> Result<(), RowError>
where
    F: FnOnce(i64, &str) -> bool,
{
    let mut violations: Vec<(ErrorKind, String)> = field_violations(candidate)
        .into_iter()
        .map(|reason| (ErrorKind::InvalidField, reason))
        .collect();

    let bib = candidate.bib_number.as_str();
    if !bib.is_empty() && exists_duplicate(snapshot.event_id(), bib) {
        violations.push((
            ErrorKind::DuplicateBib,
            format!("Duplicate bib number: {}", bib),
        ));
    }

    if !candidate.race_category.is_empty()
        && snapshot.category_by_name(&candidate.race_category).is_none()
    {
        violations.push((
            ErrorKind::UnknownCategory,
            format!("Invalid category: {}", candidate.race_category),
        ));
    }

    let Some(kind) = violations.first().map(|(kind, _)| *kind) else {
        return Ok(());
    };

    Err(RowError::Validation {
        row: candidate.row_number,
        bib: candidate.bib_number.clone(),
        kind,
        reasons: violations.into_iter().map(|(_, reason)| reason).collect(),
    })
}

fn field_violations(candidate: &CandidateRecord) -> Vec<String> {
    let mut reasons = Vec::new();

    let bib_len = candidate.bib_number.chars().count();
    if bib_len == 0 {
        reasons.push("Bib number is required".to_string());
    } else if bib_len > MAX_BIB_LENGTH {
        reasons.push(format!(
            "Bib number must not exceed {} characters",
            MAX_BIB_LENGTH
        ));
    }

    let name_len = candidate.participant_name.chars().count();
    if name_len == 0 {
        reasons.push("Participant name is required".to_string());
    } else if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&name_len) {
        reasons.push(format!(
            "Participant name must be between {} and {} characters",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        ));
    }

    if let Some(gender) = candidate.gender.as_deref() {
        if !ALLOWED_GENDERS.contains(&gender) {
            reasons.push("Gender must be M, F, O, Male, or Female or OTHER".to_string());
        }
    }

    if candidate.race_category.is_empty() {
        reasons.push("Race category is required".to_string());
    }

    for checkpoint in &candidate.checkpoints {
        if checkpoint.checkpoint_number < MIN_CHECKPOINT_NUMBER {
            reasons.push(format!(
                "Checkpoint number must be at least {}",
                MIN_CHECKPOINT_NUMBER
            ));
        } else if checkpoint.checkpoint_number > MAX_CHECKPOINT_NUMBER {
            reasons.push(format!(
                "Checkpoint number must not exceed {}",
                MAX_CHECKPOINT_NUMBER
            ));
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckpointEntry, Event, EventCategory};
    use chrono::{NaiveDate, NaiveTime};

    fn snapshot() -> ReferenceSnapshot {
        let event = Event {
            id: 7,
            event_name: "City Marathon".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 19).unwrap(),
            event_description: None,
            organizer_name: None,
            organizer_website: None,
            city: None,
            state: None,
            country: None,
            image_url: None,
        };
        let categories = vec![
            EventCategory {
                id: 1,
                event_id: 7,
                category_name: "10K".to_string(),
                flag_off_time: None,
            },
            EventCategory {
                id: 2,
                event_id: 7,
                category_name: "Half Marathon (21K)".to_string(),
                flag_off_time: None,
            },
        ];
        ReferenceSnapshot::new(event, categories)
    }

    fn candidate(bib: &str, name: &str, category: &str) -> CandidateRecord {
        CandidateRecord {
            row_number: 2,
            bib_number: bib.to_string(),
            participant_name: name.to_string(),
            gender: Some("M".to_string()),
            race_category: category.to_string(),
            age_category: None,
            overall_rank: None,
            gender_rank: None,
            age_category_rank: None,
            chip_time: NaiveTime::from_hms_opt(0, 45, 0).unwrap(),
            gun_time: NaiveTime::from_hms_opt(0, 45, 30).unwrap(),
            checkpoints: vec![],
        }
    }

    fn no_duplicates(_: i64, _: &str) -> bool {
        false
    }

    #[test]
    fn test_valid_candidate() {
        let result = validate(&candidate("M001", "John Doe", "10K"), &snapshot(), no_duplicates);
        assert!(result.is_ok());
    }

    #[test]
    fn test_blank_gender_allowed() {
        let mut c = candidate("M001", "John Doe", "10K");
        c.gender = None;
        assert!(validate(&c, &snapshot(), no_duplicates).is_ok());
    }

    #[test]
    fn test_field_violations_collected() {
        let mut c = candidate("M001", "J", "10K");
        c.gender = Some("X".to_string());

        let err = validate(&c, &snapshot(), no_duplicates).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);
        assert_eq!(
            err.to_string(),
            "Validation failed for bib M001: Participant name must be between 2 and 100 characters, Gender must be M, F, O, Male, or Female or OTHER"
        );
    }

    #[test]
    fn test_bib_length_bound() {
        let long_bib = "B".repeat(21);
        let err = validate(&candidate(&long_bib, "John Doe", "10K"), &snapshot(), no_duplicates)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidField);

        let ok_bib = "B".repeat(20);
        assert!(validate(&candidate(&ok_bib, "John Doe", "10K"), &snapshot(), no_duplicates).is_ok());
    }

    #[test]
    fn test_duplicate_bib_has_own_kind() {
        let err = validate(&candidate("F002", "Jane Smith", "10K"), &snapshot(), |event_id, bib| {
            event_id == 7 && bib == "F002"
        })
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateBib);
        assert_eq!(err.bib(), Some("F002"));
        assert!(err.to_string().contains("Duplicate bib number: F002"));
    }

    #[test]
    fn test_unknown_category_is_case_sensitive() {
        let err = validate(&candidate("M001", "John Doe", "10k"), &snapshot(), no_duplicates)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCategory);
        assert!(err.to_string().contains("Invalid category: 10k"));
    }

    #[test]
    fn test_first_violation_sets_kind() {
        let c = candidate("M001", "", "5K");
        let err = validate(&c, &snapshot(), |_, _| true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidField);
        match err {
            RowError::Validation { reasons, .. } => {
                assert_eq!(
                    reasons,
                    vec![
                        "Participant name is required".to_string(),
                        "Duplicate bib number: M001".to_string(),
                        "Invalid category: 5K".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_checkpoint_number_bound() {
        let mut c = candidate("M001", "John Doe", "10K");
        let t = NaiveTime::from_hms_opt(0, 10, 0).unwrap();
        c.checkpoints = (1..=21)
            .map(|n| CheckpointEntry {
                checkpoint_number: n,
                time: t,
            })
            .collect();

        let err = validate(&c, &snapshot(), no_duplicates).unwrap_err();
        assert!(err.to_string().contains("Checkpoint number must not exceed 20"));
    }
}

//! Validated candidate → insertable result

use super::error::{ErrorKind, RowError};
use crate::models::{CandidateRecord, NewCheckpoint, NewResult, ReferenceSnapshot};

/// Map a candidate onto the stored shape
///
/// Resolves the category through the snapshot. A candidate whose category
/// does not resolve is rejected rather than assembled without one.
pub fn assemble(
    candidate: CandidateRecord,
    snapshot: &ReferenceSnapshot,
) -> Result<NewResult, RowError> {
    let Some(category) = snapshot.category_by_name(&candidate.race_category) else {
        return Err(RowError::Validation {
            row: candidate.row_number,
            reasons: vec![format!("Invalid category: {}", candidate.race_category)],
            bib: candidate.bib_number,
            kind: ErrorKind::UnknownCategory,
        });
    };

    let checkpoints = candidate
        .checkpoints
        .iter()
        .map(|entry| NewCheckpoint {
            checkpoint_number: entry.checkpoint_number,
            time: entry.time,
        })
        .collect();

    Ok(NewResult {
        event_id: snapshot.event_id(),
        category_id: category.id,
        bib_number: candidate.bib_number,
        participant_name: candidate.participant_name,
        gender: candidate.gender,
        age_category: candidate.age_category,
        overall_rank: candidate.overall_rank,
        gender_rank: candidate.gender_rank,
        age_category_rank: candidate.age_category_rank,
        chip_time: candidate.chip_time,
        gun_time: candidate.gun_time,
        checkpoints,
    })
}

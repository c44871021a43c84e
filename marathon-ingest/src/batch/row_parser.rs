//! Raw row → candidate record
//!
//! Fixed column layout:
//!
//! | col | field              |
//! |-----|--------------------|
//! | 0   | bib number         |
//! | 1   | participant name   |
//! | 2   | gender             |
//! | 3   | race category      |
//! | 4   | age category       |
//! | 5   | overall rank       |
//! | 6   | gender rank        |
//! | 7   | age category rank  |
//! | 8   | chip time          |
//! | 9   | gun time           |
//! | 10+ | checkpoint 1..N    |

use chrono::NaiveTime;

use super::error::RowError;
use crate::models::{CandidateRecord, CheckpointEntry, RawRow};

pub const COL_BIB_NUMBER: usize = 0;
pub const COL_PARTICIPANT_NAME: usize = 1;
pub const COL_GENDER: usize = 2;
pub const COL_RACE_CATEGORY: usize = 3;
pub const COL_AGE_CATEGORY: usize = 4;
pub const COL_OVERALL_RANK: usize = 5;
pub const COL_GENDER_RANK: usize = 6;
pub const COL_AGE_CATEGORY_RANK: usize = 7;
pub const COL_CHIP_TIME: usize = 8;
pub const COL_GUN_TIME: usize = 9;
pub const CHECKPOINT_START_COL: usize = 10;

/// Header line matching the column layout (three checkpoint columns)
pub const TEMPLATE_HEADER: [&str; 13] = [
    "Bib Number",
    "Participant Name",
    "Gender",
    "Race Category",
    "Age Category",
    "Overall Rank",
    "Gender Rank",
    "Age Category Rank",
    "Chip Time",
    "Gun Time",
    "Checkpoint 1",
    "Checkpoint 2",
    "Checkpoint 3",
];

/// Parse one data row
///
/// Missing chip or gun time is a row error; unparseable checkpoint cells
/// are dropped.
pub fn parse_row(row: &RawRow) -> Result<CandidateRecord, RowError> {
    let text = |col: usize| row.cell(col).as_text();

    let chip_time = parse_time(&text(COL_CHIP_TIME)).ok_or_else(|| RowError::Parse {
        row: row.row_number,
        message: "Chip time is required".to_string(),
    })?;
    let gun_time = parse_time(&text(COL_GUN_TIME)).ok_or_else(|| RowError::Parse {
        row: row.row_number,
        message: "Gun time is required".to_string(),
    })?;

    Ok(CandidateRecord {
        row_number: row.row_number,
        bib_number: text(COL_BIB_NUMBER),
        participant_name: text(COL_PARTICIPANT_NAME),
        gender: non_empty(text(COL_GENDER)),
        race_category: text(COL_RACE_CATEGORY),
        age_category: non_empty(text(COL_AGE_CATEGORY)),
        overall_rank: non_empty(text(COL_OVERALL_RANK)),
        gender_rank: non_empty(text(COL_GENDER_RANK)),
        age_category_rank: non_empty(text(COL_AGE_CATEGORY_RANK)),
        chip_time,
        gun_time,
        checkpoints: parse_checkpoints(row),
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Scan checkpoint columns up to the last populated cell
///
/// Numbering follows scan order over parseable cells, starting at 1.
fn parse_checkpoints(row: &RawRow) -> Vec<CheckpointEntry> {
    let end = row.populated_width();
    if end <= CHECKPOINT_START_COL {
        return Vec::new();
    }

    (CHECKPOINT_START_COL..end)
        .filter_map(|col| parse_time(&row.cell(col).as_text()))
        .enumerate()
        .map(|(i, time)| CheckpointEntry {
            checkpoint_number: i as u32 + 1,
            time,
        })
        .collect()
}

/// Parse `H:mm:ss` or `mm:ss` (read as `0:mm:ss`)
///
/// Anything else, including an empty string, is `None`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    let parts: Vec<&str> = value.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] if is_digits(h, 1, 2) && is_digits(m, 2, 2) && is_digits(s, 2, 2) => {
            (*h, *m, *s)
        }
        [m, s] if is_digits(m, 1, 2) && is_digits(s, 2, 2) => ("0", *m, *s),
        _ => return None,
    };

    let time = NaiveTime::from_hms_opt(
        hours.parse().ok()?,
        minutes.parse().ok()?,
        seconds.parse().ok()?,
    );
    if time.is_none() {
        tracing::warn!(value, "Could not parse time");
    }
    time
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn row(cells: &[&str]) -> RawRow {
        RawRow::new(2, cells.iter().map(|c| Cell::from(*c)).collect())
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("1:15:20"), Some(time(1, 15, 20)));
        assert_eq!(parse_time("01:15:20"), Some(time(1, 15, 20)));
        assert_eq!(parse_time("5:30"), Some(time(0, 5, 30)));
        assert_eq!(parse_time("45:07"), Some(time(0, 45, 7)));
        assert_eq!(parse_time(" 2:00:01 "), Some(time(2, 0, 1)));
    }

    #[test]
    fn test_parse_time_rejects() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time("1:5:20"), None);
        assert_eq!(parse_time("123:00:00"), None);
        assert_eq!(parse_time("1:60:00"), None);
        assert_eq!(parse_time("25:00:00"), None);
        assert_eq!(parse_time("1:15:20:00"), None);
        assert_eq!(parse_time("4530"), None);
    }

    #[test]
    fn test_parse_full_row() {
        let raw = row(&[
            "M001",
            "John Doe",
            "M",
            "Full Marathon (42K)",
            "18-35",
            "1",
            "1",
            "1",
            "3:15:20",
            "3:15:50",
            "0:52:00",
            "1:45:00",
            "2:38:00",
        ]);

        let record = parse_row(&raw).unwrap();
        assert_eq!(record.bib_number, "M001");
        assert_eq!(record.participant_name, "John Doe");
        assert_eq!(record.gender.as_deref(), Some("M"));
        assert_eq!(record.race_category, "Full Marathon (42K)");
        assert_eq!(record.age_category.as_deref(), Some("18-35"));
        assert_eq!(record.overall_rank.as_deref(), Some("1"));
        assert_eq!(record.chip_time, time(3, 15, 20));
        assert_eq!(record.gun_time, time(3, 15, 50));
        assert_eq!(
            record.checkpoints,
            vec![
                CheckpointEntry { checkpoint_number: 1, time: time(0, 52, 0) },
                CheckpointEntry { checkpoint_number: 2, time: time(1, 45, 0) },
                CheckpointEntry { checkpoint_number: 3, time: time(2, 38, 0) },
            ]
        );
    }

    #[test]
    fn test_unparseable_checkpoints_are_omitted() {
        let raw = row(&[
            "M001", "John Doe", "M", "10K", "", "", "", "", "0:45:00", "0:45:30", "", "abc",
            "0:20:00", "", "0:40:00",
        ]);

        let record = parse_row(&raw).unwrap();
        assert_eq!(record.checkpoints.len(), 2);
        assert_eq!(record.checkpoints[0].checkpoint_number, 1);
        assert_eq!(record.checkpoints[0].time, time(0, 20, 0));
        assert_eq!(record.checkpoints[1].checkpoint_number, 2);
        assert_eq!(record.checkpoints[1].time, time(0, 40, 0));
        assert_eq!(record.age_category, None);
    }

    #[test]
    fn test_missing_chip_time_is_row_error() {
        let mut raw = row(&["M001", "John Doe", "M", "10K", "", "", "", "", "", "0:45:30"]);
        raw.row_number = 7;

        let err = parse_row(&raw).unwrap_err();
        assert_eq!(err.row(), 7);
        assert_eq!(err.to_string(), "Error processing row 7: Chip time is required");
    }

    #[test]
    fn test_missing_gun_time_is_row_error() {
        let raw = row(&["M001", "John Doe", "M", "10K", "", "", "", "", "0:45:00"]);
        let err = parse_row(&raw).unwrap_err();
        assert!(matches!(err, RowError::Parse { row: 2, .. }));
        assert!(err.to_string().contains("Gun time is required"));
    }

    #[test]
    fn test_numeric_cells_render_as_integers() {
        let mut raw = row(&["", "Jane Smith", "F", "10K"]);
        raw.cells[0] = Cell::Number(1042.0);
        raw.cells.extend([
            Cell::Empty,
            Cell::Number(12.0),
            Cell::Empty,
            Cell::Empty,
            Cell::from("0:50:00"),
            Cell::from("0:51:00"),
        ]);

        let record = parse_row(&raw).unwrap();
        assert_eq!(record.bib_number, "1042");
        assert_eq!(record.overall_rank.as_deref(), Some("12"));
        assert!(record.checkpoints.is_empty());
    }
}

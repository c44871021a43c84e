//! Row and result records flowing through the pipeline
//!
//! RawRow → CandidateRecord → NewResult → (store) → PersistedResult

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Typed spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
    /// Error cells and anything else without a text rendering
    Other,
}

impl Cell {
    /// Render the cell as a string
    ///
    /// Text is trimmed, numbers are truncated to integers (no decimal or
    /// scientific notation), booleans become "true"/"false", everything else
    /// is empty.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format!("{}", n.trunc() as i64),
            Cell::Bool(b) => b.to_string(),
            Cell::Empty | Cell::Other => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_empty()
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

/// One spreadsheet row at fixed column offsets
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based spreadsheet row number (the header is row 1)
    pub row_number: usize,
    pub cells: Vec<Cell>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<Cell>) -> Self {
        Self { row_number, cells }
    }

    /// Cell at `index`, `Cell::Empty` past the end of the row
    pub fn cell(&self, index: usize) -> &Cell {
        const EMPTY: &Cell = &Cell::Empty;
        self.cells.get(index).unwrap_or(EMPTY)
    }

    /// Index one past the last non-empty cell
    pub fn populated_width(&self) -> usize {
        self.cells
            .iter()
            .rposition(|c| !c.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn is_blank(&self) -> bool {
        self.populated_width() == 0
    }
}

/// Checkpoint split parsed from a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Sequence number, 1-based in scan order
    pub checkpoint_number: u32,
    pub time: NaiveTime,
}

/// Structured candidate produced by the row parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub row_number: usize,
    pub bib_number: String,
    pub participant_name: String,
    pub gender: Option<String>,
    pub race_category: String,
    pub age_category: Option<String>,
    pub overall_rank: Option<String>,
    pub gender_rank: Option<String>,
    pub age_category_rank: Option<String>,
    pub chip_time: NaiveTime,
    pub gun_time: NaiveTime,
    pub checkpoints: Vec<CheckpointEntry>,
}

/// Checkpoint ready for insertion
///
/// The back-reference to the owning result is the `Vec` that holds it; the
/// store turns it into `result_id` when the parent row is inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckpoint {
    pub checkpoint_number: u32,
    pub time: NaiveTime,
}

/// Result ready for insertion (resolved event and category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResult {
    pub event_id: i64,
    pub category_id: i64,
    pub bib_number: String,
    pub participant_name: String,
    pub gender: Option<String>,
    pub age_category: Option<String>,
    pub overall_rank: Option<String>,
    pub gender_rank: Option<String>,
    pub age_category_rank: Option<String>,
    pub chip_time: NaiveTime,
    pub gun_time: NaiveTime,
    pub checkpoints: Vec<NewCheckpoint>,
}

/// Checkpoint as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCheckpoint {
    pub id: i64,
    pub result_id: i64,
    pub checkpoint_number: u32,
    pub time: NaiveTime,
}

/// Result as stored, with its category name and ordered checkpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResult {
    pub id: i64,
    pub event_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub bib_number: String,
    pub participant_name: String,
    pub gender: Option<String>,
    pub age_category: Option<String>,
    pub overall_rank: Option<String>,
    pub gender_rank: Option<String>,
    pub age_category_rank: Option<String>,
    pub chip_time: NaiveTime,
    pub gun_time: NaiveTime,
    pub checkpoints: Vec<PersistedCheckpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text_rendering() {
        assert_eq!(Cell::Text("  M001 ".to_string()).as_text(), "M001");
        assert_eq!(Cell::Number(42.0).as_text(), "42");
        assert_eq!(Cell::Number(42.9).as_text(), "42");
        assert_eq!(Cell::Number(1.0e7).as_text(), "10000000");
        assert_eq!(Cell::Bool(true).as_text(), "true");
        assert_eq!(Cell::Empty.as_text(), "");
        assert_eq!(Cell::Other.as_text(), "");
    }

    #[test]
    fn test_populated_width_ignores_trailing_blanks() {
        let row = RawRow::new(
            2,
            vec![
                Cell::from("a"),
                Cell::Empty,
                Cell::from("b"),
                Cell::Text("   ".to_string()),
                Cell::Empty,
            ],
        );
        assert_eq!(row.populated_width(), 3);
        assert!(!row.is_blank());
        assert_eq!(row.cell(10), &Cell::Empty);
    }

    #[test]
    fn test_blank_row() {
        let row = RawRow::new(5, vec![Cell::Empty, Cell::Other]);
        assert!(row.is_blank());
    }
}

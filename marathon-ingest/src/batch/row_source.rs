//! Spreadsheet row sources
//!
//! Sources yield data rows in order with the header row already skipped.
//! Workbooks (`.xlsx`, `.xls`) are read with calamine, `.csv` with the csv
//! crate. Both are parsed whole on open, which is blocking work and belongs
//! on the blocking thread pool.

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::VecDeque;
use std::path::Path;

use super::error::PipelineError;
use crate::models::{Cell, RawRow};

/// Sequential row iteration with a detectable end
pub trait RowSource: Send {
    /// Next data row, `Ok(None)` at end of input
    fn next_row(&mut self) -> Result<Option<RawRow>, PipelineError>;
}

/// Rows held in memory
#[derive(Debug, Default)]
pub struct MemoryRowSource {
    rows: VecDeque<RawRow>,
}

impl MemoryRowSource {
    /// Rows must already exclude the header
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowSource for MemoryRowSource {
    fn next_row(&mut self) -> Result<Option<RawRow>, PipelineError> {
        Ok(self.rows.pop_front())
    }
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xls" => Some(SheetFormat::Workbook),
            "csv" => Some(SheetFormat::Csv),
            _ => None,
        }
    }
}

/// Open a results file and parse every data row
pub fn open_row_source(path: &Path) -> Result<MemoryRowSource, PipelineError> {
    let format = SheetFormat::from_path(path).ok_or_else(|| PipelineError::SourceOpen {
        path: path.display().to_string(),
        message: "unsupported file extension".to_string(),
    })?;

    let rows = match format {
        SheetFormat::Workbook => read_workbook_rows(path)?,
        SheetFormat::Csv => read_csv_rows(path)?,
    };

    tracing::info!(
        path = %path.display(),
        rows = rows.len(),
        "Opened results file (header row skipped)"
    );

    Ok(MemoryRowSource::new(rows))
}

fn open_error(path: &Path, message: impl ToString) -> PipelineError {
    PipelineError::SourceOpen {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// First worksheet of a workbook, header skipped, blank rows dropped
fn read_workbook_rows(path: &Path) -> Result<Vec<RawRow>, PipelineError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| open_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| open_error(path, "workbook has no worksheets"))?
        .map_err(|e| open_error(path, e))?;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    // The first row of the used range is the header
    for (offset, cells) in range.rows().enumerate().skip(1) {
        let mut row_cells = vec![Cell::Empty; start_col as usize];
        row_cells.extend(cells.iter().map(workbook_cell));
        truncate_trailing_empty(&mut row_cells);

        let row = RawRow::new(start_row as usize + offset + 1, row_cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Map a workbook cell onto the cell model
///
/// Date/time cells are numeric underneath and are treated as numbers.
fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Empty => Cell::Empty,
        Data::Error(_) => Cell::Other,
    }
}

/// CSV file with a header line; every field is text
///
/// Fields are decoded lossily, so invalid UTF-8 in one cell reaches the row
/// parser as replacement characters instead of failing the file.
fn read_csv_rows(path: &Path) -> Result<Vec<RawRow>, PipelineError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| open_error(path, e))?;

    let mut rows = Vec::new();
    for (index, record) in reader.into_byte_records().enumerate() {
        let record = record.map_err(|e| PipelineError::SourceRead(e.to_string()))?;
        let row_number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        let mut cells: Vec<Cell> = record
            .iter()
            .map(|field| Cell::from(String::from_utf8_lossy(field).as_ref()))
            .collect();
        truncate_trailing_empty(&mut cells);

        let row = RawRow::new(row_number, cells);
        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn truncate_trailing_empty(cells: &mut Vec<Cell>) {
    while cells.last().is_some_and(Cell::is_empty) {
        cells.pop();
    }
}

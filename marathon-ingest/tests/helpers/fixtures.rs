//! Row and file fixtures

use marathon_ingest::batch::{JobRunner, MemoryRowSource};
use marathon_ingest::models::{Cell, RawRow, RunStatistics};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// A complete valid row: two checkpoints
pub fn result_cells(bib: &str, name: &str, category: &str) -> Vec<String> {
    [
        bib, name, "M", category, "18-35", "1", "1", "1", "1:15:20", "1:15:50", "0:25:30",
        "0:52:15",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// In-memory source; rows are numbered from 2 (row 1 is the header)
pub fn memory_source(rows: &[Vec<String>]) -> MemoryRowSource {
    let raw = rows
        .iter()
        .enumerate()
        .map(|(i, cells)| {
            RawRow::new(
                i + 2,
                cells.iter().map(|c| Cell::from(c.as_str())).collect(),
            )
        })
        .collect();
    MemoryRowSource::new(raw)
}

/// Write a CSV results file with the template header
pub fn write_csv(dir: &Path, rows: &[Vec<String>]) -> PathBuf {
    let path = dir.join("results.csv");
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&path)
        .expect("Failed to create CSV");

    writer
        .write_record(marathon_ingest::batch::row_parser::TEMPLATE_HEADER)
        .unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Poll until the run reaches Completed or Failed
pub async fn wait_for_terminal(runner: &JobRunner, run_id: Uuid) -> RunStatistics {
    for _ in 0..1000 {
        if let Some(stats) = runner.status(run_id).await {
            if stats.is_terminal() {
                return stats;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Run {} did not reach a terminal state", run_id);
}

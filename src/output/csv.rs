//! CSV output for IoC exports

use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use super::{ensure_parent_dir, OutputError, OutputResult};
use crate::enterprise::CsvTable;

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Write an IoC table, header first; returns the number of records written
pub fn write_ioc_rows<P: AsRef<Path>>(path: P, table: &CsvTable) -> OutputResult<usize> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let file = File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
    let mut writer = Writer::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));

    if !table.headers.is_empty() {
        writer
            .write_record(&table.headers)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;
    }
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))?;

    info!(path = %path.display(), rows = table.len(), "Wrote IoC CSV");
    Ok(table.len())
}

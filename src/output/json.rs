//! JSON output for bundles and entries

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::{ensure_parent_dir, OutputError, OutputResult};

/// Pretty-print `value` to `path`, replacing any existing file
pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> OutputResult<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let file = File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| OutputError::IoError(format!("Failed to flush: {e}")))?;

    info!(path = %path.display(), "Wrote JSON");
    Ok(())
}

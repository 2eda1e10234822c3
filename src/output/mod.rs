//! File writers for exported data

pub mod csv;
pub mod json;

pub use self::csv::write_ioc_rows;
pub use self::json::write_json;

use std::path::Path;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Create the parent directory of `path` if missing
pub(crate) fn ensure_parent_dir(path: &Path) -> OutputResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}"))),
        _ => Ok(()),
    }
}

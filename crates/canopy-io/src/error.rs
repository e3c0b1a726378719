//! Error types for canopy-io.

use std::path::PathBuf;

/// Errors from loading, encoding and writing tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("cannot open {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the delimited file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the file has no header row (it is empty).
    #[error("missing header row in {path}")]
    MissingHeader {
        /// Path to the delimited file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of cells than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} cells, expected {expected}")]
    InconsistentRowLength {
        /// Path to the delimited file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of cells (from header).
        expected: usize,
        /// Actual number of cells in this row.
        got: usize,
    },

    /// Returned when a target or excluded column name is not in the header.
    #[error("unknown column \"{name}\"")]
    UnknownColumn {
        /// The name that was looked up.
        name: String,
    },

    /// Returned when no predictor columns remain after removing the target
    /// and excluded columns.
    #[error("no feature columns left after removing the target and excluded columns")]
    NoFeatureColumns,

    /// Returned when an output file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

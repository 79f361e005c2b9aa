//! I/O error types for ccml-io.

use std::path::PathBuf;

/// Errors from reading training data and writing reports.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when required columns are absent from the header.
    #[error("missing required column(s) in {path}: {}", missing.join(", "))]
    MissingColumns {
        /// Path to the CSV file.
        path: PathBuf,
        /// Exact names of every absent column.
        missing: Vec<String>,
    },

    /// Returned when a required column name appears more than once in the header.
    #[error("column \"{column}\" appears more than once in {path}")]
    DuplicateColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The repeated column name.
        column: String,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of fields than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} fields, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of fields (from header).
        expected: usize,
        /// Actual number of fields in this row.
        got: usize,
    },

    /// Returned when a KPI cell is unparseable, NaN, or infinite.
    #[error("invalid number in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    InvalidNumber {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: &'static str,
        /// The raw cell text.
        raw: String,
    },

    /// Returned when a categorical cell is outside its closed vocabulary.
    #[error("unknown value in {path}: row {row_index}: {source}")]
    UnknownCategory {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Which vocabulary rejected the value.
        source: crate::ParseCategoryError,
    },

    /// Returned when the label cell is blank.
    #[error("empty \"{column}\" value in {path}: row {row_index}")]
    EmptyLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Label column name.
        column: &'static str,
    },

    /// Returned when a model key contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid model key \"{key}\": must match [a-zA-Z0-9_-]+")]
    InvalidModelKey {
        /// The invalid key.
        key: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a report cannot be encoded as JSON.
    #[error("cannot encode report for {path}")]
    EncodeReport {
        /// Destination path.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

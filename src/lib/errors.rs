//! Custom error types for nanoget operations.
//!
//! Every fatal condition of an extraction call is one variant of [`NanogetError`]. Public
//! operations return `anyhow::Result`, so callers tell the kinds apart with
//! `err.downcast_ref::<NanogetError>()`. Per-record failures (empty reads, zero-length
//! alignments) are never errors; see [`crate::extract::RecordOutcome`].

use thiserror::Error;

/// Result type alias for nanoget operations
pub type Result<T> = std::result::Result<T, NanogetError>;

/// Error type for nanoget operations
#[derive(Error, Debug)]
pub enum NanogetError {
    /// Invalid combination of options, detected before any input is touched
    #[error("Invalid configuration: {reason}")]
    ConfigurationError {
        /// Explanation of the problem
        reason: String,
    },

    /// An input file does not exist
    #[error("{description} '{path}' does not exist")]
    InputNotFound {
        /// Human-readable description of the input (e.g. "Input BAM")
        description: String,
        /// Path to the missing file
        path: String,
    },

    /// The requested source format has no extractor
    #[error("Unsupported data source: {format}")]
    UnsupportedFormat {
        /// The format tag that was requested
        format: String,
    },

    /// A rich FASTQ record lacks one of the required `key=value` annotations
    #[error("Missing metadata field '{field}' in record '{read_id}' of '{path}'")]
    MissingMetadataField {
        /// The missing key
        field: String,
        /// The read that lacks it
        read_id: String,
        /// Path to the input file
        path: String,
    },

    /// A summary table lacks required columns
    #[error("Expected columns not found in summary file '{path}': {}", missing.join(", "))]
    MissingColumns {
        /// Columns absent from the header
        missing: Vec<String>,
        /// Path to the summary file
        path: String,
    },

    /// An alignment file is not coordinate sorted
    #[error("Alignment file '{path}' is not coordinate sorted (found SO:{sort_order})")]
    UnsortedInput {
        /// Path to the alignment file
        path: String,
        /// The sort order found in the header, or "none"
        sort_order: String,
    },

    /// An alignment file has no mapped reads
    #[error("Alignment file '{path}' does not contain any mapped reads")]
    NoMappedReads {
        /// Path to the alignment file
        path: String,
    },

    /// The merged table is empty
    #[error("No reads found in input")]
    NoReadsFound,

    /// A field could not be parsed
    #[error("Malformed record in '{path}': {reason}")]
    MalformedRecord {
        /// Path to the input file
        path: String,
        /// Explanation of the problem
        reason: String,
    },
}

impl NanogetError {
    /// Creates a [`NanogetError::ConfigurationError`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::ConfigurationError { reason: reason.into() }
    }

    /// Creates a [`NanogetError::MalformedRecord`].
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord { path: path.into(), reason: reason.into() }
    }
}

//! Input validation utilities
//!
//! Checks that run before any input is read: file existence, thread budgets and
//! dataset-name lists. All failures are structured [`NanogetError`]s.

use crate::errors::{NanogetError, Result};
use std::path::Path;

/// Check if a path refers to stdin.
///
/// Returns true if the path is "-" or "/dev/stdin".
///
/// # Example
/// ```
/// use nanoget_lib::validation::is_stdin_path;
/// use std::path::Path;
///
/// assert!(is_stdin_path(Path::new("-")));
/// assert!(is_stdin_path(Path::new("/dev/stdin")));
/// assert!(!is_stdin_path(Path::new("reads.fastq.gz")));
/// ```
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin"
}

/// Validate that a file exists
///
/// Standard input paths always pass.
///
/// # Errors
/// Returns [`NanogetError::InputNotFound`] if the file does not exist
///
/// # Example
/// ```
/// use nanoget_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/reads.fastq", "Input FASTQ");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !is_stdin_path(path_ref) && !path_ref.exists() {
        return Err(NanogetError::InputNotFound {
            description: description.to_string(),
            path: path_ref.display().to_string(),
        });
    }
    Ok(())
}

/// Validate that every file in a list exists
///
/// # Errors
/// Returns an error for the first file that doesn't exist
pub fn validate_files_exist<P: AsRef<Path>>(files: &[P], description: &str) -> Result<()> {
    for path in files {
        validate_file_exists(path, description)?;
    }
    Ok(())
}

/// Validate that at least one input was given
///
/// # Errors
/// Returns [`NanogetError::ConfigurationError`] for an empty list
pub fn validate_non_empty<P>(files: &[P]) -> Result<()> {
    if files.is_empty() {
        return Err(NanogetError::configuration("at least one input file is required"));
    }
    Ok(())
}

/// Validate a thread budget
///
/// # Errors
/// Returns [`NanogetError::ConfigurationError`] when `threads` is zero
pub fn validate_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(NanogetError::configuration("thread budget must be at least 1"));
    }
    Ok(())
}

/// Validate that a dataset-name list matches the number of input files
///
/// # Errors
/// Returns [`NanogetError::ConfigurationError`] when the counts differ
pub fn validate_dataset_names(names: &[String], file_count: usize) -> Result<()> {
    if names.len() != file_count {
        return Err(NanogetError::configuration(format!(
            "{} dataset names were given for {} input files",
            names.len(),
            file_count
        )));
    }
    Ok(())
}

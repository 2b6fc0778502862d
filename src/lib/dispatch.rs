//! The batch extraction entry point.
//!
//! [`extract`] validates a request, picks the extractor for the source format, runs it over
//! every input file and hands the partial tables to the aggregator. Everything that can be
//! checked without reading input is checked first, so configuration mistakes never cost
//! any I/O.
//!
//! Two execution paths exist:
//!
//! - **pool**: one partition per file on a pool of `min(files, threads)` workers, each
//!   extractor call getting the remaining thread budget (at least 1) for its own use.
//! - **huge**: a single file extracted on the calling thread with the whole budget. This
//!   avoids moving a very large table between threads.

use anyhow::Result;
use log::{error, info};
use std::path::Path;

use crate::aggregate::{CombineMode, aggregate};
use crate::errors::NanogetError;
use crate::extract::{ExtractContext, ReadType, SourceFormat};
use crate::partition::{file_partitions, run_partitions};
use crate::table::MetricsTable;
use crate::validation::{
    is_stdin_path, validate_dataset_names, validate_files_exist, validate_non_empty,
    validate_threads,
};

/// Options of one extraction call.
///
/// # Example
/// ```
/// use nanoget_lib::aggregate::CombineMode;
/// use nanoget_lib::dispatch::ExtractOptions;
///
/// let options = ExtractOptions::default()
///     .with_combine(CombineMode::Track)
///     .with_names(vec!["run1".to_string(), "run2".to_string()]);
/// assert_eq!(options.combine, CombineMode::Track);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Summary-table column set
    pub read_type: ReadType,
    /// How tables of several files are combined
    pub combine: CombineMode,
    /// Dataset names under [`CombineMode::Track`], one per file; defaults to the file paths
    pub names: Option<Vec<String>>,
    /// Extract barcode assignments
    pub barcoded: bool,
    /// Include supplementary alignments
    pub keep_supplementary: bool,
    /// Extract a single very large file on the calling thread
    pub huge: bool,
}

impl ExtractOptions {
    /// Sets the summary-table column set.
    #[must_use]
    pub fn with_read_type(mut self, read_type: ReadType) -> Self {
        self.read_type = read_type;
        self
    }

    /// Sets how tables of several files are combined.
    #[must_use]
    pub fn with_combine(mut self, combine: CombineMode) -> Self {
        self.combine = combine;
        self
    }

    /// Names the datasets, one per input file, for [`CombineMode::Track`].
    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    /// Requests barcode assignments from rich FASTQ and summary inputs.
    #[must_use]
    pub fn with_barcoded(mut self, barcoded: bool) -> Self {
        self.barcoded = barcoded;
        self
    }

    /// Keeps supplementary alignments of BAM inputs.
    #[must_use]
    pub fn with_keep_supplementary(mut self, keep_supplementary: bool) -> Self {
        self.keep_supplementary = keep_supplementary;
        self
    }

    /// Extracts the single input on the calling thread, bypassing the worker pool.
    #[must_use]
    pub fn with_huge(mut self, huge: bool) -> Self {
        self.huge = huge;
        self
    }
}

/// How a thread budget is split between file workers and extractor calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBudget {
    /// Files extracted concurrently
    pub file_workers: usize,
    /// Threads each extractor call may use internally
    pub per_extractor: usize,
}

impl ThreadBudget {
    /// Splits `threads` over `files` inputs.
    ///
    /// # Examples
    /// ```
    /// use nanoget_lib::dispatch::ThreadBudget;
    ///
    /// assert_eq!(ThreadBudget::new(2, 8), ThreadBudget { file_workers: 2, per_extractor: 6 });
    /// assert_eq!(ThreadBudget::new(10, 4), ThreadBudget { file_workers: 4, per_extractor: 1 });
    /// ```
    #[must_use]
    pub fn new(files: usize, threads: usize) -> Self {
        let file_workers = files.min(threads).max(1);
        Self { file_workers, per_extractor: threads.saturating_sub(file_workers).max(1) }
    }

    /// The whole budget for a single extractor call.
    #[must_use]
    pub fn huge(threads: usize) -> Self {
        Self { file_workers: 1, per_extractor: threads.max(1) }
    }
}

/// Dataset names for tracking mode: the supplied names or the file paths.
fn dataset_names<P: AsRef<Path>>(files: &[P], options: &ExtractOptions) -> Result<Vec<String>> {
    match &options.names {
        Some(names) => {
            validate_dataset_names(names, files.len())?;
            Ok(names.clone())
        }
        None => Ok(files.iter().map(|f| f.as_ref().display().to_string()).collect()),
    }
}

fn validate_request<P: AsRef<Path>>(
    format: SourceFormat,
    files: &[P],
    threads: usize,
    options: &ExtractOptions,
) -> Result<Vec<String>> {
    validate_non_empty(files)?;
    validate_threads(threads)?;
    if options.huge && files.len() != 1 {
        return Err(NanogetError::configuration(format!(
            "huge mode requires exactly one input file, got {}",
            files.len()
        ))
        .into());
    }
    if !format.supports_stdin() && files.iter().any(|f| is_stdin_path(f.as_ref())) {
        return Err(NanogetError::configuration(format!(
            "{format} input cannot be read from standard input"
        ))
        .into());
    }
    let names = match options.combine {
        CombineMode::Track => dataset_names(files, options)?,
        CombineMode::Simple => Vec::new(),
    };
    validate_files_exist(files, &format!("Input {format}"))?;
    Ok(names)
}

/// Extracts a metrics table from `files` of one source format.
///
/// # Errors
/// Returns a [`NanogetError`] for invalid requests, missing inputs and every fatal
/// condition an extractor or the aggregator reports. No partial table is ever returned.
///
/// # Example
/// ```no_run
/// use nanoget_lib::dispatch::{ExtractOptions, extract};
/// use nanoget_lib::extract::SourceFormat;
///
/// let table = extract(SourceFormat::Fastq, &["reads.fastq.gz"], 4, &ExtractOptions::default())?;
/// println!("{} reads", table.len());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn extract<P: AsRef<Path>>(
    format: SourceFormat,
    files: &[P],
    threads: usize,
    options: &ExtractOptions,
) -> Result<MetricsTable> {
    let result = run_extraction(format, files, threads, options);
    if let Err(e) = &result {
        error!("Extraction of {format} input failed: {e:#}");
    }
    result
}

fn run_extraction<P: AsRef<Path>>(
    format: SourceFormat,
    files: &[P],
    threads: usize,
    options: &ExtractOptions,
) -> Result<MetricsTable> {
    let names = validate_request(format, files, threads, options)?;
    let partitions = file_partitions(files)?;
    let extractor = format.extractor();

    let budget = if options.huge {
        ThreadBudget::huge(threads)
    } else {
        ThreadBudget::new(files.len(), threads)
    };
    let ctx = ExtractContext {
        threads: budget.per_extractor,
        read_type: options.read_type,
        barcoded: options.barcoded,
        keep_supplementary: options.keep_supplementary,
    };

    let tables = if options.huge {
        info!("Extracting {format} metrics from {} on the calling thread", partitions[0]);
        partitions
            .into_iter()
            .map(|partition| Ok((partition.index, extractor(&partition.path, &ctx)?)))
            .collect::<Result<Vec<_>>>()?
    } else {
        info!(
            "Extracting {format} metrics from {} file(s) with {} worker(s), {} thread(s) each",
            partitions.len(),
            budget.file_workers,
            budget.per_extractor
        );
        run_partitions(partitions, budget.file_workers, |partition| extractor(&partition.path, &ctx))?
    };

    aggregate(tables, options.combine, &names)
}

/// Parses a format tag and extracts a metrics table.
///
/// # Errors
/// Returns [`NanogetError::UnsupportedFormat`] for unknown tags, before any file is
/// touched, and otherwise whatever [`extract`] returns.
pub fn extract_tagged<P: AsRef<Path>>(
    format: &str,
    files: &[P],
    threads: usize,
    options: &ExtractOptions,
) -> Result<MetricsTable> {
    let format: SourceFormat = format.parse()?;
    extract(format, files, threads, options)
}

//! Work units for parallel extraction.
//!
//! Sequence formats are split into one [`FilePartition`] per input file; coordinate-sorted
//! alignment files into one [`ContigPartition`] per reference sequence with mapped reads.
//! Partitions are disjoint: no record can be read by two of them.
//!
//! [`run_partitions`] maps a function over a list of partitions on a rayon pool and hands
//! the outputs back over a channel, in completion order.

use anyhow::{Context, Result};
use bstr::BString;
use crossbeam_channel::unbounded;
use log::debug;
use noodles::bam::bai;
use noodles::sam;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::NanogetError;
use crate::validation::is_stdin_path;

/// One whole input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePartition {
    /// Position of the file in the caller's list
    pub index: usize,
    /// Path to the file, as given by the caller
    pub path: PathBuf,
}

impl fmt::Display for FilePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// One reference sequence of an indexed alignment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigPartition {
    /// Path to the alignment file
    pub path: PathBuf,
    /// Reference sequence name, used as the query region
    pub name: BString,
}

impl fmt::Display for ContigPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.name)
    }
}

/// The file a path refers to, with `.`/`..` components and symlinks resolved.
///
/// Standard input and paths that cannot be resolved are returned unchanged.
fn file_identity(path: &Path) -> PathBuf {
    if is_stdin_path(path) {
        return path.to_path_buf();
    }
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Builds one partition per input file.
///
/// # Errors
/// Returns [`NanogetError::ConfigurationError`] if two entries refer to the same file,
/// whether spelled identically, through different relative paths or through a symlink.
pub fn file_partitions<P: AsRef<Path>>(files: &[P]) -> Result<Vec<FilePartition>> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::with_capacity(files.len());
    let mut partitions = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let path = file.as_ref();
        if let Some(first) = seen.insert(file_identity(path), path) {
            return Err(NanogetError::configuration(format!(
                "inputs '{}' and '{}' refer to the same file",
                first.display(),
                path.display()
            ))
            .into());
        }
        partitions.push(FilePartition { index, path: path.to_path_buf() });
    }
    Ok(partitions)
}

/// Number of mapped records of one reference sequence, per the index metadata.
///
/// References without metadata have no records in the index.
fn mapped_records(index: &bai::Index, reference_sequence_id: usize) -> u64 {
    index
        .reference_sequences()
        .get(reference_sequence_id)
        .and_then(|reference_sequence| reference_sequence.metadata())
        .map_or(0, |metadata| metadata.mapped_record_count())
}

/// Total number of mapped records across all reference sequences.
#[must_use]
pub fn total_mapped_records(index: &bai::Index) -> u64 {
    (0..index.reference_sequences().len()).map(|id| mapped_records(index, id)).sum()
}

/// Builds one partition per reference sequence with at least one mapped record.
#[must_use]
pub fn contig_partitions(
    path: &Path,
    header: &sam::Header,
    index: &bai::Index,
) -> Vec<ContigPartition> {
    header
        .reference_sequences()
        .keys()
        .enumerate()
        .filter(|(id, name)| {
            let mapped = mapped_records(index, *id);
            if mapped == 0 {
                debug!("Skipping reference sequence {name} of {}: no mapped reads", path.display());
            }
            mapped > 0
        })
        .map(|(_, name)| ContigPartition { path: path.to_path_buf(), name: name.clone() })
        .collect()
}

/// The output of one partition, or the error that ended it.
#[derive(Debug)]
pub struct PartitionResult<R> {
    /// Label of the partition for error messages
    pub label: String,
    /// Position of the partition in the submitted list
    pub index: usize,
    /// What the worker produced
    pub output: Result<R>,
}

/// Runs `extract` over every partition on a pool of `threads` workers.
///
/// Outputs are returned in completion order together with their submission index. The
/// first failed partition fails the whole call.
///
/// # Errors
/// Returns an error if the pool cannot be built or any partition fails.
pub fn run_partitions<T, R, F>(
    partitions: Vec<T>,
    threads: usize,
    extract: F,
) -> Result<Vec<(usize, R)>>
where
    T: fmt::Display + Send,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("nanoget-worker-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let (tx, rx) = unbounded::<PartitionResult<R>>();
    let extract = &extract;
    pool.scope(|scope| {
        for (index, partition) in partitions.into_iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = PartitionResult {
                    label: partition.to_string(),
                    index,
                    output: extract(&partition),
                };
                // The receiver outlives the scope.
                let _ = tx.send(result);
            });
        }
    });
    drop(tx);

    let mut outputs = Vec::new();
    for result in rx {
        let label = result.label;
        let output =
            result.output.with_context(|| format!("Failed to extract metrics from {label}"))?;
        debug!("Partition {label} finished");
        outputs.push((result.index, output));
    }
    Ok(outputs)
}

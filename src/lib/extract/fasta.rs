//! Read lengths from FASTA files.
//!
//! FASTA carries no quality scores, so a table from this extractor holds only read names and
//! lengths. Sequences wrapped over several lines are measured across all of their lines.

use anyhow::{Context, Result};
use seq_io::fasta::{Reader as FastaReader, Record, RefRecord};
use std::path::Path;

use super::fastq::record_id;
use super::{ExtractContext, RecordOutcome, SkipCounts, SkipReason, SourceFormat};
use crate::input::open_reader;
use crate::logging::OperationTimer;
use crate::progress::ProgressTracker;
use crate::table::{MetricRecord, MetricsTable};

/// Metrics of one FASTA record. Empty sequences are skipped.
pub fn fasta_metrics(record: &RefRecord<'_>) -> RecordOutcome {
    let length: usize = record.seq_lines().map(<[u8]>::len).sum();
    if length == 0 {
        return RecordOutcome::Skipped(SkipReason::EmptyRead);
    }
    RecordOutcome::Metrics(MetricRecord {
        read_id: Some(String::from_utf8_lossy(record_id(record.head())).into_owned()),
        ..MetricRecord::length_only(length as u64)
    })
}

/// Extracts read name and length from a FASTA file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid FASTA.
pub fn extract_fasta(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    let format = SourceFormat::Fasta;
    let timer = OperationTimer::new(&format!("Collecting metrics from {format} {}", path.display()));
    let progress = ProgressTracker::new(format!("Processed records of {}", path.display()));
    let mut reader = FastaReader::new(open_reader(path, ctx.threads)?);
    let mut table = MetricsTable::new(&format.columns(ctx));
    let mut skipped = SkipCounts::default();

    while let Some(result) = reader.next() {
        let record =
            result.with_context(|| format!("Failed to parse FASTA record in {}", path.display()))?;
        skipped.apply(fasta_metrics(&record), &mut table);
        progress.record(1);
    }

    progress.finish();
    skipped.log(path);
    timer.log_completion(table.len() as u64);
    Ok(table)
}

//! Metrics from BAM files.
//!
//! [`extract_alignments`] reads a coordinate-sorted BAM one reference sequence at a time,
//! each on its own worker with its own reader. Before any record is read the file must pass
//! the preflight checks in [`preflight`]: a coordinate sort order, an index (built beside
//! the file if missing) and at least one mapped read.
//!
//! [`extract_unaligned`] reads an unaligned BAM front to back.

use anyhow::{Context, Result};
use log::{debug, error, info};
use noodles::bam::{self, bai};
use noodles::core::Region;
use noodles::sam;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::{Tag, Value};
use std::io;
use std::path::Path;

use super::{ExtractContext, RecordOutcome, SkipCounts, SkipReason, SourceFormat};
use crate::bam_io::{COORDINATE_SORT_ORDER, create_bam_reader, load_or_build_index, sort_order};
use crate::errors::NanogetError;
use crate::identity::percent_identity;
use crate::logging::{OperationTimer, format_count};
use crate::partition::{ContigPartition, contig_partitions, run_partitions, total_mapped_records};
use crate::phred::mean_quality;
use crate::progress::ProgressTracker;
use crate::table::{MetricRecord, MetricsTable};
use crate::validation::validate_file_exists;

/// Quality byte BAM uses when a record has no quality scores.
const MISSING_QUALITY: u8 = 0xFF;

/// A BAM that passed the preflight checks.
#[derive(Debug)]
pub struct CheckedBam {
    /// The file's header
    pub header: sam::Header,
    /// The companion index, read or freshly built
    pub index: bai::Index,
}

/// Checks that a BAM can be split into per-contig partitions.
///
/// The checks run in order: the file exists, its header declares `SO:coordinate`, an index
/// exists or can be built, and the index reports at least one mapped read.
///
/// # Errors
/// Returns [`NanogetError::InputNotFound`], [`NanogetError::UnsortedInput`] or
/// [`NanogetError::NoMappedReads`] for failed checks, and I/O errors for unreadable files.
pub fn preflight(path: &Path) -> Result<CheckedBam> {
    validate_file_exists(path, "Input BAM")?;
    let (_, header) = create_bam_reader(path, 1)?;

    let found = sort_order(&header);
    if found.as_deref() != Some(COORDINATE_SORT_ORDER) {
        let sort_order = found.unwrap_or_else(|| "none".to_string());
        error!("{} is not coordinate sorted (SO:{sort_order})", path.display());
        return Err(NanogetError::UnsortedInput { path: path.display().to_string(), sort_order }.into());
    }

    let (index_path, index) = load_or_build_index(path)?;
    debug!("Index of {} is {}", path.display(), index_path.display());
    let mapped = total_mapped_records(&index);
    if mapped == 0 {
        error!("{} does not contain any mapped reads", path.display());
        return Err(NanogetError::NoMappedReads { path: path.display().to_string() }.into());
    }
    info!("{} contains {} mapped reads", path.display(), format_count(mapped));

    Ok(CheckedBam { header, index })
}

/// Lengths of the leading and trailing soft clips.
fn soft_clips(ops: &[Op]) -> (usize, usize) {
    let clip = |op: &Op| if op.kind() == Kind::SoftClip { op.len() } else { 0 };
    // Hard clips may sit outside the soft clips.
    let aligned = |op: &&Op| op.kind() != Kind::HardClip;
    let leading = ops.iter().find(aligned).map_or(0, clip);
    let trailing = if ops.iter().filter(aligned).count() > 1 {
        ops.iter().rev().find(aligned).map_or(0, clip)
    } else {
        0
    };
    (leading, trailing)
}

fn edit_distance(data: &bam::record::Data<'_>) -> Result<Option<u64>> {
    let value = data.get(&Tag::EDIT_DISTANCE).transpose().context("Invalid NM tag")?;
    Ok(value.and_then(|v| v.as_int()).and_then(|nm| u64::try_from(nm).ok()))
}

fn mismatched_positions(data: &bam::record::Data<'_>) -> Result<Option<Vec<u8>>> {
    match data.get(&Tag::MISMATCHED_POSITIONS).transpose().context("Invalid MD tag")? {
        Some(Value::String(md)) => Ok(Some(md.to_vec())),
        _ => Ok(None),
    }
}

fn read_name(record: &bam::Record) -> Option<String> {
    record.name().map(|name| name.to_string())
}

/// Quality scores of a record, or `None` when it has none.
fn quality_scores(record: &bam::Record) -> Option<Vec<u8>> {
    let scores = record.quality_scores();
    let scores: &[u8] = scores.as_ref();
    if scores.is_empty() || scores.iter().all(|&q| q == MISSING_QUALITY) {
        None
    } else {
        Some(scores.to_vec())
    }
}

/// Metrics of one aligned record.
///
/// Unmapped and secondary records are always skipped; supplementary records unless
/// `keep_supplementary` is set. A record that spans no reference bases keeps its row but
/// has no percent identity.
///
/// # Errors
/// Returns an error if the CIGAR or the `NM`/`MD` tags cannot be decoded.
pub fn alignment_metrics(record: &bam::Record, keep_supplementary: bool) -> Result<RecordOutcome> {
    let flags = record.flags();
    if flags.is_unmapped() {
        return Ok(RecordOutcome::Skipped(SkipReason::Unmapped));
    }
    if flags.is_secondary() {
        return Ok(RecordOutcome::Skipped(SkipReason::Secondary));
    }
    if flags.is_supplementary() && !keep_supplementary {
        return Ok(RecordOutcome::Skipped(SkipReason::Supplementary));
    }

    let length = record.sequence().len();
    if length == 0 {
        return Ok(RecordOutcome::Skipped(SkipReason::EmptyRead));
    }
    let Some(quals) = quality_scores(record) else {
        return Ok(RecordOutcome::Skipped(SkipReason::MissingQualities));
    };
    let Some(quality) = mean_quality(&quals) else {
        return Ok(RecordOutcome::Skipped(SkipReason::MissingQualities));
    };

    let ops: Vec<Op> = record.cigar().iter().collect::<io::Result<_>>().context("Invalid CIGAR")?;
    let (leading, trailing) = soft_clips(&ops);
    let aligned_quals = quals.get(leading..quals.len().saturating_sub(trailing)).unwrap_or_default();

    let data = record.data();
    let nm = edit_distance(&data)?;
    let md = mismatched_positions(&data)?;
    let identity = percent_identity(&ops, nm, md.as_deref());

    Ok(RecordOutcome::Metrics(MetricRecord {
        read_id: read_name(record),
        aligned_length: Some(aligned_quals.len() as u64),
        aligned_quality: mean_quality(aligned_quals),
        mapping_quality: record.mapping_quality().map(|mq| mq.get()),
        percent_identity: identity.value(),
        ..MetricRecord::new(length as u64, quality)
    }))
}

/// Metrics of one unaligned record.
#[must_use]
pub fn unaligned_metrics(record: &bam::Record) -> RecordOutcome {
    let length = record.sequence().len();
    if length == 0 {
        return RecordOutcome::Skipped(SkipReason::EmptyRead);
    }
    match quality_scores(record).as_deref().and_then(mean_quality) {
        Some(quality) => RecordOutcome::Metrics(MetricRecord {
            read_id: read_name(record),
            ..MetricRecord::new(length as u64, quality)
        }),
        None => RecordOutcome::Skipped(SkipReason::MissingQualities),
    }
}

fn extract_contig(
    partition: &ContigPartition,
    header: &sam::Header,
    index: &bai::Index,
    ctx: &ExtractContext,
    progress: &ProgressTracker,
) -> Result<(MetricsTable, SkipCounts)> {
    let mut reader = bam::io::indexed_reader::Builder::default()
        .set_index(index.clone())
        .build_from_path(&partition.path)
        .with_context(|| format!("Failed to open input BAM: {}", partition.path.display()))?;

    let region = Region::new(partition.name.clone(), ..);
    let query = reader
        .query(header, &region)
        .with_context(|| format!("Failed to query {partition}"))?;

    let mut table = MetricsTable::new(&SourceFormat::Bam.columns(ctx));
    let mut skipped = SkipCounts::default();
    for result in query.records() {
        let record = result.with_context(|| format!("Failed to read record from {partition}"))?;
        skipped.apply(alignment_metrics(&record, ctx.keep_supplementary)?, &mut table);
        progress.record(1);
    }
    Ok((table, skipped))
}

/// Extracts per-alignment metrics from a coordinate-sorted BAM.
///
/// Reference sequences are processed in parallel on `ctx.threads` workers, each with its
/// own reader over the index loaded during preflight.
///
/// # Errors
/// Returns an error if a preflight check fails or any record cannot be read.
pub fn extract_alignments(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    let timer = OperationTimer::new(&format!("Collecting metrics from BAM {}", path.display()));
    let CheckedBam { header, index } = preflight(path)?;
    let partitions = contig_partitions(path, &header, &index);
    info!("Processing {} reference sequences of {}", partitions.len(), path.display());

    let progress = ProgressTracker::new(format!("Processed records of {}", path.display()));
    let outputs = run_partitions(partitions, ctx.threads, |partition| {
        extract_contig(partition, &header, &index, ctx, &progress)
    })?;
    progress.finish();

    let mut skipped = SkipCounts::default();
    let mut tables = Vec::with_capacity(outputs.len());
    for (_, (table, counts)) in outputs {
        skipped.merge(counts);
        tables.push(table);
    }
    let table = MetricsTable::concat(tables);
    skipped.log(path);
    timer.log_completion(table.len() as u64);
    Ok(table)
}

/// Extracts read name, length and mean quality from every record of an unaligned BAM.
///
/// # Errors
/// Returns an error if the file cannot be opened or a record cannot be read.
pub fn extract_unaligned(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    let timer = OperationTimer::new(&format!("Collecting metrics from uBAM {}", path.display()));
    let progress = ProgressTracker::new(format!("Processed records of {}", path.display()));
    let (mut reader, _header) = create_bam_reader(path, ctx.threads)?;

    let mut table = MetricsTable::new(&SourceFormat::Ubam.columns(ctx));
    let mut skipped = SkipCounts::default();
    for result in reader.records() {
        let record =
            result.with_context(|| format!("Failed to read record from {}", path.display()))?;
        skipped.apply(unaligned_metrics(&record), &mut table);
        progress.record(1);
    }

    progress.finish();
    skipped.log(path);
    timer.log_completion(table.len() as u64);
    Ok(table)
}

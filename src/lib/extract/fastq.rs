//! Metrics from FASTQ files.
//!
//! The plain extractor records read name, length and mean quality. The rich extractor also
//! parses the whitespace-separated `key=value` tokens that MinKNOW and the ONT basecallers
//! write after the read name:
//!
//! ```text
//! @0a1b2c runid=f53ee4 read=12 ch=210 start_time=2019-09-06T15:32:01Z barcode=barcode01
//! ```
//!
//! `ch`, `start_time` and `runid` are required on every record (and `barcode` when barcodes
//! are requested). A record lacking one of them fails the whole call, because downstream
//! consumers rely on a uniform schema.
//!
//! The minimal extractor reads the same rich files but keeps only length and `start_time`,
//! skipping the quality computation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use seq_io::fastq::{Reader as FastqReader, Record};
use std::path::Path;

use super::{ExtractContext, RecordOutcome, SkipCounts, SkipReason, SourceFormat};
use crate::errors::NanogetError;
use crate::input::open_reader;
use crate::logging::OperationTimer;
use crate::phred::mean_quality_ascii;
use crate::progress::ProgressTracker;
use crate::table::{MetricRecord, MetricsTable, RawTime};

/// Key of the channel annotation
pub const CHANNEL_KEY: &str = "ch";
/// Key of the start-time annotation
pub const START_TIME_KEY: &str = "start_time";
/// Key of the run-id annotation
pub const RUN_ID_KEY: &str = "runid";
/// Key of the barcode annotation
pub const BARCODE_KEY: &str = "barcode";

/// Fails when the sequence and quality lines of a record differ in length.
///
/// # Errors
/// Returns [`NanogetError::MalformedRecord`] naming the read.
pub fn check_lengths<R: Record>(record: &R, path: &Path) -> Result<()> {
    let (seq, qual) = (record.seq().len(), record.qual().len());
    if seq == qual {
        return Ok(());
    }
    Err(NanogetError::malformed(
        path.display().to_string(),
        format!(
            "read '{}' has {seq} bases but {qual} quality scores",
            String::from_utf8_lossy(record_id(record.head()))
        ),
    )
    .into())
}

/// Metrics of a plain FASTQ record.
///
/// Zero-length reads are skipped: their mean quality is undefined.
///
/// # Errors
/// Returns [`NanogetError::MalformedRecord`] when sequence and quality lengths differ.
pub fn plain_metrics<R: Record>(record: &R, path: &Path) -> Result<RecordOutcome> {
    check_lengths(record, path)?;
    let length = record.seq().len();
    Ok(match mean_quality_ascii(record.qual()) {
        Some(quality) if length > 0 => RecordOutcome::Metrics(MetricRecord {
            read_id: Some(String::from_utf8_lossy(record_id(record.head())).into_owned()),
            ..MetricRecord::new(length as u64, quality)
        }),
        Some(_) => RecordOutcome::Skipped(SkipReason::EmptyRead),
        None if length > 0 => RecordOutcome::Skipped(SkipReason::MissingQualities),
        None => RecordOutcome::Skipped(SkipReason::EmptyRead),
    })
}

/// The read name: the header up to the first whitespace.
pub(crate) fn record_id(head: &[u8]) -> &[u8] {
    head.split(u8::is_ascii_whitespace).next().unwrap_or(head)
}

/// Looks up `key` among the `key=value` tokens of a FASTQ header line.
///
/// The first token is the read name and is never treated as an annotation.
///
/// # Examples
/// ```
/// use nanoget_lib::extract::fastq::header_value;
///
/// let head = "read1 runid=abc ch=7 start_time=2020-01-01T00:00:00Z";
/// assert_eq!(header_value(head, "ch"), Some("7"));
/// assert_eq!(header_value(head, "barcode"), None);
/// ```
#[must_use]
pub fn header_value<'a>(head: &'a str, key: &str) -> Option<&'a str> {
    head.split_whitespace()
        .skip(1)
        .filter_map(|token| token.split_once('='))
        .find_map(|(k, v)| (k == key).then_some(v))
}

/// Metrics of a rich FASTQ record.
///
/// # Errors
/// Returns [`NanogetError::MissingMetadataField`] when a required annotation is absent and
/// [`NanogetError::MalformedRecord`] when one cannot be parsed.
pub fn rich_metrics<R: Record>(record: &R, path: &Path, barcoded: bool) -> Result<RecordOutcome> {
    let head = String::from_utf8_lossy(record.head());
    let read_id = String::from_utf8_lossy(record_id(record.head())).into_owned();
    let require = |key: &str| required_value(&head, key, &read_id, path);

    let channel = require(CHANNEL_KEY)?;
    let channel_id: u32 = channel.parse().map_err(|_| {
        NanogetError::malformed(
            path.display().to_string(),
            format!("invalid channel '{channel}' for read '{read_id}'"),
        )
    })?;
    let timestamp = required_timestamp(&head, &read_id, path)?;
    let run_id = require(RUN_ID_KEY)?.to_string();
    let barcode = if barcoded { Some(require(BARCODE_KEY)?.to_string()) } else { None };

    Ok(match plain_metrics(record, path)? {
        RecordOutcome::Metrics(metrics) => RecordOutcome::Metrics(MetricRecord {
            run_id: Some(run_id),
            channel_id: Some(channel_id),
            barcode,
            time: Some(RawTime::Timestamp(timestamp)),
            ..metrics
        }),
        skipped @ RecordOutcome::Skipped(_) => skipped,
    })
}

fn required_value<'a>(head: &'a str, key: &str, read_id: &str, path: &Path) -> Result<&'a str> {
    header_value(head, key).ok_or_else(|| {
        NanogetError::MissingMetadataField {
            field: key.to_string(),
            read_id: read_id.to_string(),
            path: path.display().to_string(),
        }
        .into()
    })
}

fn required_timestamp(head: &str, read_id: &str, path: &Path) -> Result<DateTime<Utc>> {
    let start_time = required_value(head, START_TIME_KEY, read_id, path)?;
    parse_timestamp(start_time).ok_or_else(|| {
        NanogetError::malformed(
            path.display().to_string(),
            format!("invalid start_time '{start_time}' for read '{read_id}'"),
        )
        .into()
    })
}

/// Length and start time of a rich FASTQ record, without its quality.
///
/// # Errors
/// Returns [`NanogetError::MissingMetadataField`] when `start_time` is absent and
/// [`NanogetError::MalformedRecord`] when it cannot be parsed.
pub fn minimal_metrics<R: Record>(record: &R, path: &Path) -> Result<RecordOutcome> {
    let head = String::from_utf8_lossy(record.head());
    let read_id = String::from_utf8_lossy(record_id(record.head())).into_owned();
    let timestamp = required_timestamp(&head, &read_id, path)?;
    let length = record.seq().len();
    if length == 0 {
        return Ok(RecordOutcome::Skipped(SkipReason::EmptyRead));
    }
    Ok(RecordOutcome::Metrics(MetricRecord {
        time: Some(RawTime::Timestamp(timestamp)),
        ..MetricRecord::length_only(length as u64)
    }))
}

/// Parses an RFC 3339 timestamp into UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|ts| ts.with_timezone(&Utc))
}

/// Extracts read name, length and mean quality from a FASTQ file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid FASTQ.
pub fn extract_plain(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    extract_with(path, ctx, SourceFormat::Fastq, |record| plain_metrics(record, path))
}

/// Extracts read metrics plus run metadata from a rich FASTQ file.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid FASTQ, or any record lacks
/// required metadata.
pub fn extract_rich(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    extract_with(path, ctx, SourceFormat::FastqRich, |record| {
        rich_metrics(record, path, ctx.barcoded)
    })
}

/// Extracts only read length and start time from a rich FASTQ file.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid FASTQ, or any record lacks a
/// valid `start_time`.
pub fn extract_minimal(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    extract_with(path, ctx, SourceFormat::FastqMinimal, |record| minimal_metrics(record, path))
}

fn extract_with<F>(
    path: &Path,
    ctx: &ExtractContext,
    format: SourceFormat,
    mut metrics: F,
) -> Result<MetricsTable>
where
    F: FnMut(&seq_io::fastq::RefRecord<'_>) -> Result<RecordOutcome>,
{
    let timer = OperationTimer::new(&format!("Collecting metrics from {format} {}", path.display()));
    let progress = ProgressTracker::new(format!("Processed records of {}", path.display()));
    let mut reader = FastqReader::new(open_reader(path, ctx.threads)?);
    let mut table = MetricsTable::new(&format.columns(ctx));
    let mut skipped = SkipCounts::default();

    while let Some(result) = reader.next() {
        let record =
            result.with_context(|| format!("Failed to parse FASTQ record in {}", path.display()))?;
        skipped.apply(metrics(&record)?, &mut table);
        progress.record(1);
    }

    progress.finish();
    skipped.log(path);
    timer.log_completion(table.len() as u64);
    Ok(table)
}

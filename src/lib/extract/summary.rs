//! Metrics from basecaller sequencing summary tables.
//!
//! Summary tables are tab-separated with a header line. Only the columns for the requested
//! [`ReadType`] are read; all others are ignored.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use std::str::FromStr;

use super::{ExtractContext, ReadType, RecordOutcome, SkipCounts, SkipReason, SourceFormat};
use crate::errors::NanogetError;
use crate::input::open_reader;
use crate::logging::OperationTimer;
use crate::progress::ProgressTracker;
use crate::table::{MetricRecord, MetricsTable, RawTime};

const BARCODE_COLUMN: &str = "barcode_arrangement";

/// Header names of the columns read for one read type, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryColumns {
    /// Read identifier column
    pub read_id: &'static str,
    /// Sequencing run column
    pub run_id: &'static str,
    /// Flow cell channel column
    pub channel: &'static str,
    /// Start time column, in seconds since the run started
    pub start_time: &'static str,
    /// Read length column for the read type
    pub length: &'static str,
    /// Mean quality column for the read type
    pub quality: &'static str,
}

impl SummaryColumns {
    /// The columns describing reads of `read_type`.
    #[must_use]
    pub fn for_read_type(read_type: ReadType) -> Self {
        let (length, quality) = match read_type {
            ReadType::OneD => ("sequence_length_template", "mean_qscore_template"),
            ReadType::TwoD | ReadType::OneDSquared => ("sequence_length_2d", "mean_qscore_2d"),
        };
        Self {
            read_id: "read_id",
            run_id: "run_id",
            channel: "channel",
            start_time: "start_time",
            length,
            quality,
        }
    }

    fn names(self) -> [&'static str; 6] {
        [self.read_id, self.run_id, self.channel, self.start_time, self.length, self.quality]
    }
}

/// Positions of the required columns within one file's header.
#[derive(Debug)]
struct ColumnIndices {
    read_id: usize,
    run_id: usize,
    channel: usize,
    start_time: usize,
    length: usize,
    quality: usize,
    barcode: Option<usize>,
}

impl ColumnIndices {
    fn resolve(header: &StringRecord, columns: SummaryColumns, barcoded: bool, path: &Path) -> Result<Self> {
        let position = |name: &str| header.iter().position(|h| h == name);
        let mut required = columns.names().to_vec();
        if barcoded {
            required.push(BARCODE_COLUMN);
        }
        let missing: Vec<String> =
            required.iter().filter(|name| position(name).is_none()).map(|s| (*s).to_string()).collect();
        if !missing.is_empty() {
            return Err(NanogetError::MissingColumns { missing, path: path.display().to_string() }.into());
        }

        // All present: checked above.
        let index = |name: &str| position(name).unwrap_or_default();
        Ok(Self {
            read_id: index(columns.read_id),
            run_id: index(columns.run_id),
            channel: index(columns.channel),
            start_time: index(columns.start_time),
            length: index(columns.length),
            quality: index(columns.quality),
            barcode: barcoded.then(|| index(BARCODE_COLUMN)),
        })
    }
}

fn field<'r>(row: &'r StringRecord, index: usize, line: u64, path: &Path) -> Result<&'r str> {
    row.get(index).ok_or_else(|| {
        NanogetError::malformed(path.display().to_string(), format!("line {line} has too few fields"))
            .into()
    })
}

fn parse_field<T: FromStr>(row: &StringRecord, index: usize, name: &str, line: u64, path: &Path) -> Result<T> {
    let value = field(row, index, line, path)?;
    value.trim().parse().map_err(|_| {
        NanogetError::malformed(
            path.display().to_string(),
            format!("invalid {name} '{value}' on line {line}"),
        )
        .into()
    })
}

fn row_metrics(
    row: &StringRecord,
    indices: &ColumnIndices,
    columns: SummaryColumns,
    line: u64,
    path: &Path,
) -> Result<RecordOutcome> {
    let length: u64 = parse_field(row, indices.length, columns.length, line, path)?;
    if length == 0 {
        return Ok(RecordOutcome::Skipped(SkipReason::EmptyRead));
    }
    let quality: f64 = parse_field(row, indices.quality, columns.quality, line, path)?;
    let channel: u32 = parse_field(row, indices.channel, columns.channel, line, path)?;
    let start_time: f64 = parse_field(row, indices.start_time, columns.start_time, line, path)?;
    let barcode = match indices.barcode {
        Some(index) => Some(field(row, index, line, path)?.to_string()),
        None => None,
    };

    Ok(RecordOutcome::Metrics(MetricRecord {
        read_id: Some(field(row, indices.read_id, line, path)?.to_string()),
        run_id: Some(field(row, indices.run_id, line, path)?.to_string()),
        channel_id: Some(channel),
        barcode,
        time: Some(RawTime::Elapsed(start_time)),
        ..MetricRecord::new(length, quality)
    }))
}

/// Extracts per-read metrics from a sequencing summary table.
///
/// # Errors
/// Returns [`NanogetError::MissingColumns`] when the header lacks a required column and
/// [`NanogetError::MalformedRecord`] when a value cannot be parsed.
pub fn extract_summary(path: &Path, ctx: &ExtractContext) -> Result<MetricsTable> {
    let timer = OperationTimer::new(&format!("Collecting metrics from summary {}", path.display()));
    let progress = ProgressTracker::new(format!("Processed rows of {}", path.display()));
    let columns = SummaryColumns::for_read_type(ctx.read_type);

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .from_reader(open_reader(path, ctx.threads)?);
    let header = reader
        .headers()
        .with_context(|| format!("Failed to read summary header of {}", path.display()))?
        .clone();
    let indices = ColumnIndices::resolve(&header, columns, ctx.barcoded, path)?;

    let mut table = MetricsTable::new(&SourceFormat::Summary.columns(ctx));
    let mut skipped = SkipCounts::default();
    let mut row = StringRecord::new();
    // Line 1 is the header.
    let mut line = 1;
    while reader
        .read_record(&mut row)
        .with_context(|| format!("Failed to read summary row of {}", path.display()))?
    {
        line += 1;
        skipped.apply(row_metrics(&row, &indices, columns, line, path)?, &mut table);
        progress.record(1);
    }

    progress.finish();
    skipped.log(path);
    timer.log_completion(table.len() as u64);
    Ok(table)
}

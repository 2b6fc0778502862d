//! Record extractors.
//!
//! Each supported [`SourceFormat`] maps to one [`ExtractFn`] that turns a single input file
//! into a [`MetricsTable`]. The mapping is a closed `match`, fixed at compile time.
//!
//! Extractors decide per record whether it yields metrics or is skipped; a skipped record
//! (for example a zero-length read, whose mean quality is undefined) is counted and logged
//! but never surfaces as an error. See [`RecordOutcome`].
//!
//! - [`fastq`] - plain, metadata-rich and minimal FASTQ
//! - [`fasta`] - read lengths from FASTA
//! - [`bam`] - coordinate-sorted alignments and unaligned BAM
//! - [`summary`] - basecaller sequencing summary tables

pub mod bam;
pub mod fasta;
pub mod fastq;
pub mod summary;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;

use crate::errors::NanogetError;
use crate::table::{Column, MetricRecord, MetricsTable};

/// Signature shared by all extractors.
pub type ExtractFn = fn(&Path, &ExtractContext) -> Result<MetricsTable>;

/// Input formats with an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// 4-line FASTQ without metadata
    Fastq,
    /// FASTQ whose description lines carry `key=value` run metadata
    FastqRich,
    /// Rich FASTQ read for length and start time only
    FastqMinimal,
    /// FASTA, lengths only
    Fasta,
    /// Coordinate-sorted, indexed BAM
    Bam,
    /// Unaligned BAM
    Ubam,
    /// Tab-separated sequencing summary table
    Summary,
}

impl SourceFormat {
    /// All supported formats.
    pub const ALL: [SourceFormat; 7] = [
        SourceFormat::Fastq,
        SourceFormat::FastqRich,
        SourceFormat::FastqMinimal,
        SourceFormat::Fasta,
        SourceFormat::Bam,
        SourceFormat::Ubam,
        SourceFormat::Summary,
    ];

    /// The format tag used on the command line and in logs.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            SourceFormat::Fastq => "fastq",
            SourceFormat::FastqRich => "fastq_rich",
            SourceFormat::FastqMinimal => "fastq_minimal",
            SourceFormat::Fasta => "fasta",
            SourceFormat::Bam => "bam",
            SourceFormat::Ubam => "ubam",
            SourceFormat::Summary => "summary",
        }
    }

    /// The extractor for this format.
    #[must_use]
    pub fn extractor(self) -> ExtractFn {
        match self {
            SourceFormat::Fastq => fastq::extract_plain,
            SourceFormat::FastqRich => fastq::extract_rich,
            SourceFormat::FastqMinimal => fastq::extract_minimal,
            SourceFormat::Fasta => fasta::extract_fasta,
            SourceFormat::Bam => bam::extract_alignments,
            SourceFormat::Ubam => bam::extract_unaligned,
            SourceFormat::Summary => summary::extract_summary,
        }
    }

    /// The columns a table of this format carries, before pruning.
    #[must_use]
    pub fn columns(self, ctx: &ExtractContext) -> Vec<Column> {
        let mut columns = match self {
            SourceFormat::Fastq | SourceFormat::Ubam => {
                vec![Column::ReadId, Column::Length, Column::Quality]
            }
            SourceFormat::FastqRich => vec![
                Column::ReadId,
                Column::RunId,
                Column::ChannelId,
                Column::Timestamp,
                Column::Length,
                Column::Quality,
            ],
            SourceFormat::FastqMinimal => vec![Column::Timestamp, Column::Length],
            SourceFormat::Fasta => vec![Column::ReadId, Column::Length],
            SourceFormat::Bam => vec![
                Column::ReadId,
                Column::Length,
                Column::Quality,
                Column::AlignedLength,
                Column::AlignedQuality,
                Column::MappingQuality,
                Column::PercentIdentity,
            ],
            SourceFormat::Summary => vec![
                Column::ReadId,
                Column::RunId,
                Column::ChannelId,
                Column::Time,
                Column::Length,
                Column::Quality,
            ],
        };
        if ctx.barcoded && matches!(self, SourceFormat::FastqRich | SourceFormat::Summary) {
            columns.push(Column::Barcode);
        }
        columns
    }

    /// Whether a path of `-` may be used to read standard input.
    #[must_use]
    pub fn supports_stdin(self) -> bool {
        matches!(
            self,
            SourceFormat::Fastq
                | SourceFormat::FastqRich
                | SourceFormat::FastqMinimal
                | SourceFormat::Fasta
        )
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SourceFormat {
    type Err = NanogetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SourceFormat::ALL
            .into_iter()
            .find(|format| format.tag() == s)
            .ok_or_else(|| NanogetError::UnsupportedFormat { format: s.to_string() })
    }
}

/// Which summary-table columns describe a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadType {
    /// Single-strand (template) basecalls
    #[default]
    OneD,
    /// 2D basecalls
    TwoD,
    /// 1D-squared (duplex) basecalls
    OneDSquared,
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadType::OneD => f.write_str("1D"),
            ReadType::TwoD => f.write_str("2D"),
            ReadType::OneDSquared => f.write_str("1D2"),
        }
    }
}

impl FromStr for ReadType {
    type Err = NanogetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1D" => Ok(ReadType::OneD),
            "2D" => Ok(ReadType::TwoD),
            "1D2" => Ok(ReadType::OneDSquared),
            _ => Err(NanogetError::configuration(format!(
                "Invalid read type: '{s}' (valid values: '1D', '2D', '1D2')"
            ))),
        }
    }
}

/// Options every extractor receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractContext {
    /// Threads available inside one extractor call (decompression, per-contig workers)
    pub threads: usize,
    /// Summary-table column set
    pub read_type: ReadType,
    /// Extract barcode assignments
    pub barcoded: bool,
    /// Include supplementary alignments
    pub keep_supplementary: bool,
}

impl Default for ExtractContext {
    fn default() -> Self {
        Self { threads: 1, read_type: ReadType::OneD, barcoded: false, keep_supplementary: false }
    }
}

/// Reasons a record is left out of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The read has no bases
    EmptyRead,
    /// The record has bases but no quality scores
    MissingQualities,
    /// The alignment is unmapped
    Unmapped,
    /// The alignment is secondary
    Secondary,
    /// The alignment is supplementary and supplementary alignments were not requested
    Supplementary,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            SkipReason::EmptyRead => "zero-length read",
            SkipReason::MissingQualities => "missing quality scores",
            SkipReason::Unmapped => "unmapped",
            SkipReason::Secondary => "secondary alignment",
            SkipReason::Supplementary => "supplementary alignment",
        };
        f.write_str(description)
    }
}

/// What one raw record turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The record produced a row
    Metrics(MetricRecord),
    /// The record was left out
    Skipped(SkipReason),
}

/// Per-extractor tally of skipped records.
#[derive(Debug, Default, Clone)]
pub(crate) struct SkipCounts {
    counts: Vec<(SkipReason, u64)>,
}

impl SkipCounts {
    pub(crate) fn add(&mut self, reason: SkipReason) {
        match self.counts.iter_mut().find(|(r, _)| *r == reason) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((reason, 1)),
        }
    }

    pub(crate) fn merge(&mut self, other: SkipCounts) {
        for (reason, n) in other.counts {
            match self.counts.iter_mut().find(|(r, _)| *r == reason) {
                Some((_, total)) => *total += n,
                None => self.counts.push((reason, n)),
            }
        }
    }

    /// Adds the outcome's row to `table`, or counts the skip.
    pub(crate) fn apply(&mut self, outcome: RecordOutcome, table: &mut MetricsTable) {
        match outcome {
            RecordOutcome::Metrics(record) => table.push(record),
            RecordOutcome::Skipped(reason) => self.add(reason),
        }
    }

    pub(crate) fn log(&self, path: &Path) {
        for (reason, n) in &self.counts {
            log::debug!("Skipped {n} records in {}: {reason}", path.display());
        }
    }
}

//! Metric records and the tables that hold them.
//!
//! A [`MetricsTable`] is an ordered collection of [`MetricRecord`]s plus the set of
//! [`Column`]s those records populate. The column set belongs to the table, not to the
//! individual rows, so every row of a table shares one schema. Records are created once by
//! an extractor and never mutated; operations that change a table (tagging, pruning, time
//! normalization) consume it and return a new one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A column of a [`MetricsTable`].
///
/// The declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Read name
    ReadId,
    /// Sequencing run identifier
    RunId,
    /// Flow cell channel the read came from
    ChannelId,
    /// Barcode arrangement assigned by the basecaller
    Barcode,
    /// Name of the dataset the row originates from (tracking mode only)
    Dataset,
    /// Raw elapsed seconds since the start of the run
    Time,
    /// Raw wall-clock start timestamp
    Timestamp,
    /// Start time relative to the earliest read, in seconds
    StartTime,
    /// Read length
    Length,
    /// Mean base quality
    Quality,
    /// Aligned query length
    AlignedLength,
    /// Mean base quality over the aligned part of the query
    AlignedQuality,
    /// Mapping quality
    MappingQuality,
    /// Percent identity to the reference
    PercentIdentity,
}

impl Column {
    /// The column header name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Column::ReadId => "read_id",
            Column::RunId => "run_id",
            Column::ChannelId => "channel_id",
            Column::Barcode => "barcode",
            Column::Dataset => "dataset",
            Column::Time => "time",
            Column::Timestamp => "timestamp",
            Column::StartTime => "start_time",
            Column::Length => "length",
            Column::Quality => "quality",
            Column::AlignedLength => "aligned_length",
            Column::AlignedQuality => "aligned_quality",
            Column::MappingQuality => "mapping_quality",
            Column::PercentIdentity => "percent_identity",
        }
    }

    /// Whether a column may be dropped when no row populates it.
    ///
    /// Only length is present for every source; quality is absent for FASTA input.
    #[must_use]
    pub fn is_optional(self) -> bool {
        self != Column::Length
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw start time of a read, as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawTime {
    /// Seconds elapsed since the start of the run (summary tables)
    Elapsed(f64),
    /// Wall-clock timestamp (rich FASTQ headers)
    Timestamp(DateTime<Utc>),
}

impl RawTime {
    /// The time as fractional seconds on a common axis.
    ///
    /// Timestamps are seconds since the Unix epoch. Only differences between values of the
    /// same variant are meaningful.
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        match self {
            RawTime::Elapsed(secs) => secs,
            RawTime::Timestamp(ts) => {
                ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9
            }
        }
    }
}

/// Metrics of one read or one alignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Read name
    pub read_id: Option<String>,
    /// Sequencing run identifier
    pub run_id: Option<String>,
    /// Flow cell channel
    pub channel_id: Option<u32>,
    /// Barcode arrangement
    pub barcode: Option<String>,
    /// Originating dataset, attached in tracking mode
    pub dataset: Option<String>,
    /// Raw start time, removed by time normalization
    pub time: Option<RawTime>,
    /// Start time relative to the earliest read, in seconds
    pub start_time: Option<f64>,
    /// Read length
    pub length: u64,
    /// Mean base quality, absent for sources without base qualities
    pub quality: Option<f64>,
    /// Aligned query length
    pub aligned_length: Option<u64>,
    /// Mean base quality of the aligned part of the query
    pub aligned_quality: Option<f64>,
    /// Mapping quality
    pub mapping_quality: Option<u8>,
    /// Percent identity to the reference
    pub percent_identity: Option<f64>,
}

impl MetricRecord {
    /// Creates a record with only length and quality set.
    #[must_use]
    pub fn new(length: u64, quality: f64) -> Self {
        Self { length, quality: Some(quality), ..Self::default() }
    }

    /// Creates a record of a read without base qualities.
    #[must_use]
    pub fn length_only(length: u64) -> Self {
        Self { length, ..Self::default() }
    }

    /// Whether this record has a value for `column`.
    #[must_use]
    pub fn has_value(&self, column: Column) -> bool {
        match column {
            Column::ReadId => self.read_id.is_some(),
            Column::RunId => self.run_id.is_some(),
            Column::ChannelId => self.channel_id.is_some(),
            Column::Barcode => self.barcode.is_some(),
            Column::Dataset => self.dataset.is_some(),
            Column::Time => matches!(self.time, Some(RawTime::Elapsed(_))),
            Column::Timestamp => matches!(self.time, Some(RawTime::Timestamp(_))),
            Column::StartTime => self.start_time.is_some(),
            Column::Length => true,
            Column::Quality => self.quality.is_some(),
            Column::AlignedLength => self.aligned_length.is_some(),
            Column::AlignedQuality => self.aligned_quality.is_some(),
            Column::MappingQuality => self.mapping_quality.is_some(),
            Column::PercentIdentity => self.percent_identity.is_some(),
        }
    }
}

/// An ordered collection of [`MetricRecord`]s sharing one column set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsTable {
    columns: Vec<Column>,
    records: Vec<MetricRecord>,
}

impl MetricsTable {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub fn new(columns: &[Column]) -> Self {
        let mut columns = columns.to_vec();
        columns.sort_unstable();
        columns.dedup();
        Self { columns, records: Vec::new() }
    }

    /// Creates a table from existing records.
    #[must_use]
    pub fn from_records(columns: &[Column], records: Vec<MetricRecord>) -> Self {
        Self { records, ..Self::new(columns) }
    }

    /// Appends one record.
    pub fn push(&mut self, record: MetricRecord) {
        self.records.push(record);
    }

    /// The columns of this table in canonical order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether the table has `column`.
    #[must_use]
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Header names of the columns.
    #[must_use]
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// The records of this table.
    #[must_use]
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Consumes the table, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> impl Iterator<Item = &MetricRecord> {
        self.records.iter()
    }

    /// Concatenates tables in the order given.
    ///
    /// The result has the union of the input column sets.
    #[must_use]
    pub fn concat(tables: Vec<MetricsTable>) -> MetricsTable {
        let mut columns: Vec<Column> = Vec::new();
        let mut records = Vec::with_capacity(tables.iter().map(MetricsTable::len).sum());
        for table in tables {
            columns.extend(table.columns);
            records.extend(table.records);
        }
        MetricsTable::from_records(&columns, records)
    }

    /// Returns a table whose every row is tagged with `dataset`.
    #[must_use]
    pub fn with_dataset(self, dataset: &str) -> MetricsTable {
        let mut columns = self.columns;
        columns.push(Column::Dataset);
        let records = self
            .records
            .into_iter()
            .map(|record| MetricRecord { dataset: Some(dataset.to_string()), ..record })
            .collect();
        MetricsTable::from_records(&columns, records)
    }

    /// Returns a table without the optional columns that no row populates.
    #[must_use]
    pub fn prune_empty_columns(self) -> MetricsTable {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .copied()
            .filter(|&c| !c.is_optional() || self.records.iter().any(|r| r.has_value(c)))
            .collect();
        MetricsTable { columns, records: self.records }
    }

    /// Returns a table with `removed` columns dropped and `added` columns declared.
    ///
    /// Row values are left untouched; callers are responsible for keeping them consistent.
    #[must_use]
    pub(crate) fn with_columns(self, removed: &[Column], added: &[Column]) -> MetricsTable {
        let columns: Vec<Column> = self
            .columns
            .into_iter()
            .filter(|c| !removed.contains(c))
            .chain(added.iter().copied())
            .collect();
        MetricsTable::from_records(&columns, self.records)
    }
}

//! Merging partial tables into the final result.
//!
//! Partial tables arrive in completion order. They are optionally tagged with their
//! dataset name, concatenated, stripped of optional columns that no row populates, and
//! their raw time values are replaced by a `start_time` relative to the earliest read.

use anyhow::Result;
use log::error;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::NanogetError;
use crate::logging::log_table_summary;
use crate::table::{Column, MetricRecord, MetricsTable};

/// How partial tables from several inputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    /// Concatenate all rows
    #[default]
    Simple,
    /// Concatenate and tag every row with the dataset it came from
    Track,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::Simple => f.write_str("simple"),
            CombineMode::Track => f.write_str("track"),
        }
    }
}

impl FromStr for CombineMode {
    type Err = NanogetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simple" => Ok(CombineMode::Simple),
            "track" => Ok(CombineMode::Track),
            _ => Err(NanogetError::configuration(format!(
                "Invalid combine mode: '{s}' (valid values: 'simple', 'track')"
            ))),
        }
    }
}

/// Concatenates partial tables.
///
/// Each table comes with the index of the input it was extracted from. Under
/// [`CombineMode::Track`] that index selects the table's name from `datasets`.
///
/// # Errors
/// Returns [`NanogetError::ConfigurationError`] if a table's index has no dataset name.
pub fn combine(
    tables: Vec<(usize, MetricsTable)>,
    mode: CombineMode,
    datasets: &[String],
) -> Result<MetricsTable> {
    let tables = match mode {
        CombineMode::Simple => tables.into_iter().map(|(_, table)| table).collect(),
        CombineMode::Track => tables
            .into_iter()
            .map(|(index, table)| {
                let name = datasets.get(index).ok_or_else(|| {
                    NanogetError::configuration(format!("no dataset name for input {}", index + 1))
                })?;
                Ok(table.with_dataset(name))
            })
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(MetricsTable::concat(tables))
}

/// Replaces raw time values by seconds since the earliest read.
///
/// With a dataset column the earliest read is found per dataset, otherwise over the whole
/// table. Tables without raw times are returned unchanged.
#[must_use]
pub fn relative_start_time(table: MetricsTable) -> MetricsTable {
    let raw_columns = [Column::Time, Column::Timestamp];
    if !raw_columns.iter().any(|&c| table.has_column(c)) {
        return table;
    }
    let per_dataset = table.has_column(Column::Dataset);
    let group = |record: &MetricRecord| -> Option<String> {
        if per_dataset { record.dataset.clone() } else { None }
    };

    let mut earliest: HashMap<Option<String>, f64> = HashMap::new();
    for record in table.iter() {
        if let Some(seconds) = record.time.map(|t| t.as_seconds()) {
            earliest
                .entry(group(record))
                .and_modify(|min| *min = min.min(seconds))
                .or_insert(seconds);
        }
    }

    let columns = table.columns().to_vec();
    let records = table
        .into_records()
        .into_iter()
        .map(|record| {
            let start_time = record.time.and_then(|time| {
                earliest.get(&group(&record)).map(|min| time.as_seconds() - min)
            });
            MetricRecord { time: None, start_time, ..record }
        })
        .collect();
    MetricsTable::from_records(&columns, records).with_columns(&raw_columns, &[Column::StartTime])
}

/// Final normalization of a merged table.
///
/// # Errors
/// Returns [`NanogetError::NoReadsFound`] if the table has no rows.
pub fn finalize(table: MetricsTable) -> Result<MetricsTable> {
    if table.is_empty() {
        error!("No reads found in input");
        return Err(NanogetError::NoReadsFound.into());
    }
    let table = relative_start_time(table.prune_empty_columns());
    log_table_summary(&table);
    Ok(table)
}

/// Combines partial tables and normalizes the result.
///
/// # Errors
/// Returns an error if [`combine`] or [`finalize`] fails.
pub fn aggregate(
    tables: Vec<(usize, MetricsTable)>,
    mode: CombineMode,
    datasets: &[String],
) -> Result<MetricsTable> {
    finalize(combine(tables, mode, datasets)?)
}

//! Integration tests for multi-file extraction, dataset tracking and the huge-file path.

use nanoget_lib::{
    CombineMode, Column, ExtractOptions, MetricsTable, NanogetError, SourceFormat, extract,
    extract_tagged,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::helpers::{Codec, FastqRead, SummaryRow, write_fastq, write_summary};
use crate::init_logging;

/// Three FASTQ files of 2, 3 and 1 non-empty reads.
fn write_fastq_files(dir: &TempDir) -> Vec<PathBuf> {
    let files: [&[(&str, usize)]; 3] = [
        &[("a1", 100), ("a2", 200), ("a_empty", 0)],
        &[("b1", 10), ("b2", 20), ("b3", 30)],
        &[("c1", 999)],
    ];
    files
        .iter()
        .enumerate()
        .map(|(i, reads)| {
            let reads: Vec<FastqRead> =
                reads.iter().map(|(name, length)| FastqRead::uniform(name, *length, 15)).collect();
            write_fastq(dir.path(), &format!("file{i}.fastq"), &reads, Codec::Gzip)
        })
        .collect()
}

/// Two summary files whose clocks start at different offsets.
fn write_summary_files(dir: &TempDir) -> Vec<PathBuf> {
    let first = vec![
        SummaryRow::new("x1", 1, 500.0, 100, 9.0),
        SummaryRow::new("x2", 2, 530.0, 100, 9.0),
    ];
    let second = vec![
        SummaryRow::new("y1", 1, 10.0, 100, 9.0),
        SummaryRow::new("y2", 2, 12.5, 100, 9.0),
        SummaryRow::new("y3", 3, 11.0, 100, 9.0),
    ];
    vec![
        write_summary(dir.path(), "first.txt", &first, Codec::Plain),
        write_summary(dir.path(), "second.txt", &second, Codec::Plain),
    ]
}

/// Rows as a sorted multiset of (read id, length, dataset).
fn row_set(table: &MetricsTable) -> Vec<(String, u64, Option<String>)> {
    let mut rows: Vec<_> = table
        .iter()
        .map(|r| (r.read_id.clone().unwrap_or_default(), r.length, r.dataset.clone()))
        .collect();
    rows.sort();
    rows
}

#[test]
fn test_simple_mode_has_no_dataset_column() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);

    let table = extract(SourceFormat::Fastq, &files, 4, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 6);
    assert!(!table.has_column(Column::Dataset));
    assert!(table.iter().all(|r| r.dataset.is_none()));
}

#[test]
fn test_simple_mode_is_order_independent() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let reversed: Vec<PathBuf> = files.iter().rev().cloned().collect();

    let forward = extract(SourceFormat::Fastq, &files, 3, &ExtractOptions::default()).unwrap();
    let backward = extract(SourceFormat::Fastq, &reversed, 2, &ExtractOptions::default()).unwrap();
    assert_eq!(row_set(&forward), row_set(&backward));
}

#[test]
fn test_track_mode_with_names() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let names = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
    let options = ExtractOptions::default().with_combine(CombineMode::Track).with_names(names);

    let table = extract(SourceFormat::Fastq, &files, 4, &options).unwrap();
    assert!(table.has_column(Column::Dataset));
    let datasets: BTreeSet<&str> = table.iter().filter_map(|r| r.dataset.as_deref()).collect();
    assert_eq!(datasets, BTreeSet::from(["alpha", "beta", "gamma"]));

    let beta: Vec<&str> = table
        .iter()
        .filter(|r| r.dataset.as_deref() == Some("beta"))
        .filter_map(|r| r.read_id.as_deref())
        .collect();
    assert_eq!(beta.len(), 3);
    assert!(beta.iter().all(|name| name.starts_with('b')));
}

#[test]
fn test_track_mode_defaults_to_file_names() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let options = ExtractOptions::default().with_combine(CombineMode::Track);

    let table = extract(SourceFormat::Fastq, &files, 2, &options).unwrap();
    let datasets: BTreeSet<String> = table.iter().filter_map(|r| r.dataset.clone()).collect();
    let expected: BTreeSet<String> = files.iter().map(|f| f.display().to_string()).collect();
    assert_eq!(datasets, expected);
}

#[test]
fn test_track_mode_name_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let options = ExtractOptions::default()
        .with_combine(CombineMode::Track)
        .with_names(vec!["alpha".to_string(), "beta".to_string()]);

    let err = extract(SourceFormat::Fastq, &files, 2, &options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::ConfigurationError { .. })
    ));
}

#[test]
fn test_start_time_is_zero_per_dataset_when_tracking() {
    let dir = TempDir::new().unwrap();
    let files = write_summary_files(&dir);
    let names = vec!["early".to_string(), "late".to_string()];
    let options = ExtractOptions::default().with_combine(CombineMode::Track).with_names(names);

    let table = extract(SourceFormat::Summary, &files, 2, &options).unwrap();
    for dataset in ["early", "late"] {
        let min = table
            .iter()
            .filter(|r| r.dataset.as_deref() == Some(dataset))
            .filter_map(|r| r.start_time)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0, "{dataset}");
    }
    let x2 = table.iter().find(|r| r.read_id.as_deref() == Some("x2")).unwrap();
    assert_eq!(x2.start_time, Some(30.0));
}

#[test]
fn test_start_time_is_zero_globally_without_tracking() {
    let dir = TempDir::new().unwrap();
    let files = write_summary_files(&dir);

    let table = extract(SourceFormat::Summary, &files, 2, &ExtractOptions::default()).unwrap();
    let starts: Vec<f64> = table.iter().filter_map(|r| r.start_time).collect();
    assert_eq!(starts.len(), 5);
    assert_eq!(starts.iter().copied().fold(f64::INFINITY, f64::min), 0.0);
    let x1 = table.iter().find(|r| r.read_id.as_deref() == Some("x1")).unwrap();
    assert_eq!(x1.start_time, Some(490.0));
}

#[test]
fn test_huge_single_file() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let options = ExtractOptions::default().with_huge(true).with_combine(CombineMode::Track);

    let table = extract(SourceFormat::Fastq, &files[1..2], 4, &options).unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.iter().all(|r| r.dataset.as_deref() == Some(files[1].to_str().unwrap())));
}

#[test]
fn test_huge_with_several_files_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let options = ExtractOptions::default().with_huge(true);

    let err = extract(SourceFormat::Fastq, &files, 4, &options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::ConfigurationError { .. })
    ));
}

#[test]
fn test_duplicate_inputs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);
    let duplicated = vec![files[0].clone(), files[1].clone(), files[0].clone()];

    let err = extract(SourceFormat::Fastq, &duplicated, 2, &ExtractOptions::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::ConfigurationError { .. })
    ));
}

#[test]
fn test_format_tags() {
    let dir = TempDir::new().unwrap();
    let files = write_fastq_files(&dir);

    let table = extract_tagged("fastq", &files, 2, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 6);
    let err = extract_tagged("cram", &files, 2, &ExtractOptions::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::UnsupportedFormat { format }) if format == "cram"
    ));
}

#[test]
fn test_failing_file_fails_the_whole_call() {
    let dir = TempDir::new().unwrap();
    let mut files = write_fastq_files(&dir);
    let broken = dir.path().join("broken.fastq");
    std::fs::write(&broken, "this is not fastq\n").unwrap();
    files.push(broken);

    assert!(extract(SourceFormat::Fastq, &files, 4, &ExtractOptions::default()).is_err());
}

//! Integration tests for FASTQ (plain, rich and minimal) and FASTA extraction.

use nanoget_lib::{Column, ExtractOptions, NanogetError, SourceFormat, extract};
use rstest::rstest;
use tempfile::TempDir;

use crate::helpers::{Codec, FastqRead, rich_read, write_fasta, write_fastq};
use crate::init_logging;

fn plain_reads() -> Vec<FastqRead> {
    vec![
        FastqRead::uniform("read1", 100, 10),
        FastqRead::uniform("empty", 0, 10),
        FastqRead::uniform("read2", 250, 20),
        FastqRead::uniform("read3", 40, 30),
    ]
}

#[rstest]
#[case::plain("reads.fastq", Codec::Plain)]
#[case::gzip("reads.fastq.gz", Codec::Gzip)]
#[case::bgzf("reads.fastq.bgz", Codec::Bgzf)]
#[case::bzip2("reads.fastq.bz2", Codec::Bzip2)]
fn test_plain_fastq_row_count(#[case] name: &str, #[case] codec: Codec) {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = write_fastq(dir.path(), name, &plain_reads(), codec);
    let table = extract(SourceFormat::Fastq, &[&path], 4, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.column_names(), vec!["read_id", "length", "quality"]);
}

#[test]
fn test_plain_fastq_metrics() {
    let dir = TempDir::new().unwrap();
    let path = write_fastq(dir.path(), "reads.fastq", &plain_reads(), Codec::Plain);
    let table = extract(SourceFormat::Fastq, &[&path], 1, &ExtractOptions::default()).unwrap();

    let read2 = table.iter().find(|r| r.read_id.as_deref() == Some("read2")).unwrap();
    assert_eq!(read2.length, 250);
    assert!((read2.quality.unwrap() - 20.0).abs() < 1e-9);
    assert!(table.iter().all(|r| r.length > 0));
}

#[test]
fn test_rich_fastq_missing_channel_aborts() {
    let dir = TempDir::new().unwrap();
    let reads = vec![
        rich_read("r1", 100, 5, "2019-09-06T15:32:01Z", "run1"),
        FastqRead::uniform("r2", 100, 12)
            .with_annotations(&[("runid", "run1"), ("start_time", "2019-09-06T15:33:01Z")]),
        rich_read("r3", 100, 7, "2019-09-06T15:34:01Z", "run1"),
    ];
    let path = write_fastq(dir.path(), "rich.fastq", &reads, Codec::Plain);

    let err = extract(SourceFormat::FastqRich, &[&path], 2, &ExtractOptions::default()).unwrap_err();
    match err.downcast_ref::<NanogetError>() {
        Some(NanogetError::MissingMetadataField { field, read_id, .. }) => {
            assert_eq!(field, "ch");
            assert_eq!(read_id, "r2");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_rich_fastq_start_times_are_relative() {
    let dir = TempDir::new().unwrap();
    let reads = vec![
        rich_read("r1", 100, 5, "2019-09-06T15:32:31Z", "run1"),
        rich_read("r2", 0, 6, "2019-09-06T15:00:00Z", "run1"),
        rich_read("r3", 120, 7, "2019-09-06T15:32:01Z", "run1"),
        rich_read("r4", 80, 7, "2019-09-06T16:32:01.5Z", "run1"),
    ];
    let path = write_fastq(dir.path(), "rich.fastq.gz", &reads, Codec::Gzip);

    let table = extract(SourceFormat::FastqRich, &[&path], 1, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.column_names(),
        vec!["read_id", "run_id", "channel_id", "start_time", "length", "quality"]
    );
    let starts: Vec<(Option<&str>, f64)> =
        table.iter().map(|r| (r.read_id.as_deref(), r.start_time.unwrap())).collect();
    assert_eq!(starts, vec![(Some("r1"), 30.0), (Some("r3"), 0.0), (Some("r4"), 3600.5)]);
}

#[test]
fn test_rich_fastq_barcodes() {
    let dir = TempDir::new().unwrap();
    let reads = vec![
        rich_read("r1", 100, 5, "2019-09-06T15:32:31Z", "run1")
            .with_annotations(&[("barcode", "barcode01")]),
        rich_read("r2", 100, 5, "2019-09-06T15:32:32Z", "run1")
            .with_annotations(&[("barcode", "unclassified")]),
    ];
    let path = write_fastq(dir.path(), "rich.fastq", &reads, Codec::Plain);
    let options = ExtractOptions::default().with_barcoded(true);

    let table = extract(SourceFormat::FastqRich, &[&path], 1, &options).unwrap();
    assert!(table.has_column(Column::Barcode));
    let barcodes: Vec<_> = table.iter().map(|r| r.barcode.clone().unwrap()).collect();
    assert_eq!(barcodes, vec!["barcode01", "unclassified"]);
}

#[test]
fn test_rich_fastq_missing_barcode_when_requested() {
    let dir = TempDir::new().unwrap();
    let reads = vec![rich_read("r1", 100, 5, "2019-09-06T15:32:31Z", "run1")];
    let path = write_fastq(dir.path(), "rich.fastq", &reads, Codec::Plain);
    let options = ExtractOptions::default().with_barcoded(true);

    let err = extract(SourceFormat::FastqRich, &[&path], 1, &options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::MissingMetadataField { field, .. }) if field == "barcode"
    ));
}

#[test]
fn test_only_empty_reads_is_fatal() {
    let dir = TempDir::new().unwrap();
    let reads = vec![FastqRead::uniform("empty1", 0, 10), FastqRead::uniform("empty2", 0, 10)];
    let path = write_fastq(dir.path(), "empty.fastq", &reads, Codec::Plain);

    let err = extract(SourceFormat::Fastq, &[&path], 1, &ExtractOptions::default()).unwrap_err();
    assert!(matches!(err.downcast_ref::<NanogetError>(), Some(NanogetError::NoReadsFound)));
}

#[rstest]
#[case::plain("reads.fasta", Codec::Plain)]
#[case::gzip("reads.fasta.gz", Codec::Gzip)]
#[case::bzip2("reads.fasta.bz2", Codec::Bzip2)]
fn test_fasta_lengths(#[case] name: &str, #[case] codec: Codec) {
    let dir = TempDir::new().unwrap();
    let reads = [("long", 150), ("empty", 0), ("short", 7)];
    let path = write_fasta(dir.path(), name, &reads, 60, codec);

    let table = extract(SourceFormat::Fasta, &[&path], 2, &ExtractOptions::default()).unwrap();
    assert_eq!(table.column_names(), vec!["read_id", "length"]);
    let rows: Vec<(Option<&str>, u64)> =
        table.iter().map(|r| (r.read_id.as_deref(), r.length)).collect();
    assert_eq!(rows, vec![(Some("long"), 150), (Some("short"), 7)]);
}

#[test]
fn test_minimal_fastq_keeps_length_and_start_time() {
    let dir = TempDir::new().unwrap();
    let reads = vec![
        rich_read("r1", 100, 5, "2019-09-06T15:32:31Z", "run1"),
        rich_read("r2", 0, 6, "2019-09-06T15:00:00Z", "run1"),
        rich_read("r3", 120, 7, "2019-09-06T15:32:01Z", "run1"),
    ];
    let path = write_fastq(dir.path(), "rich.fastq", &reads, Codec::Plain);

    let table =
        extract(SourceFormat::FastqMinimal, &[&path], 1, &ExtractOptions::default()).unwrap();
    assert_eq!(table.column_names(), vec!["start_time", "length"]);
    let rows: Vec<(f64, u64)> = table.iter().map(|r| (r.start_time.unwrap(), r.length)).collect();
    assert_eq!(rows, vec![(30.0, 100), (0.0, 120)]);
    assert!(table.iter().all(|r| r.quality.is_none() && r.channel_id.is_none()));
}

#[test]
fn test_minimal_fastq_missing_start_time_aborts() {
    let dir = TempDir::new().unwrap();
    let reads = vec![
        rich_read("r1", 100, 5, "2019-09-06T15:32:31Z", "run1"),
        FastqRead::uniform("r2", 100, 12),
    ];
    let path = write_fastq(dir.path(), "rich.fastq", &reads, Codec::Plain);

    let err = extract(SourceFormat::FastqMinimal, &[&path], 1, &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::MissingMetadataField { field, read_id, .. })
            if field == "start_time" && read_id == "r2"
    ));
}

#[test]
fn test_unequal_sequence_and_quality_is_malformed() {
    let dir = TempDir::new().unwrap();
    let mut truncated = FastqRead::uniform("bad", 10, 20);
    truncated.quality.truncate(4);
    let reads = vec![FastqRead::uniform("good", 10, 20), truncated];
    let path = write_fastq(dir.path(), "bad.fastq", &reads, Codec::Plain);

    assert!(extract(SourceFormat::Fastq, &[&path], 1, &ExtractOptions::default()).is_err());
}

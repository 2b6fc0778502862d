//! Integration tests for sequencing summary extraction.

use nanoget_lib::{Column, ExtractOptions, NanogetError, ReadType, SourceFormat, extract};
use tempfile::TempDir;

use crate::helpers::{Codec, SummaryRow, write_summary, write_text};

#[test]
fn test_summary_drops_zero_length_rows() {
    let dir = TempDir::new().unwrap();
    let rows = vec![
        SummaryRow::new("r1", 10, 120.25, 1500, 9.5),
        SummaryRow::new("r2", 11, 80.0, 0, 0.0),
        SummaryRow::new("r3", 12, 100.0, 2200, 11.0),
    ];
    let path = write_summary(dir.path(), "sequencing_summary.txt", &rows, Codec::Plain);

    let table = extract(SourceFormat::Summary, &[&path], 2, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.columns(),
        &[
            Column::ReadId,
            Column::RunId,
            Column::ChannelId,
            Column::StartTime,
            Column::Length,
            Column::Quality
        ]
    );
    let r1 = &table.records()[0];
    assert_eq!(r1.read_id.as_deref(), Some("r1"));
    assert_eq!(r1.channel_id, Some(10));
    assert_eq!(r1.start_time, Some(20.25));
    assert_eq!(table.records()[1].start_time, Some(0.0));
}

#[test]
fn test_compressed_summary() {
    let dir = TempDir::new().unwrap();
    let rows = vec![SummaryRow::new("r1", 1, 5.0, 700, 8.0)];
    let path = write_summary(dir.path(), "summary.txt.bz2", &rows, Codec::Bzip2);

    let table = extract(SourceFormat::Summary, &[&path], 1, &ExtractOptions::default()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.records()[0].length, 700);
}

#[test]
fn test_summary_two_d_columns_are_required() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("summary.txt");
    write_text(
        &path,
        "read_id\trun_id\tchannel\tstart_time\tsequence_length_template\tmean_qscore_template\nr1\trun\t1\t2.0\t100\t9.0\n",
        Codec::Plain,
    );
    let options = ExtractOptions::default().with_read_type(ReadType::OneDSquared);

    let err = extract(SourceFormat::Summary, &[&path], 1, &options).unwrap_err();
    match err.downcast_ref::<NanogetError>() {
        Some(NanogetError::MissingColumns { missing, .. }) => {
            assert_eq!(missing, &["sequence_length_2d", "mean_qscore_2d"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_summary_barcodes() {
    let dir = TempDir::new().unwrap();
    let mut row = SummaryRow::new("r1", 1, 5.0, 700, 8.0);
    row.barcode = "barcode12".to_string();
    let path = write_summary(dir.path(), "summary.txt", &[row], Codec::Gzip);
    let options = ExtractOptions::default().with_barcoded(true);

    let table = extract(SourceFormat::Summary, &[&path], 1, &options).unwrap();
    assert_eq!(table.records()[0].barcode.as_deref(), Some("barcode12"));
}

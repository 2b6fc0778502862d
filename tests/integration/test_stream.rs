//! Integration tests for lazy per-read streaming.

use nanoget_lib::{NanogetError, stream};
use tempfile::TempDir;

use crate::helpers::{Codec, FastqRead, write_fastq};

#[test]
fn test_stream_compressed_file_in_order() {
    let dir = TempDir::new().unwrap();
    let reads: Vec<FastqRead> = (0..500)
        .map(|i| FastqRead::uniform(&format!("read{i}"), if i % 7 == 0 { 0 } else { 10 + i }, 15))
        .collect();
    let path = write_fastq(dir.path(), "reads.fastq.gz", &reads, Codec::Gzip);

    let streamed: Vec<_> = stream(&path, 4).unwrap().collect::<anyhow::Result<Vec<_>>>().unwrap();
    let expected: Vec<String> =
        (0..500).filter(|i| i % 7 != 0).map(|i| format!("read{i}")).collect();
    let names: Vec<String> = streamed.iter().map(|r| r.read_id.clone()).collect();
    assert_eq!(names, expected);
    assert!(streamed.iter().all(|r| (r.mean_quality - 15.0).abs() < 1e-9));
    assert!(streamed.iter().all(|r| (r.median_quality - 15.0).abs() < 1e-9));
    assert_eq!(streamed[0].length, 11);
}

#[test]
fn test_stream_early_drop() {
    let dir = TempDir::new().unwrap();
    let reads: Vec<FastqRead> =
        (0..2000).map(|i| FastqRead::uniform(&format!("read{i}"), 50, 20)).collect();
    let path = write_fastq(dir.path(), "reads.fastq", &reads, Codec::Plain);

    let first: Vec<_> = stream(&path, 2).unwrap().take(3).map(Result::unwrap).collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first[2].read_id, "read2");
}

#[test]
fn test_stream_rejects_zero_threads() {
    let dir = TempDir::new().unwrap();
    let path = write_fastq(dir.path(), "reads.fastq", &[FastqRead::uniform("r", 5, 5)], Codec::Plain);

    let err = stream(&path, 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NanogetError>(),
        Some(NanogetError::ConfigurationError { .. })
    ));
}

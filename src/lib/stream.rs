//! Lazy, ordered per-read metrics from one FASTQ file.
//!
//! A reader thread parses records and hands them, numbered, to a fixed set of worker
//! threads. The returned [`ReadStream`] collects the workers' results in a
//! [`ReorderBuffer`] and yields them in the order the records appear in the file.
//!
//! The stream holds no partial state that can be resumed. To read a file again, call
//! [`stream`] again. Dropping the stream early stops the background threads once they
//! next try to hand over a result.

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use log::debug;
use seq_io::fastq::{OwnedRecord, Reader as FastqReader, Record};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread;

use crate::extract::fastq::check_lengths;
use crate::input::open_reader;
use crate::phred::{mean_quality_ascii, median_quality_ascii};
use crate::reorder_buffer::ReorderBuffer;
use crate::validation::{validate_file_exists, validate_threads};

/// Records in flight per worker.
const QUEUE_DEPTH_PER_WORKER: usize = 64;

/// Metrics of one streamed read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamedRead {
    /// Read name
    pub read_id: String,
    /// Number of bases
    pub length: u64,
    /// Mean quality, averaged in error-probability space
    pub mean_quality: f64,
    /// Median of the per-base quality scores
    pub median_quality: f64,
}

impl StreamedRead {
    /// Metrics of one record, or `None` for a zero-length read.
    #[must_use]
    pub fn from_record<R: Record>(record: &R) -> Option<Self> {
        let length = record.seq().len();
        if length == 0 {
            return None;
        }
        let read_id = record.id().map_or_else(
            |_| String::from_utf8_lossy(record.head()).into_owned(),
            str::to_string,
        );
        Some(Self {
            read_id,
            length: length as u64,
            mean_quality: mean_quality_ascii(record.qual())?,
            median_quality: median_quality_ascii(record.qual())?,
        })
    }
}

type Sequenced<T> = (u64, T);
type StreamItem = Result<Option<StreamedRead>>;

/// Iterator over the reads of one file, in file order.
pub struct ReadStream {
    path: PathBuf,
    results: Receiver<Sequenced<StreamItem>>,
    buffer: ReorderBuffer<StreamItem>,
    done: bool,
}

impl Iterator for ReadStream {
    type Item = Result<StreamedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.try_pop_next() {
                match item {
                    Ok(Some(read)) => return Some(Ok(read)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            if self.done {
                return None;
            }
            match self.results.recv() {
                Ok((seq, item)) => self.buffer.insert(seq, item),
                Err(_) => {
                    self.done = true;
                    if self.buffer.is_empty() {
                        debug!("Finished streaming {}", self.path.display());
                        return None;
                    }
                    return Some(Err(anyhow!(
                        "Stream of {} ended before record {} was processed",
                        self.path.display(),
                        self.buffer.next_seq() + 1
                    )));
                }
            }
        }
    }
}

fn read_records(
    path: &Path,
    reader: FastqReader<Box<dyn std::io::BufRead + Send>>,
    work: &Sender<Sequenced<OwnedRecord>>,
    results: &Sender<Sequenced<StreamItem>>,
) {
    let mut reader = reader;
    let mut seq = 0;
    while let Some(result) = reader.next() {
        let sent = match result {
            Ok(record) => work.send((seq, record.to_owned_record())).is_ok(),
            Err(e) => {
                let error = anyhow::Error::new(e)
                    .context(format!("Failed to parse FASTQ record in {}", path.display()));
                let _ = results.send((seq, Err(error)));
                false
            }
        };
        if !sent {
            return;
        }
        seq += 1;
    }
}

fn compute_metrics(
    path: &Path,
    work: &Receiver<Sequenced<OwnedRecord>>,
    results: &Sender<Sequenced<StreamItem>>,
) {
    for (seq, record) in work {
        let item = check_lengths(&record, path).map(|()| StreamedRead::from_record(&record));
        if results.send((seq, item)).is_err() {
            return;
        }
    }
}

/// Streams per-read metrics from a FASTQ file using `threads` workers.
///
/// Zero-length reads are skipped. Reads are yielded in file order.
///
/// # Errors
/// Returns an error if `threads` is zero, the file does not exist, or it cannot be opened.
/// Parse errors are yielded by the iterator, after which it ends.
pub fn stream<P: AsRef<Path>>(path: P, threads: usize) -> Result<ReadStream> {
    let path = path.as_ref().to_path_buf();
    validate_threads(threads)?;
    validate_file_exists(&path, "Input FASTQ")?;
    let reader = FastqReader::new(open_reader(&path, 1)?);

    let (work_tx, work_rx) = bounded::<Sequenced<OwnedRecord>>(threads * QUEUE_DEPTH_PER_WORKER);
    let (result_tx, result_rx) = bounded::<Sequenced<StreamItem>>(threads * QUEUE_DEPTH_PER_WORKER);

    for i in 0..threads {
        let work_rx = work_rx.clone();
        let result_tx = result_tx.clone();
        let worker_path = path.clone();
        thread::Builder::new()
            .name(format!("nanoget-stream-{i}"))
            .spawn(move || compute_metrics(&worker_path, &work_rx, &result_tx))
            .context("Failed to spawn stream worker")?;
    }
    drop(work_rx);

    let reader_path = path.clone();
    thread::Builder::new()
        .name("nanoget-stream-reader".to_string())
        .spawn(move || read_records(&reader_path, reader, &work_tx, &result_tx))
        .context("Failed to spawn stream reader")?;

    debug!("Streaming {} with {threads} workers", path.display());
    Ok(ReadStream { path, results: result_rx, buffer: ReorderBuffer::new(), done: false })
}

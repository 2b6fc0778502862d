//! Opening possibly-compressed text inputs.
//!
//! FASTQ, FASTA and summary files may be plain, gzip, bgzip or bzip2 compressed, or come
//! from standard input. The codec is detected from the first bytes of the file rather than
//! from its extension.

use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::debug;
use noodles::bgzf::io::MultithreadedReader;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::num::NonZero;
use std::path::Path;

use crate::validation::is_stdin_path;

const BUFFER_SIZE: usize = 1024 * 1024;

/// Compression format detected from file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// BGZF format (blocked gzip, can be parallelized)
    Bgzf,
    /// Standard gzip format
    Gzip,
    /// bzip2 format
    Bzip2,
    /// Uncompressed file
    Plain,
}

impl CompressionFormat {
    /// Detects the compression format from the leading bytes of a stream.
    ///
    /// BGZF files are gzip files (magic `1f 8b`, deflate method, `FEXTRA` flag set) whose
    /// first extra subfield is `BC`. bzip2 files start with `BZh`.
    #[must_use]
    pub fn detect(header: &[u8]) -> Self {
        if header.len() >= 3 && &header[..3] == b"BZh" {
            return CompressionFormat::Bzip2;
        }
        if header.len() < 2 || header[0] != 0x1f || header[1] != 0x8b {
            return CompressionFormat::Plain;
        }
        if header.len() >= 14
            && header[2] == 0x08
            && (header[3] & 0x04) != 0
            && u16::from_le_bytes([header[10], header[11]]) >= 6
            && header[12] == b'B'
            && header[13] == b'C'
        {
            return CompressionFormat::Bgzf;
        }
        CompressionFormat::Gzip
    }
}

/// Detect the compression format of a file by reading its header.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn detect_compression_format(path: &Path) -> Result<CompressionFormat> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open input: {}", path.display()))?;
    let mut header = [0u8; 18];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .with_context(|| format!("Failed to read input: {}", path.display()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(CompressionFormat::detect(&header[..filled]))
}

/// Open a text input with automatic decompression.
///
/// `-` and `/dev/stdin` read standard input; gzip-compressed standard input is decompressed
/// too. For BGZF files, `threads > 1` decompresses blocks on a noodles
/// `MultithreadedReader`; all other codecs decompress on the calling thread.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_reader(path: &Path, threads: usize) -> Result<Box<dyn BufRead + Send>> {
    if is_stdin_path(path) {
        debug!("Reading from standard input");
        return open_stream(io::stdin());
    }

    let format = detect_compression_format(path)?;
    let file =
        File::open(path).with_context(|| format!("Failed to open input: {}", path.display()))?;

    let reader: Box<dyn BufRead + Send> = match format {
        CompressionFormat::Bgzf if threads > 1 => {
            debug!("Detected BGZF input {}, using {threads} decompression threads", path.display());
            let worker_count = NonZero::new(threads).unwrap_or(NonZero::<usize>::MIN);
            Box::new(BufReader::with_capacity(
                BUFFER_SIZE,
                MultithreadedReader::with_worker_count(worker_count, file),
            ))
        }
        CompressionFormat::Bgzf | CompressionFormat::Gzip => {
            debug!("Detected gzip-compressed input {}", path.display());
            Box::new(BufReader::with_capacity(BUFFER_SIZE, MultiGzDecoder::new(file)))
        }
        CompressionFormat::Bzip2 => {
            debug!("Detected bzip2-compressed input {}", path.display());
            Box::new(BufReader::with_capacity(BUFFER_SIZE, MultiBzDecoder::new(file)))
        }
        CompressionFormat::Plain => {
            debug!("Detected uncompressed input {}", path.display());
            Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
        }
    };
    Ok(reader)
}

/// Wraps a non-seekable stream, sniffing its compression from the buffered prefix.
fn open_stream<R: Read + Send + 'static>(inner: R) -> Result<Box<dyn BufRead + Send>> {
    let mut buffered = BufReader::with_capacity(BUFFER_SIZE, inner);
    let format = CompressionFormat::detect(
        buffered.fill_buf().context("Failed to read from standard input")?,
    );
    let reader: Box<dyn BufRead + Send> = match format {
        CompressionFormat::Bgzf | CompressionFormat::Gzip => {
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        }
        CompressionFormat::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(buffered))),
        CompressionFormat::Plain => Box::new(buffered),
    };
    Ok(reader)
}

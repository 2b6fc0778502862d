//! BAM file I/O helpers.
//!
//! Opening BAM readers (single- or multi-threaded BGZF decompression), checking the header
//! sort order, and locating or building the BAI index that per-contig queries need.

use anyhow::{Context, Result};
use log::{debug, info};
use noodles::bam::{self, bai};
use noodles::bgzf::io::{MultithreadedReader, Reader as BgzfReader};
use noodles::sam::Header;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::num::NonZero;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Sort order value of a coordinate-sorted file.
pub const COORDINATE_SORT_ORDER: &str = "coordinate";

/// BGZF reader that is either single- or multi-threaded.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader (lower overhead for small files)
    SingleThreaded(BgzfReader<File>),
    /// Multi-threaded BGZF reader (noodles built-in threading)
    MultiThreaded(MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// Sequential BAM reader over either BGZF reader.
pub type BamReaderAuto = bam::io::Reader<BgzfReaderEnum>;

/// Create a BAM reader and read its header.
///
/// `threads > 1` decompresses on a noodles `MultithreadedReader` with that many workers.
///
/// # Errors
/// Returns an error if the file cannot be opened or its header cannot be read.
pub fn create_bam_reader<P: AsRef<Path>>(path: P, threads: usize) -> Result<(BamReaderAuto, Header)> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open input BAM: {}", path_ref.display()))?;

    let bgzf_reader = match NonZero::new(threads) {
        Some(worker_count) if threads > 1 => {
            BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(worker_count, file))
        }
        _ => BgzfReaderEnum::SingleThreaded(BgzfReader::new(file)),
    };

    let mut reader = bam::io::Reader::from(bgzf_reader);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;

    Ok((reader, header))
}

/// The `SO` value of the header's `@HD` line, if any.
#[must_use]
pub fn sort_order(header: &Header) -> Option<String> {
    header
        .header()
        .and_then(|hd| hd.other_fields().get(&header_tag::SORT_ORDER))
        .map(ToString::to_string)
}

/// Candidate index paths for a BAM: `<file>.bai`, then `<stem>.bai`.
#[must_use]
pub fn index_candidates(path: &Path) -> [PathBuf; 2] {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".bai");
    [PathBuf::from(appended), path.with_extension("bai")]
}

/// Returns the first existing companion index of `path`.
#[must_use]
pub fn find_index(path: &Path) -> Option<PathBuf> {
    index_candidates(path).into_iter().find(|candidate| candidate.is_file())
}

/// Reads the companion index of `path`, building and writing `<file>.bai` if none exists.
///
/// A built index is written to a uniquely named temporary file in the same directory and
/// renamed into place, so concurrent builders never expose a partial index.
///
/// # Errors
/// Returns an error if the index cannot be read, built or written.
pub fn load_or_build_index(path: &Path) -> Result<(PathBuf, bai::Index)> {
    if let Some(index_path) = find_index(path) {
        debug!("Using existing index {}", index_path.display());
        let index = bai::fs::read(&index_path)
            .with_context(|| format!("Failed to read index: {}", index_path.display()))?;
        return Ok((index_path, index));
    }

    let [index_path, _] = index_candidates(path);
    info!("Creating index {}", index_path.display());
    let index =
        bam::fs::index(path).with_context(|| format!("Failed to index BAM: {}", path.display()))?;

    let dir = index_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary index in: {}", dir.display()))?;
    write_bai_index(temp.as_file_mut(), &index)
        .with_context(|| format!("Failed to write index for: {}", path.display()))?;
    temp.persist(&index_path)
        .with_context(|| format!("Failed to move index into place: {}", index_path.display()))?;
    Ok((index_path, index))
}

/// Write a BAI index.
///
/// # Errors
/// Returns an error if writing the index fails.
pub fn write_bai_index<W: Write>(writer: W, index: &bai::Index) -> Result<()> {
    let mut writer = bai::io::Writer::new(writer);
    writer.write_index(index).context("Failed to write BAI index")?;
    Ok(())
}

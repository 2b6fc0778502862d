#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: Read lengths, quality scores and times are converted between numeric types
// - missing_*_doc: Documentation improvements tracked separately
// - needless_pass_by_value: Tables are handed over by value between pipeline stages
// - module_name_repetitions: Types such as `StreamedRead` live in like-named modules
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
    clippy::redundant_closure_for_method_calls,
    clippy::map_unwrap_or,
    clippy::uninlined_format_args
)]

//! # nanoget - per-read metrics from Oxford Nanopore sequencing outputs
//!
//! This library turns basecalled reads (FASTQ or FASTA), metadata-rich reads, aligned reads
//! and sequencing summary tables into one table of per-read (or per-alignment) metrics: length, mean
//! quality, and where the source provides them aligned length, aligned quality, mapping
//! quality, percent identity, channel, run and relative start time.
//!
//! ## Overview
//!
//! ### Extraction
//!
//! - **[`dispatch`]** - the [`extract()`] entry point, thread budgets and the huge-file path
//! - **[`extract`][mod@extract]** - one extractor per [`SourceFormat`]
//! - **[`partition`]** - per-file and per-contig work units and the worker pool
//! - **[`aggregate`]** - merging, dataset tracking, column pruning and relative start times
//! - **[`stream`][mod@stream]** - lazy, ordered per-read metrics from one FASTQ file
//!
//! ### Metrics
//!
//! - **[`table`]** - [`MetricRecord`] and [`MetricsTable`]
//! - **[`identity`]** - percent identity from `NM`, or from `MD` plus the CIGAR
//! - **[`phred`]** - mean and median read quality
//!
//! ### Utilities
//!
//! - **[`input`]** - decompressing readers for FASTQ, FASTA and summary files
//! - **[`bam_io`]** - BAM readers, sort-order checks and BAI indexes
//! - **[`validation`]** - checks run before any input is read
//! - **[`errors`]** - the [`NanogetError`] taxonomy
//! - **[`logging`]** / **[`progress`]** - uniform progress and timing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use nanoget_lib::{CombineMode, ExtractOptions, SourceFormat, extract};
//!
//! # fn main() -> anyhow::Result<()> {
//! let options = ExtractOptions::default().with_combine(CombineMode::Track);
//! let table = extract(SourceFormat::FastqRich, &["run1.fastq.gz", "run2.fastq.gz"], 8, &options)?;
//! for record in table.iter() {
//!     println!("{:?} {} {:?}", record.dataset, record.length, record.quality);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Fatal conditions are [`NanogetError`]s inside an `anyhow::Error`:
//!
//! ```no_run
//! use nanoget_lib::{ExtractOptions, NanogetError, SourceFormat, extract};
//!
//! let result = extract(SourceFormat::Bam, &["unsorted.bam"], 4, &ExtractOptions::default());
//! if let Err(e) = result {
//!     if let Some(NanogetError::UnsortedInput { .. }) = e.downcast_ref::<NanogetError>() {
//!         eprintln!("sort the BAM first");
//!     }
//! }
//! ```

pub mod aggregate;
pub mod bam_io;
pub mod dispatch;
pub mod errors;
pub mod extract;
pub mod identity;
pub mod input;
pub mod logging;
pub mod partition;
pub mod phred;
pub mod progress;
pub mod reorder_buffer;
pub mod stream;
pub mod table;
pub mod validation;

pub use aggregate::CombineMode;
pub use dispatch::{ExtractOptions, extract, extract_tagged};
pub use errors::NanogetError;
pub use extract::{ReadType, SourceFormat};
pub use stream::{ReadStream, StreamedRead, stream};
pub use table::{Column, MetricRecord, MetricsTable};

//! # pzip
//!
//! Zip a directory tree with byte-level progress reporting.
//!
//! The engine works in two passes over the source tree: a [`scan`] that
//! totals the bytes to archive, then an [`archive`] pass that streams every
//! file through a deflate encoder into a zip container, reporting
//! `(bytes_done, bytes_total)` after every chunk. [`next_archive_name`]
//! picks a file name that does not collide with existing archives.
//!
//! ## Features
//!
//! - Streaming zip writer (no seeking, data descriptors, ZIP64 when needed)
//! - File modification times and Unix permission bits recorded per entry
//! - Collision-free output names: `name.zip`, `name-v1.zip`, `name-v2.zip`, ...
//! - Verification by re-reading the archive and checking every CRC
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use pzip::{ArchiveFormat, archive, next_archive_name};
//!
//! fn main() -> anyhow::Result<()> {
//!     let src = Path::new("/home/me/project");
//!     let out = next_archive_name(Path::new("/home/me"), "project", ArchiveFormat::Zip)?;
//!
//!     let mut report = |done: u64, total: u64| eprintln!("{done}/{total}");
//!     let stats = archive(src, &out, Some(&mut report))?;
//!     println!("{} files, {} bytes", stats.file_count, stats.total_bytes);
//!     Ok(())
//! }
//! ```

pub mod archiver;
pub mod cli;
pub mod error;
pub mod io;
pub mod naming;
pub mod progress;
pub mod scan;
pub mod verify;
pub mod zip;

pub use archiver::{ArchiveOptions, archive, archive_with_options};
pub use cli::Cli;
pub use error::{ArchiveFailure, Result, ZipperError};
pub use io::{LocalFileReader, ReadAt};
pub use naming::{ArchiveFormat, next_archive_name, next_archive_name_within};
pub use progress::{ProgressTracker, ProgressWriter, format_bytes, percent_complete};
pub use scan::{ArchiveStats, scan};
pub use verify::{VerifyReport, verify_archive};
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};

//! Directory-to-zip archiving with byte-level progress.
//!
//! ## Flow
//!
//! 1. [`scan`] the source tree for the progress denominator
//! 2. Create (truncate) the output file
//! 3. Report `(0, total)` before writing anything
//! 4. Walk the tree again in file-name order, writing one entry per
//!    directory, file or symlink and reporting after every chunk
//! 5. Finalize the central directory and flush the file, even on failure
//!
//! The stats from step 1 are returned in both the success and the failure
//! case.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::{ArchiveFailure, Result, ZipperError};
use crate::progress::{ProgressTracker, ProgressWriter};
use crate::scan::{ArchiveStats, scan};
use crate::zip::{CompressionMethod, EntryMetadata, ZipWriter};

/// Read buffer used when streaming a file into its entry.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;
/// Deflate level used unless configured otherwise.
pub const DEFAULT_LEVEL: u32 = 6;

/// How file entries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub method: CompressionMethod,
    /// Deflate level, 0-9. Ignored for stored entries.
    pub level: u32,
    pub chunk_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflate,
            level: DEFAULT_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Archive `src_dir` into a zip file at `zip_path` with default options.
///
/// `on_progress` receives `(bytes_done, bytes_total)`: once before any data
/// is written and again after every chunk. An existing file at `zip_path` is
/// overwritten; use [`next_archive_name`](crate::next_archive_name) to pick
/// a free name first.
pub fn archive(
    src_dir: &Path,
    zip_path: &Path,
    on_progress: Option<&mut dyn FnMut(u64, u64)>,
) -> std::result::Result<ArchiveStats, ArchiveFailure> {
    archive_with_options(src_dir, zip_path, &ArchiveOptions::default(), on_progress)
}

/// Same as [`archive`] with explicit [`ArchiveOptions`].
pub fn archive_with_options(
    src_dir: &Path,
    zip_path: &Path,
    options: &ArchiveOptions,
    on_progress: Option<&mut dyn FnMut(u64, u64)>,
) -> std::result::Result<ArchiveStats, ArchiveFailure> {
    let stats = scan(src_dir).map_err(|error| ArchiveFailure {
        stats: ArchiveStats::default(),
        error,
    })?;
    let fail = |error| ArchiveFailure { stats, error };

    let file = File::create(zip_path).map_err(|source| {
        fail(ZipperError::Create {
            path: zip_path.to_path_buf(),
            source,
        })
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let mut tracker = ProgressTracker::new(stats.total_bytes, on_progress);
    tracker.notify();

    let written = write_tree(&mut zip, src_dir, options, &mut tracker);
    let closed = close(zip, zip_path);

    // The first error wins; a close failure only surfaces on its own.
    written.and(closed).map_err(fail)?;

    tracing::info!(
        "archived {} files ({} bytes) from {} into {}",
        stats.file_count,
        tracker.bytes_done(),
        src_dir.display(),
        zip_path.display()
    );
    Ok(stats)
}

fn write_tree<W: Write>(
    zip: &mut ZipWriter<W>,
    root: &Path,
    options: &ArchiveOptions,
    tracker: &mut ProgressTracker<'_>,
) -> Result<()> {
    let mut buf = vec![0u8; options.chunk_size.max(1)];

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ZipperError::Read {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: ZipperError::walk_source(e),
        })?;
        let path = entry.path();

        let rel = path.strip_prefix(root).map_err(|e| ZipperError::Read {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let name = entry_name(rel);

        let metadata = entry.metadata().map_err(|e| ZipperError::Read {
            path: path.to_path_buf(),
            source: ZipperError::walk_source(e),
        })?;
        let header = EntryMetadata::from_metadata(&metadata);
        let write_err = |source| ZipperError::Write {
            path: path.to_path_buf(),
            source,
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            tracing::debug!("adding directory {}/", name);
            zip.add_directory(&name, &header).map_err(write_err)?;
            continue;
        }

        tracing::debug!("adding {} ({} bytes)", name, metadata.len());
        let entry_writer = zip
            .start_file(&name, &header, options.method, options.level)
            .map_err(write_err)?;
        let mut sink = ProgressWriter::new(entry_writer, tracker);

        if file_type.is_file() {
            copy_file(path, &mut sink, &mut buf)?;
        } else if file_type.is_symlink() {
            // Info-ZIP convention: the payload is the link target.
            let target = fs::read_link(path).map_err(|source| ZipperError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            sink.write_all(target.as_os_str().as_encoded_bytes())
                .map_err(write_err)?;
        }
        // FIFOs, sockets and devices are recorded without a payload.

        sink.into_inner().finish().map_err(write_err)?;
    }

    Ok(())
}

/// Stream `path` into `sink` one chunk at a time.
fn copy_file<W: Write>(path: &Path, sink: &mut W, buf: &mut [u8]) -> Result<()> {
    let read_err = |source| ZipperError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;

    loop {
        let n = match file.read(buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        sink.write_all(&buf[..n]).map_err(|source| ZipperError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::trace!("wrote {} bytes of {}", n, path.display());
    }
}

/// Finalize the container and flush the file. Both steps always run.
fn close(mut zip: ZipWriter<BufWriter<File>>, zip_path: &Path) -> Result<()> {
    let finished = zip.finish();
    let flushed = zip
        .into_inner()
        .into_inner()
        .map(drop)
        .map_err(|e| e.into_error());

    finished.and(flushed).map_err(|source| ZipperError::Close {
        path: zip_path.to_path_buf(),
        source,
    })
}

/// Entry name for a path relative to the archive root: `/`-separated, lossy UTF-8.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

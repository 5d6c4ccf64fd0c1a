//! ZIP archive writing and reading.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//!   and their little-endian encodings
//! - [`writer`]: Streaming writer producing local headers, data descriptors and the central directory
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Decompression of single entries with size and CRC checks
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The writer never seeks: sizes and CRCs of file entries follow their data
//! in a data descriptor, and the central directory repeats them. ZIP64
//! records are only emitted when a size, offset or entry count overflows the
//! classic fields.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - Only STORED and DEFLATE compression methods

mod extractor;
mod parser;
pub mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::{CompressionMethod, DosDateTime, ZipFileEntry};
pub use writer::{EntryMetadata, EntryWriter, ZipWriter};

use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::{Result, ZipperError};
use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl ZipExtractor<LocalFileReader> {
    /// Open an archive on the local filesystem.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(LocalFileReader::new(path)?))
    }
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Stream the decompressed contents of `entry` into `out`.
    ///
    /// The decompressed length and CRC-32 are checked against the central
    /// directory; a mismatch is reported as [`ZipperError::InvalidArchive`].
    pub fn extract_to<W: Write>(&self, entry: &ZipFileEntry, out: &mut W) -> Result<u64> {
        let data_offset = self.parser.get_data_offset(entry)?;
        let section = Section {
            reader: self.parser.reader(),
            offset: data_offset,
            remaining: entry.compressed_size,
        };

        let mut checked = CrcWriter {
            inner: out,
            crc: Crc::new(),
            written: 0,
        };

        match entry.compression_method {
            CompressionMethod::Stored => {
                let mut section = section;
                io::copy(&mut section, &mut checked)?
            }
            CompressionMethod::Deflate => {
                io::copy(&mut DeflateDecoder::new(section), &mut checked)?
            }
            CompressionMethod::Unknown(id) => {
                return Err(ZipperError::InvalidArchive(format!(
                    "unsupported compression method {} for {}",
                    id, entry.file_name
                )));
            }
        };

        if checked.written != entry.uncompressed_size {
            return Err(ZipperError::InvalidArchive(format!(
                "{}: expected {} bytes, got {}",
                entry.file_name, entry.uncompressed_size, checked.written
            )));
        }
        let crc = checked.crc.sum();
        if crc != entry.crc32 {
            return Err(ZipperError::InvalidArchive(format!(
                "{}: CRC mismatch (expected {:08x}, got {:08x})",
                entry.file_name, entry.crc32, crc
            )));
        }

        Ok(checked.written)
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        self.extract_to(entry, &mut buf)?;
        Ok(buf)
    }
}

/// `Read` over a byte range of a [`ReadAt`] source.
struct Section<'a, R: ReadAt> {
    reader: &'a R,
    offset: u64,
    remaining: u64,
}

impl<R: ReadAt> Read for Section<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let len = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.reader.read_at(self.offset, &mut buf[..len])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "entry data truncated",
            ));
        }
        self.offset += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

struct CrcWriter<'w, W: Write> {
    inner: &'w mut W,
    crc: Crc,
    written: u64,
}

impl<W: Write> Write for CrcWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.crc.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::{DosDateTime, S_IFREG};
    use crate::zip::{EntryMetadata, ZipWriter};

    fn archive_with(contents: &[u8], method: CompressionMethod) -> Vec<u8> {
        let metadata = EntryMetadata {
            modified: DosDateTime::EPOCH,
            mode: S_IFREG | 0o600,
            size: contents.len() as u64,
        };
        let mut writer = ZipWriter::new(Vec::new());
        let mut entry = writer.start_file("file", &metadata, method, 6).unwrap();
        entry.write_all(contents).unwrap();
        entry.finish().unwrap();
        writer.finish().unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_extracts_stored_and_deflated() {
        let contents = b"The quick brown fox jumps over the lazy dog".repeat(50);
        for method in [CompressionMethod::Stored, CompressionMethod::Deflate] {
            let extractor = ZipExtractor::new(archive_with(&contents, method));
            let entries = extractor.list_files().unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(extractor.extract_to_memory(&entries[0]).unwrap(), contents);
        }
    }

    #[test]
    fn test_detects_crc_mismatch() {
        let extractor = ZipExtractor::new(archive_with(b"payload", CompressionMethod::Stored));
        let mut entry = extractor.list_files().unwrap().remove(0);
        entry.crc32 ^= 1;
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(ZipperError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_method() {
        let extractor = ZipExtractor::new(archive_with(b"payload", CompressionMethod::Stored));
        let mut entry = extractor.list_files().unwrap().remove(0);
        entry.compression_method = CompressionMethod::Unknown(14);
        assert!(extractor.extract_to_memory(&entry).is_err());
    }
}

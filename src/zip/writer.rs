//! Streaming ZIP writer.
//!
//! Entries are written front to back without seeking: each file's local
//! header carries zeroed CRC and sizes, the data follows, and a data
//! descriptor with the real values closes the entry. The central directory
//! is buffered in memory (one small record per entry) and written by
//! [`ZipWriter::finish`]. Entries expected to reach 4 GiB announce ZIP64
//! in their local header, since the sizes cannot be patched afterwards.

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::fs;
use std::io::{self, Write};

use super::structures::*;

/// Per-entry metadata copied into the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    pub modified: DosDateTime,
    /// Unix mode including the file type bits.
    pub mode: u32,
    /// Expected payload length. At `0xFFFFFFFF` or more the local header
    /// announces ZIP64 sizes up front.
    pub size: u64,
}

impl EntryMetadata {
    /// Derive header metadata from filesystem metadata (as returned by `lstat`).
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let modified = metadata
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or(DosDateTime::EPOCH);

        let file_type = metadata.file_type();
        let type_bits = if file_type.is_dir() {
            S_IFDIR
        } else if file_type.is_symlink() {
            S_IFLNK
        } else {
            S_IFREG
        };

        Self {
            modified,
            mode: type_bits | permission_bits(metadata),
            size: if file_type.is_dir() { 0 } else { metadata.len() },
        }
    }

    fn external_attrs(&self) -> u32 {
        // Low byte keeps the MS-DOS directory attribute for non-Unix readers.
        let dos = if self.mode & S_IFMT == S_IFDIR { 0x10 } else { 0 };
        (self.mode << 16) | dos
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Tracks the absolute offset of everything written to the archive.
struct CountingWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a ZIP archive to any [`Write`] sink.
pub struct ZipWriter<W: Write> {
    inner: CountingWriter<W>,
    entries: Vec<CentralDirectoryHeader>,
    finished: bool,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: CountingWriter { inner, count: 0 },
            entries: Vec::new(),
            finished: false,
        }
    }

    /// Number of entries whose data has been completely written.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::other("zip archive already finished"));
        }
        Ok(())
    }

    /// Add a directory marker. A trailing `/` is appended when missing.
    pub fn add_directory(&mut self, name: &str, metadata: &EntryMetadata) -> io::Result<()> {
        self.ensure_open()?;

        let mut file_name = name.to_string();
        if !file_name.ends_with('/') {
            file_name.push('/');
        }

        let lfh_offset = self.inner.count;
        LocalFileHeader {
            zip64: false,
            version_needed: VERSION_DEFAULT,
            flags: FLAG_UTF8,
            compression_method: CompressionMethod::Stored,
            modified: metadata.modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: &file_name,
        }
        .write_to(&mut self.inner)?;

        self.entries.push(CentralDirectoryHeader {
            file_name,
            flags: FLAG_UTF8,
            compression_method: CompressionMethod::Stored,
            modified: metadata.modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            external_attrs: metadata.external_attrs(),
            lfh_offset,
        });
        Ok(())
    }

    /// Start a file entry and return a writer for its contents.
    ///
    /// The entry only becomes part of the archive once
    /// [`EntryWriter::finish`] succeeds.
    pub fn start_file(
        &mut self,
        name: &str,
        metadata: &EntryMetadata,
        method: CompressionMethod,
        level: u32,
    ) -> io::Result<EntryWriter<'_, W>> {
        self.ensure_open()?;
        if let CompressionMethod::Unknown(id) = method {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported compression method: {}", id),
            ));
        }

        let flags = FLAG_DATA_DESCRIPTOR | FLAG_UTF8;
        let zip64 = metadata.size >= U32_MAX;
        let lfh_offset = self.inner.count;
        LocalFileHeader {
            zip64,
            version_needed: if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT },
            flags,
            compression_method: method,
            modified: metadata.modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: name,
        }
        .write_to(&mut self.inner)?;

        let data_start = self.inner.count;
        let sink = match method {
            CompressionMethod::Deflate => EntrySink::Deflate(DeflateEncoder::new(
                &mut self.inner,
                Compression::new(level.min(9)),
            )),
            _ => EntrySink::Stored(&mut self.inner),
        };

        Ok(EntryWriter {
            sink,
            entries: &mut self.entries,
            header: CentralDirectoryHeader {
                file_name: name.to_string(),
                flags,
                compression_method: method,
                modified: metadata.modified,
                crc32: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                external_attrs: metadata.external_attrs(),
                lfh_offset,
            },
            crc: Crc::new(),
            uncompressed: 0,
            data_start,
            zip64,
        })
    }

    /// Write the central directory and end records, then flush.
    pub fn finish(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.finished = true;

        let cd_offset = self.inner.count;
        for entry in &self.entries {
            entry.write_to(&mut self.inner)?;
        }
        let cd_size = self.inner.count - cd_offset;
        let entries = self.entries.len() as u64;

        if entries >= U16_MAX || cd_size >= U32_MAX || cd_offset >= U32_MAX {
            let eocd64_offset = self.inner.count;
            Zip64EOCD::new(entries, cd_size, cd_offset).write_to(&mut self.inner)?;
            Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            }
            .write_to(&mut self.inner)?;
        }
        EndOfCentralDirectory::new(entries, cd_size, cd_offset).write_to(&mut self.inner)?;

        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner.inner
    }
}

enum EntrySink<'a, W: Write> {
    Stored(&'a mut CountingWriter<W>),
    Deflate(DeflateEncoder<&'a mut CountingWriter<W>>),
}

/// Writer for the contents of one file entry.
pub struct EntryWriter<'a, W: Write> {
    sink: EntrySink<'a, W>,
    entries: &'a mut Vec<CentralDirectoryHeader>,
    header: CentralDirectoryHeader,
    crc: Crc,
    uncompressed: u64,
    data_start: u64,
    zip64: bool,
}

impl<W: Write> EntryWriter<'_, W> {
    /// Flush the compressor, write the data descriptor and register the entry.
    pub fn finish(self) -> io::Result<()> {
        let EntryWriter {
            sink,
            entries,
            mut header,
            crc,
            uncompressed,
            data_start,
            zip64,
        } = self;

        let inner = match sink {
            EntrySink::Stored(inner) => inner,
            EntrySink::Deflate(encoder) => encoder.finish()?,
        };

        header.crc32 = crc.sum();
        header.uncompressed_size = uncompressed;
        header.compressed_size = inner.count - data_start;

        DataDescriptor {
            zip64,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
        }
        .write_to(inner)?;

        entries.push(header);
        Ok(())
    }
}

impl<W: Write> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.sink {
            EntrySink::Stored(inner) => inner.write(buf)?,
            EntrySink::Deflate(encoder) => encoder.write(buf)?,
        };
        self.crc.update(&buf[..n]);
        self.uncompressed += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            EntrySink::Stored(inner) => inner.flush(),
            EntrySink::Deflate(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipParser;

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            modified: DosDateTime::from_parts(2024, 5, 17, 10, 30, 0),
            mode: S_IFREG | 0o644,
            size: 0,
        }
    }

    #[test]
    fn test_empty_archive_is_just_an_end_record() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(&bytes[..4], EndOfCentralDirectory::SIGNATURE);
    }

    #[test]
    fn test_entries_are_listed_in_order() {
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_directory(
                "docs",
                &EntryMetadata {
                    mode: S_IFDIR | 0o755,
                    ..metadata()
                },
            )
            .unwrap();

        let mut entry = writer
            .start_file("docs/readme.txt", &metadata(), CompressionMethod::Deflate, 6)
            .unwrap();
        entry.write_all(&b"abc".repeat(1000)).unwrap();
        entry.finish().unwrap();

        let mut entry = writer
            .start_file("raw.bin", &metadata(), CompressionMethod::Stored, 0)
            .unwrap();
        entry.write_all(b"stored").unwrap();
        entry.finish().unwrap();

        assert_eq!(writer.entry_count(), 3);
        writer.finish().unwrap();
        let bytes = writer.into_inner();

        let entries = ZipParser::from_bytes(bytes).list_files().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["docs/", "docs/readme.txt", "raw.bin"]);

        assert!(entries[0].is_directory);
        assert_eq!(entries[0].unix_mode(), S_IFDIR | 0o755);
        assert_eq!(entries[1].compression_method, CompressionMethod::Deflate);
        assert_eq!(entries[1].uncompressed_size, 3000);
        assert!(entries[1].compressed_size < 3000);
        assert_eq!(entries[2].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[2].compressed_size, 6);
        assert_eq!(entries[2].mod_date(), (2024, 5, 17));
        assert_eq!(entries[2].mod_time(), (10, 30, 0));
    }

    #[test]
    fn test_crc_matches_reference_value() {
        let mut writer = ZipWriter::new(Vec::new());
        let mut entry = writer
            .start_file("hello.txt", &metadata(), CompressionMethod::Stored, 0)
            .unwrap();
        entry.write_all(b"hello").unwrap();
        entry.finish().unwrap();
        writer.finish().unwrap();

        let entries = ZipParser::from_bytes(writer.into_inner()).list_files().unwrap();
        assert_eq!(entries[0].crc32, 0x3610_A686);
    }

    #[test]
    fn test_large_entry_announces_zip64_sizes() {
        let mut writer = ZipWriter::new(Vec::new());
        let big = EntryMetadata {
            size: U32_MAX,
            ..metadata()
        };
        let mut entry = writer
            .start_file("big.bin", &big, CompressionMethod::Stored, 0)
            .unwrap();
        entry.write_all(b"hello").unwrap();
        entry.finish().unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner();

        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), VERSION_ZIP64);
        assert_eq!(&bytes[18..26], &[0xFF; 8]);
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 20);

        // Descriptor follows the data and uses 8-byte sizes.
        let descriptor = 30 + "big.bin".len() + 20 + 5;
        assert_eq!(&bytes[descriptor..descriptor + 4], DataDescriptor::SIGNATURE);
        assert_eq!(&bytes[descriptor + 8..descriptor + 16], &5u64.to_le_bytes());
        assert_eq!(&bytes[descriptor + 24..descriptor + 28], CDFH_SIGNATURE);

        let extractor = crate::zip::ZipExtractor::new(bytes);
        let entries = extractor.list_files().unwrap();
        assert_eq!(entries[0].uncompressed_size, 5);
        assert_eq!(extractor.extract_to_memory(&entries[0]).unwrap(), b"hello");
    }

    #[test]
    fn test_unfinished_entry_is_not_listed() {
        let mut writer = ZipWriter::new(Vec::new());
        {
            let mut entry = writer
                .start_file("partial.txt", &metadata(), CompressionMethod::Deflate, 6)
                .unwrap();
            entry.write_all(b"abandoned").unwrap();
        }
        assert_eq!(writer.entry_count(), 0);
        writer.finish().unwrap();
        let entries = ZipParser::from_bytes(writer.into_inner()).list_files().unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_finish_twice_fails() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.finish().unwrap();
        assert!(writer.finish().is_err());
        assert!(writer.add_directory("late", &metadata()).is_err());
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let mut writer = ZipWriter::new(Vec::new());
        let result = writer.start_file("x", &metadata(), CompressionMethod::Unknown(12), 0);
        assert!(result.is_err());
    }
}

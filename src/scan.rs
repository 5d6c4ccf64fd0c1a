//! Pre-pass over the source tree that yields the progress denominator.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, ZipperError};

/// Totals gathered by [`scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Sum of the sizes of every non-directory entry.
    pub total_bytes: u64,
    /// Number of non-directory entries.
    pub file_count: u64,
}

/// Walk the tree rooted at `root` and sum the size of every non-directory entry.
///
/// Symbolic links are not followed; their size is whatever `lstat` reports.
/// The first error aborts the walk and no partial totals are returned.
pub fn scan(root: &Path) -> Result<ArchiveStats> {
    let mut stats = ArchiveStats::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ZipperError::Scan {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: ZipperError::walk_source(e),
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| ZipperError::Scan {
            path: entry.path().to_path_buf(),
            source: ZipperError::walk_source(e),
        })?;
        stats.total_bytes += metadata.len();
        stats.file_count += 1;
    }

    tracing::debug!(
        "scanned {}: {} bytes in {} files",
        root.display(),
        stats.total_bytes,
        stats.file_count
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_counts_files_not_directories() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("nested/b.txt"), "world!").unwrap();
        fs::write(root.join("nested/deeper/empty"), "").unwrap();

        let stats = scan(root).unwrap();
        assert_eq!(
            stats,
            ArchiveStats {
                total_bytes: 11,
                file_count: 3
            }
        );
    }

    #[test]
    fn test_scan_empty_directory() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("only-dir")).unwrap();
        assert_eq!(scan(tmp.path()).unwrap(), ArchiveStats::default());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("data.bin"), vec![7u8; 4096]).unwrap();
        let first = scan(tmp.path()).unwrap();
        let second = scan(tmp.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_bytes, 4096);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = scan(&missing).unwrap_err();
        match err {
            ZipperError::Scan { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_uses_link_size_for_symlinks() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("target.txt"), vec![1u8; 100]).unwrap();
        std::os::unix::fs::symlink("target.txt", tmp.path().join("link")).unwrap();

        let stats = scan(tmp.path()).unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 100 + "target.txt".len() as u64);
    }
}

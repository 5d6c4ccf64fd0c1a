//! Picking a free output file name.
//!
//! Archives are named after the folder they contain. When `project.zip`
//! already exists the next candidates are `project-v1.zip`, `project-v2.zip`
//! and so on; the lowest free version always wins and existing files are
//! never reused.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, ZipperError};

/// Upper bound on the number of versions probed before giving up.
pub const DEFAULT_MAX_VERSIONS: u32 = 10_000;

/// File name conventions understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    /// Name generation only; no tar writer exists.
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// File name for the given version; version 0 carries no suffix.
    pub fn file_name(&self, base: &str, version: u32) -> String {
        if version == 0 {
            format!("{}.{}", base, self.extension())
        } else {
            format!("{}-v{}.{}", base, version, self.extension())
        }
    }
}

/// Find the first free archive path for `base` inside `dir`.
///
/// An empty `dir` means the current directory.
pub fn next_archive_name(dir: &Path, base: &str, format: ArchiveFormat) -> Result<PathBuf> {
    next_archive_name_within(dir, base, format, DEFAULT_MAX_VERSIONS)
}

/// Like [`next_archive_name`] but probes at most `max_versions` candidates.
///
/// # Errors
///
/// - [`ZipperError::PathResolution`] when a probe fails with anything other
///   than "not found".
/// - [`ZipperError::ProbeLimitExceeded`] when every candidate exists.
pub fn next_archive_name_within(
    dir: &Path,
    base: &str,
    format: ArchiveFormat,
    max_versions: u32,
) -> Result<PathBuf> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    for version in 0..max_versions {
        let candidate = dir.join(format.file_name(base, version));
        // A dangling symlink still counts as taken.
        match fs::symlink_metadata(&candidate) {
            Ok(_) => {
                tracing::trace!("{} exists, trying next version", candidate.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("resolved archive name {}", candidate.display());
                return Ok(candidate);
            }
            Err(source) => {
                return Err(ZipperError::PathResolution {
                    path: candidate,
                    source,
                });
            }
        }
    }

    Err(ZipperError::ProbeLimitExceeded {
        dir: dir.to_path_buf(),
        base: base.to_string(),
        limit: max_versions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_versions_increase_monotonically() {
        let tmp = tempdir().unwrap();

        let path0 = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path0), "project.zip");
        assert_eq!(path0.parent().unwrap(), tmp.path());
        fs::write(&path0, b"test").unwrap();

        let path1 = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path1), "project-v1.zip");
        fs::write(&path1, b"test").unwrap();

        let path2 = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path2), "project-v2.zip");
    }

    #[test]
    fn test_lowest_free_version_is_chosen() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("project.zip"), b"").unwrap();
        fs::write(tmp.path().join("project-v2.zip"), b"").unwrap();

        let path = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path), "project-v1.zip");
    }

    #[test]
    fn test_tar_gz_naming() {
        let tmp = tempdir().unwrap();
        let path = next_archive_name(tmp.path(), "project", ArchiveFormat::TarGz).unwrap();
        assert_eq!(file_name(&path), "project.tar.gz");
        fs::write(&path, b"").unwrap();

        let path = next_archive_name(tmp.path(), "project", ArchiveFormat::TarGz).unwrap();
        assert_eq!(file_name(&path), "project-v1.tar.gz");
    }

    #[test]
    fn test_formats_do_not_collide() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("project.tar.gz"), b"").unwrap();

        let path = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path), "project.zip");
    }

    #[test]
    fn test_empty_dir_means_current_directory() {
        let path = next_archive_name_within(
            Path::new(""),
            "pzip-naming-test-unlikely-name",
            ArchiveFormat::Zip,
            1,
        )
        .unwrap();
        assert_eq!(
            path,
            Path::new(".").join("pzip-naming-test-unlikely-name.zip")
        );
    }

    #[test]
    fn test_probe_limit() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("project.zip"), b"").unwrap();
        fs::write(tmp.path().join("project-v1.zip"), b"").unwrap();

        let err = next_archive_name_within(tmp.path(), "project", ArchiveFormat::Zip, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            ZipperError::ProbeLimitExceeded { limit: 2, .. }
        ));

        let path =
            next_archive_name_within(tmp.path(), "project", ArchiveFormat::Zip, 3).unwrap();
        assert_eq!(file_name(&path), "project-v2.zip");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_counts_as_taken() {
        let tmp = tempdir().unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("missing-target"),
            tmp.path().join("project.zip"),
        )
        .unwrap();

        let path = next_archive_name(tmp.path(), "project", ArchiveFormat::Zip).unwrap();
        assert_eq!(file_name(&path), "project-v1.zip");
    }

    #[test]
    fn test_probe_error_is_surfaced() {
        let tmp = tempdir().unwrap();
        // A regular file used as a directory makes the probe fail with
        // NotADirectory rather than NotFound.
        let not_a_dir = tmp.path().join("plain");
        fs::write(&not_a_dir, b"").unwrap();

        let err = next_archive_name(&not_a_dir, "project", ArchiveFormat::Zip).unwrap_err();
        assert!(matches!(err, ZipperError::PathResolution { .. }));
    }
}

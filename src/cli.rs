use clap::Parser;
use std::path::PathBuf;

use crate::archiver::{ArchiveOptions, DEFAULT_CHUNK_SIZE, DEFAULT_LEVEL};
use crate::naming::DEFAULT_MAX_VERSIONS;
use crate::zip::CompressionMethod;

#[derive(Parser, Debug)]
#[command(name = "pzip")]
#[command(version)]
#[command(about = "Create a zip archive of the specified folder in the same parent directory", long_about = None)]
#[command(after_help = "Examples:\n  \
  pzip my-project              creates ../my-project.zip (or my-project-v1.zip, ...)\n  \
  pzip -d /backups photos      writes the archive into /backups\n  \
  pzip --store --verify media  store without compression, then check the result")]
pub struct Cli {
    /// Folder to archive; several words are joined with spaces
    #[arg(value_name = "FOLDER", required = true, num_args = 1..)]
    pub folder: Vec<String>,

    /// Directory to write the archive into (default: the folder's parent)
    #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Deflate compression level
    #[arg(
        short = 'l',
        long,
        env = "PZIP_LEVEL",
        default_value_t = DEFAULT_LEVEL,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    pub level: u32,

    /// Store files without compression
    #[arg(long)]
    pub store: bool,

    /// Give up after this many candidate names already exist
    #[arg(
        long,
        env = "PZIP_MAX_VERSIONS",
        default_value_t = DEFAULT_MAX_VERSIONS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_versions: u32,

    /// Re-read the archive after writing and check every entry
    #[arg(long)]
    pub verify: bool,

    /// No progress bar or summary; only print the archive path
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The folder argument with its words joined back together.
    pub fn target(&self) -> String {
        self.folder.join(" ")
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            method: if self.store {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflate
            },
            level: self.level,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_words_are_joined() {
        let cli = Cli::try_parse_from(["pzip", "My", "Project"]).unwrap();
        assert_eq!(cli.target(), "My Project");
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pzip", "dir"]).unwrap();
        assert_eq!(cli.archive_options(), ArchiveOptions::default());
        assert!(!cli.verify && !cli.quiet);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_store_and_verbosity() {
        let cli = Cli::try_parse_from(["pzip", "--store", "-vv", "-l", "9", "dir"]).unwrap();
        assert_eq!(cli.archive_options().method, CompressionMethod::Stored);
        assert_eq!(cli.level, 9);
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn test_rejects_bad_level_and_missing_folder() {
        assert!(Cli::try_parse_from(["pzip", "-l", "12", "dir"]).is_err());
        assert!(Cli::try_parse_from(["pzip"]).is_err());
        assert!(Cli::try_parse_from(["pzip", "--max-versions", "0", "dir"]).is_err());
    }
}

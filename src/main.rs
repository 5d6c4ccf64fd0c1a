//! Main entry point for the pzip CLI application.
//!
//! This binary archives one folder into a zip file placed next to it (or in
//! `--output-dir`), picking `name.zip`, `name-v1.zip`, ... so existing
//! archives are never overwritten. The archive path is the only thing written
//! to stdout; progress, summaries and errors go to stderr.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use pzip::{
    ArchiveFormat, ArchiveStats, Cli, archive_with_options, format_bytes,
    next_archive_name_within, percent_complete, verify_archive,
};

/// Runtime failure while naming, archiving or verifying.
const EXIT_FAILURE: u8 = 1;
/// Invalid invocation; clap uses the same code for argument errors.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let source = match resolve_source(&cli.target()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("pzip: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&cli, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("archiving failed: {:?}", e);
            eprintln!("pzip: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Make the target absolute and make sure it is a directory.
fn resolve_source(target: &str) -> Result<PathBuf> {
    let mut source = std::path::absolute(target)
        .with_context(|| format!("cannot resolve path '{}'", target))?;
    // `..` and similar endings have no file name to derive the archive name from.
    if source.file_name().is_none() {
        source = source
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", target))?;
    }

    let metadata =
        fs::metadata(&source).with_context(|| format!("cannot access {}", source.display()))?;
    if !metadata.is_dir() {
        bail!("target must be a directory: {}", source.display());
    }
    Ok(source)
}

fn run(cli: &Cli, source: &Path) -> Result<()> {
    let base = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("cannot archive the filesystem root")?;
    let out_dir = match &cli.output_dir {
        Some(dir) => dir.clone(),
        None => source.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };

    let zip_path = next_archive_name_within(&out_dir, &base, ArchiveFormat::Zip, cli.max_versions)
        .context("cannot choose an archive name")?;
    tracing::info!("archiving {} into {}", source.display(), zip_path.display());

    let mut printer = ProgressPrinter::new(source, cli.quiet);
    let mut on_progress = |done: u64, total: u64| printer.on_progress(done, total);
    let result = archive_with_options(
        source,
        &zip_path,
        &cli.archive_options(),
        Some(&mut on_progress),
    );

    let stats = match result {
        Ok(stats) => stats,
        Err(failure) => {
            printer.abandon();
            tracing::debug!(
                "failed after scanning {} bytes in {} files",
                failure.stats.total_bytes,
                failure.stats.file_count
            );
            return Err(anyhow::Error::new(failure.error)
                .context(format!("cannot archive {}", source.display())));
        }
    };

    if cli.verify {
        let report = verify_archive(&zip_path)
            .with_context(|| format!("verification of {} failed", zip_path.display()))?;
        if report.files != stats.file_count || report.bytes != stats.total_bytes {
            bail!(
                "verification of {} failed: expected {} files ({} bytes), found {} files ({} bytes)",
                zip_path.display(),
                stats.file_count,
                stats.total_bytes,
                report.files,
                report.bytes
            );
        }
        tracing::info!("verified {} entries", report.entries);
    }

    printer.complete(&zip_path, &stats);
    println!("{}", zip_path.display());
    Ok(())
}

/// Terminal presentation of the engine's progress callbacks.
struct ProgressPrinter {
    source: PathBuf,
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ProgressPrinter {
    fn new(source: &Path, quiet: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            quiet,
            bar: None,
        }
    }

    fn on_progress(&mut self, done: u64, total: u64) {
        if self.quiet {
            return;
        }

        let source = &self.source;
        let bar = self.bar.get_or_insert_with(|| {
            eprintln!(
                "Creating archive for {} ({})...",
                source.display(),
                format_bytes(total)
            );
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{bar:50}] {msg} ({binary_bytes}/{binary_total_bytes}) {binary_bytes_per_sec}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#-"),
            );
            bar
        });

        bar.set_position(done);
        bar.set_message(format!("{:3.0}%", percent_complete(done, total)));
    }

    fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }

    fn complete(&self, zip_path: &Path, stats: &ArchiveStats) {
        if self.quiet {
            return;
        }
        if let Some(bar) = &self.bar {
            bar.finish();
        }

        if stats.file_count == 0 {
            eprintln!("No files to archive; created empty zip.");
            return;
        }

        let zip_size = fs::metadata(zip_path).map(|m| m.len()).unwrap_or(0);
        eprintln!(
            "✓ Archive complete: {} -> {} ({} source, {} archive, {} files)",
            self.source.display(),
            zip_path.display(),
            format_bytes(stats.total_bytes),
            format_bytes(zip_size),
            stats.file_count
        );
    }
}

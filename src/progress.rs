//! Byte-level progress accounting.
//!
//! [`ProgressTracker`] owns the running `bytes_done` counter for one archive
//! operation. [`ProgressWriter`] is a decorator stream that borrows the tracker
//! exclusively while a single file is copied and advances it after every
//! chunk it forwards.

use std::io::{self, Write};

/// Running byte counter plus the optional `(bytes_done, bytes_total)` callback
/// it notifies.
pub struct ProgressTracker<'a> {
    bytes_done: u64,
    bytes_total: u64,
    callback: Option<&'a mut dyn FnMut(u64, u64)>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(bytes_total: u64, callback: Option<&'a mut dyn FnMut(u64, u64)>) -> Self {
        Self {
            bytes_done: 0,
            bytes_total,
            callback,
        }
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    /// Invoke the callback with the current state, if there is one.
    pub fn notify(&mut self) {
        if let Some(callback) = self.callback.as_mut() {
            callback(self.bytes_done, self.bytes_total);
        }
    }

    /// Count `n` more bytes and notify.
    pub fn advance(&mut self, n: u64) {
        self.bytes_done = self.bytes_done.saturating_add(n);
        self.notify();
    }
}

/// Writer decorator that reports every successful write to a [`ProgressTracker`].
pub struct ProgressWriter<'t, 'a, W: Write> {
    inner: W,
    tracker: &'t mut ProgressTracker<'a>,
}

impl<'t, 'a, W: Write> ProgressWriter<'t, 'a, W> {
    pub fn new(inner: W, tracker: &'t mut ProgressTracker<'a>) -> Self {
        Self { inner, tracker }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<'_, '_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if n > 0 {
            self.tracker.advance(n as u64);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Completion percentage clamped to `[0, 100]`; an empty total counts as done.
pub fn percent_complete(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Format a byte count with 1024-based units, e.g. `512 B` or `1.5 KB`.
pub fn format_bytes(n: u64) -> String {
    const UNIT: u64 = 1024;
    const SUFFIXES: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if n < UNIT {
        return format!("{} B", n);
    }

    let mut div = UNIT;
    let mut exp = 0;
    while n / div >= UNIT && exp < SUFFIXES.len() - 1 {
        div *= UNIT;
        exp += 1;
    }
    format!("{:.1} {}", n as f64 / div as f64, SUFFIXES[exp])
}

#![forbid(unsafe_code)]

//! JSONL evidence of dangling subscriptions.
//!
//! When a callback runs against an owner that has already been torn down, the
//! owner cannot undo the work, but it can leave a record. [`LeakSink`] writes
//! one JSON object per line to a single destination so that test runs and
//! demo sessions can be compared after the fact. Writes are serialized behind
//! a mutex, so line order matches call order.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// What kind of misbehaviour a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakKind {
    /// The owner was destroyed while a subscription was still live.
    LiveAtDestroy,
    /// A value was delivered to an owner that no longer exists.
    PostDestroyDelivery,
    /// A stop request could not stop anything because the handle was lost.
    StopWithoutHandle,
}

/// One line of leak evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakRecord {
    /// Owner that leaked (view name).
    pub owner: String,
    /// Classification.
    pub kind: LeakKind,
    /// Virtual time of the event in milliseconds.
    pub at_ms: u64,
    /// Free-form detail, e.g. the tick number or the user id.
    pub detail: String,
}

impl LeakRecord {
    /// Build a record.
    #[must_use]
    pub fn new(owner: impl Into<String>, kind: LeakKind, at_ms: u64, detail: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            kind,
            at_ms,
            detail: detail.into(),
        }
    }
}

/// Destination for leak JSONL output.
#[derive(Debug, Clone)]
pub enum LeakSinkDestination {
    /// Write to stdout.
    Stdout,
    /// Write to stderr.
    Stderr,
    /// Append to a file at the given path.
    File(PathBuf),
}

impl LeakSinkDestination {
    /// Convenience helper for file destinations.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Parse a CLI value: `-` means stderr, `stdout` means stdout, anything
    /// else is a file path.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "-" | "stderr" => Self::Stderr,
            "stdout" => Self::Stdout,
            path => Self::file(path),
        }
    }
}

/// Where and how a [`LeakSink`] writes.
///
/// A file destination is truncated when the sink opens, so one file holds
/// the evidence of one run. Use [`appending`](Self::appending) to collect
/// several runs in the same file.
#[derive(Debug, Clone)]
pub struct LeakSinkConfig {
    pub destination: LeakSinkDestination,
    /// Keep earlier records in a file destination.
    pub append: bool,
    /// Flush after every line instead of only on [`LeakSink::flush`].
    pub flush_on_write: bool,
}

impl LeakSinkConfig {
    #[must_use]
    pub fn new(destination: LeakSinkDestination) -> Self {
        Self {
            destination,
            append: false,
            flush_on_write: true,
        }
    }

    #[must_use]
    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    /// Buffer lines until the sink is flushed or dropped.
    #[must_use]
    pub fn buffered(mut self) -> Self {
        self.flush_on_write = false;
        self
    }
}

struct LeakSinkInner {
    writer: BufWriter<Box<dyn Write + Send>>,
    flush_on_write: bool,
    written: u64,
}

/// Shared JSONL writer for [`LeakRecord`]s.
#[derive(Clone)]
pub struct LeakSink {
    inner: Arc<Mutex<LeakSinkInner>>,
}

impl std::fmt::Debug for LeakSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakSink")
            .field("written", &self.written())
            .finish_non_exhaustive()
    }
}

impl LeakSink {
    /// Open the configured destination.
    pub fn open(config: &LeakSinkConfig) -> io::Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.destination {
            LeakSinkDestination::Stdout => Box::new(io::stdout()),
            LeakSinkDestination::Stderr => Box::new(io::stderr()),
            LeakSinkDestination::File(path) => {
                let mut options = OpenOptions::new();
                options.create(true);
                if config.append {
                    options.append(true);
                } else {
                    options.write(true).truncate(true);
                }
                Box::new(options.open(path)?)
            }
        };
        Ok(Self::from_writer(writer, config.flush_on_write))
    }

    /// Build a sink over an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>, flush_on_write: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LeakSinkInner {
                writer: BufWriter::new(writer),
                flush_on_write,
                written: 0,
            })),
        }
    }

    /// Serialize `record` as one JSONL line.
    pub fn record(&self, record: &LeakRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        if inner.flush_on_write {
            inner.writer.flush()?;
        }
        inner.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).written
    }

    /// Flush any buffered output.
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writer.flush()
    }
}

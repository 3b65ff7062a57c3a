// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only log of per-file failures

use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// Sink for `(timestamp, filename, message)` failure records
pub trait ErrorLog: Send + Sync {
    fn append(&self, timestamp: DateTime<Local>, filename: &str, message: &str) -> Result<()>;
}

/// Writes one line per failure to a text file
pub struct FileErrorLog {
    path: PathBuf,
}

impl FileErrorLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ErrorLog for FileErrorLog {
    fn append(&self, timestamp: DateTime<Local>, filename: &str, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{}", format_line(timestamp, filename, message))?;
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullErrorLog;

impl ErrorLog for NullErrorLog {
    fn append(&self, _timestamp: DateTime<Local>, _filename: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn format_line(timestamp: DateTime<Local>, filename: &str, message: &str) -> String {
    let message = message.replace(['\n', '\r'], " ");
    format!(
        "{}: Error processing {}: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
        filename,
        message
    )
}

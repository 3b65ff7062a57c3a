// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch organizer: classify every image in a folder and move it into its
//! category folder.
//!
//! Files are handled one at a time in directory-listing order. A failure on
//! one file is counted and logged, never fatal; only an unreadable source
//! folder or an uncreatable destination root aborts a run, and both are
//! detected before any file is touched.

use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::allocator::{move_file, parse_sequence_number, PathAllocator};
use crate::classifiers::{ClassifierRegistry, ImageDecoder};
use crate::config::RunConfig;
use crate::error::MoveError;
use crate::error_log::ErrorLog;
use crate::reporter::RunReporter;
use crate::{ImgsortError, Result};

/// Shared flag used to stop a run between files
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizerState {
    Idle,
    Running,
}

/// A file that was moved into its category folder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizedFile {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub category: String,
    pub sequence_number: u64,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub processed: usize,
    pub errors: usize,
    pub categories: BTreeMap<String, usize>,
}

impl RunStatistics {
    fn record(&mut self, category: &str) {
        self.processed += 1;
        *self.categories.entry(category.to_string()).or_insert(0) += 1;
    }

    /// `Cat(2), Dog(1)`
    pub fn categories_line(&self) -> String {
        if self.categories.is_empty() {
            return "none".to_string();
        }
        self.categories
            .iter()
            .map(|(name, count)| format!("{}({})", name, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn completed_summary(&self, destination_root: &Path) -> String {
        format!(
            "Organization complete!\n{}\nImages saved in: {}",
            self.counts(),
            destination_root.display()
        )
    }

    pub fn cancelled_summary(&self) -> String {
        format!("Processing cancelled\n{}", self.counts())
    }

    fn counts(&self) -> String {
        format!(
            "Processed: {} images\nErrors: {}\nCategories found: {}",
            self.processed,
            self.errors,
            self.categories_line()
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        stats: RunStatistics,
        destination_root: PathBuf,
        files: Vec<OrganizedFile>,
    },
    Cancelled {
        stats: RunStatistics,
        files: Vec<OrganizedFile>,
    },
    /// The source folder held no eligible images; nothing was created
    NoImagesFound,
}

impl RunOutcome {
    pub fn stats(&self) -> RunStatistics {
        match self {
            Self::Completed { stats, .. } | Self::Cancelled { stats, .. } => stats.clone(),
            Self::NoImagesFound => RunStatistics::default(),
        }
    }

    pub fn files(&self) -> &[OrganizedFile] {
        match self {
            Self::Completed { files, .. } | Self::Cancelled { files, .. } => files,
            Self::NoImagesFound => &[],
        }
    }
}

/// Regular files in `source` whose name ends in `.<ext>` for an allowed
/// extension (case-insensitive), in listing order
pub fn list_eligible_images(source: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let eligible = extensions
            .iter()
            .any(|allowed| name.ends_with(&format!(".{}", allowed.to_lowercase())));
        if eligible {
            images.push(path);
        }
    }
    Ok(images)
}

/// Resets the organizer to idle when a run ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs classify-and-move passes over a source folder
pub struct Organizer {
    classifiers: ClassifierRegistry,
    decoder: Box<dyn ImageDecoder>,
    error_log: Box<dyn ErrorLog>,
    cancel: CancellationToken,
    running: AtomicBool,
}

impl Organizer {
    pub fn new(
        classifiers: ClassifierRegistry,
        decoder: Box<dyn ImageDecoder>,
        error_log: Box<dyn ErrorLog>,
    ) -> Self {
        Self {
            classifiers,
            decoder,
            error_log,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Token that stops the current run at the next file boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> OrganizerState {
        if self.running.load(Ordering::SeqCst) {
            OrganizerState::Running
        } else {
            OrganizerState::Idle
        }
    }

    /// Organize every eligible image in `config.source_folder`.
    ///
    /// Per-file failures end up in the statistics and the error log. An
    /// `Err` means the run never started or could not set up its folders.
    pub async fn run(&self, config: &RunConfig, reporter: &dyn RunReporter) -> Result<RunOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ImgsortError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);
        self.cancel.reset();

        let span = info_span!("run", id = %uuid::Uuid::new_v4());
        self.run_inner(config, reporter).instrument(span).await
    }

    async fn run_inner(&self, config: &RunConfig, reporter: &dyn RunReporter) -> Result<RunOutcome> {
        let images = list_eligible_images(&config.source_folder, &config.extensions).map_err(|e| {
            ImgsortError::Setup(format!(
                "Cannot read source folder {}: {}",
                config.source_folder.display(),
                e
            ))
        })?;

        if images.is_empty() {
            info!("No images found in {:?}", config.source_folder);
            reporter.on_no_images_found();
            return Ok(RunOutcome::NoImagesFound);
        }

        fs::create_dir_all(&config.destination_root).map_err(|e| {
            ImgsortError::Setup(format!(
                "Cannot create destination {}: {}",
                config.destination_root.display(),
                e
            ))
        })?;

        let total = images.len();
        info!("Organizing {} images into {:?}", total, config.destination_root);
        reporter.on_run_started(total, &config.destination_root);

        let mut allocator = PathAllocator::new(config.label_transform);
        let mut stats = RunStatistics::default();
        let mut files = Vec::new();

        for (index, path) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Run cancelled after {} of {} images", index, total);
                reporter.on_run_cancelled(&stats);
                return Ok(RunOutcome::Cancelled { stats, files });
            }

            match self.process_file(path, config, &mut allocator, reporter).await {
                Ok(organized) => {
                    info!("{:?} -> {:?}", path, organized.destination_path);
                    stats.record(&organized.category);
                    files.push(organized);
                    reporter.on_progress(index + 1, total);
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!("Failed to organize {:?}: {}", path, e);
                    self.log_failure(path, &e);
                }
            }
        }

        info!(
            "Run complete: {} processed, {} errors",
            stats.processed, stats.errors
        );
        reporter.on_run_complete(&stats, &config.destination_root);
        Ok(RunOutcome::Completed {
            stats,
            destination_root: config.destination_root.clone(),
            files,
        })
    }

    /// Decode, classify, allocate and move a single file
    async fn process_file(
        &self,
        path: &Path,
        config: &RunConfig,
        allocator: &mut PathAllocator,
        reporter: &dyn RunReporter,
    ) -> Result<OrganizedFile> {
        let image = self.decoder.open(path)?;
        let result = self.classifiers.classify(&image).await;
        debug!(
            "{:?}: {} ({:.0}%, {} votes)",
            path,
            result.label,
            result.confidence * 100.0,
            result.votes_cast
        );
        reporter.on_preview(&image, &result.label, result.confidence);
        drop(image);

        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let category = allocator.category_for(&result.label);
        let destination = allocator
            .allocate(&config.destination_root, &result.label, &original_name)
            .map_err(|e| MoveError {
                source_path: path.to_path_buf(),
                destination: config.destination_root.join(&category),
                reason: e.to_string(),
            })?;

        move_file(path, &destination)?;

        let sequence_number = destination
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_sequence_number(n, &category))
            .unwrap_or_default();

        Ok(OrganizedFile {
            source_path: path.to_path_buf(),
            destination_path: destination,
            category,
            sequence_number,
        })
    }

    fn log_failure(&self, path: &Path, error: &ImgsortError) {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if let Err(e) = self.error_log.append(Local::now(), &filename, &error.to_string()) {
            warn!("Failed to write error log: {}", e);
        }
    }
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Run progress reporting

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::classifiers::DecodedImage;
use crate::organizer::RunStatistics;
use crate::voter::ConfidenceLevel;

/// Receives events from an organize run.
///
/// Called from the worker between files; implementations must not block.
/// All methods default to no-ops.
pub trait RunReporter: Send + Sync {
    fn on_run_started(&self, _total: usize, _destination_root: &Path) {}
    fn on_progress(&self, _done: usize, _total: usize) {}
    fn on_preview(&self, _image: &DecodedImage, _label: &str, _confidence: f64) {}
    fn on_run_complete(&self, _stats: &RunStatistics, _destination_root: &Path) {}
    fn on_run_cancelled(&self, _stats: &RunStatistics) {}
    fn on_no_images_found(&self) {}
}

/// No-op reporter
pub struct SilentReporter;

impl RunReporter for SilentReporter {}

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}";

/// Terminal progress bar plus an end-of-run summary on stdout
pub struct ConsoleReporter {
    bar: ProgressBar,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(bar_style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(bar_style.progress_chars("##-"));
        }
        Self { bar }
    }
}

impl RunReporter for ConsoleReporter {
    fn on_run_started(&self, total: usize, destination_root: &Path) {
        self.bar.set_length(total as u64);
        self.bar.set_message(format!("sorting into {}", destination_root.display()));
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
    }

    fn on_preview(&self, image: &DecodedImage, label: &str, confidence: f64) {
        let percent = format!("{:.0}%", confidence * 100.0);
        let percent = match ConfidenceLevel::from_confidence(confidence) {
            ConfidenceLevel::High => style(percent).green(),
            ConfidenceLevel::Medium => style(percent).yellow(),
            ConfidenceLevel::Low => style(percent).red(),
        };
        self.bar.set_message(format!("{} -> {} ({})", image.file_name(), style(label).bold(), percent));
    }

    fn on_run_complete(&self, stats: &RunStatistics, destination_root: &Path) {
        self.bar.finish_and_clear();
        println!("{}", stats.completed_summary(destination_root));
    }

    fn on_run_cancelled(&self, stats: &RunStatistics) {
        self.bar.abandon_with_message("cancelled");
        println!("{}", stats.cancelled_summary());
    }

    fn on_no_images_found(&self) {
        self.bar.finish_and_clear();
        println!("No images found");
    }
}

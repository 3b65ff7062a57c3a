// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imgsort: ensemble image classifier and folder organizer
//!
//! Several classifiers vote on every image in a folder; the winning label
//! picks a category folder and the file is moved there under a stable,
//! collision-free `<Category>_<N>` name.

pub mod allocator;
pub mod classifiers;
pub mod config;
pub mod error;
pub mod error_log;
pub mod ollama;
pub mod organizer;
pub mod reporter;
pub mod voter;

pub use config::{AppConfig, RunConfig};
pub use error::{ImgsortError, Result};
pub use organizer::{CancellationToken, Organizer, RunOutcome, RunStatistics};

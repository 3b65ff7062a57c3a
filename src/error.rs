// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for imgsort

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgsort operations
pub type Result<T> = std::result::Result<T, ImgsortError>;

/// imgsort error types
#[derive(Error, Debug)]
pub enum ImgsortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Move(#[from] MoveError),

    /// Source folder unreadable or destination root uncreatable
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("An organize run is already in progress")]
    AlreadyRunning,
}

/// A file could not be read as an image
#[derive(Error, Debug)]
#[error("Cannot decode {}: {reason}", path.display())]
pub struct DecodeError {
    pub path: PathBuf,
    pub reason: String,
}

/// A single classifier failed on a single image
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Classifier '{classifier}' failed: {reason}")]
pub struct ClassificationError {
    pub classifier: String,
    pub reason: String,
}

impl ClassificationError {
    pub fn new(classifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
            reason: reason.into(),
        }
    }
}

/// A classified file could not be moved to its destination
#[derive(Error, Debug)]
#[error("Cannot move {} to {}: {reason}", source_path.display(), destination.display())]
pub struct MoveError {
    pub source_path: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

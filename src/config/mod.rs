// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for imgsort

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::allocator::LabelTransform;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Folder whose images get organized
    #[serde(default = "default_source_folder")]
    pub source_folder: String,

    /// Where organized images land
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Eligible image extensions (case-insensitive, without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Label vocabulary offered to prompt-driven classifiers
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// How raw labels become folder names
    #[serde(default)]
    pub label_transform: LabelTransform,

    /// Classifier settings
    #[serde(default)]
    pub classifiers: ClassifierConfig,

    /// Per-file error log
    #[serde(default)]
    pub error_log: ErrorLogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DestinationConfig {
    /// Explicit destination root; the dated folder next to the source is used otherwise
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default = "default_folder_prefix")]
    pub folder_prefix: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub ollama: OllamaClassifierConfig,
    #[serde(default)]
    pub filename: ToggleConfig,
    #[serde(default)]
    pub geometry: ToggleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OllamaClassifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// One voting classifier per model, queried in this order
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Prompt template; `{categories}` is replaced with the category list
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToggleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ErrorLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_error_log_path")]
    pub path: String,
}

/// Read-only settings for a single organize run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub source_folder: PathBuf,
    pub destination_root: PathBuf,
    pub extensions: Vec<String>,
    pub label_transform: LabelTransform,
}

// Default value functions
fn default_true() -> bool { true }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 2 }
fn default_folder_prefix() -> String { "Organized_Images_".to_string() }
fn default_date_format() -> String { "%Y-%m-%d".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_models() -> Vec<String> { vec!["moondream".to_string()] }
fn default_error_log_path() -> String { "error_log.txt".to_string() }

fn default_source_folder() -> String {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Desktop").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp"].into_iter().map(String::from).collect()
}

fn default_categories() -> Vec<String> {
    [
        "landscape photo", "portrait photo", "document", "screenshot",
        "meme", "artwork", "diagram", "chart", "receipt", "pet photo",
        "food photo", "selfie", "group photo", "nature photo",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_prompt() -> String {
    "Classify this image into exactly one of the following categories: {categories}. \
     Answer with the category name only."
        .to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_folder: default_source_folder(),
            destination: DestinationConfig::default(),
            extensions: default_extensions(),
            categories: default_categories(),
            label_transform: LabelTransform::default(),
            classifiers: ClassifierConfig::default(),
            error_log: ErrorLogConfig::default(),
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            root: None,
            folder_prefix: default_folder_prefix(),
            date_format: default_date_format(),
        }
    }
}

impl Default for OllamaClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_ollama_url(),
            models: default_models(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            prompt: default_prompt(),
        }
    }
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_error_log_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ImgsortError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no run could work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(crate::ImgsortError::Config("No image extensions configured".to_string()));
        }
        if self.classifiers.ollama.enabled && self.categories.is_empty() {
            return Err(crate::ImgsortError::Config(
                "Ollama classification needs at least one category".to_string(),
            ));
        }
        if self.destination.folder_prefix.contains(['/', '\\']) {
            return Err(crate::ImgsortError::Config(
                "Destination folder prefix must not contain path separators".to_string(),
            ));
        }
        if StrftimeItems::new(&self.destination.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(crate::ImgsortError::Config(format!(
                "Invalid date format: {}",
                self.destination.date_format
            )));
        }

        // Date-only formats; time fields fail here instead of at run time
        let mut sample = String::new();
        let formatted = NaiveDate::from_ymd_opt(2024, 12, 31)
            .map_or(false, |d| write!(sample, "{}", d.format(&self.destination.date_format)).is_ok());
        if !formatted {
            return Err(crate::ImgsortError::Config(format!(
                "Date format must only use date fields: {}",
                self.destination.date_format
            )));
        }
        if sample.contains(['/', '\\']) {
            return Err(crate::ImgsortError::Config(format!(
                "Date format must not produce path separators: {}",
                self.destination.date_format
            )));
        }
        Ok(())
    }

    /// Resolve the settings of one run.
    ///
    /// Without an explicit destination the images go to
    /// `<parent_of_source>/<prefix><date>`.
    pub fn run_config(
        &self,
        source_override: Option<PathBuf>,
        destination_override: Option<PathBuf>,
        today: NaiveDate,
    ) -> RunConfig {
        let source_folder = source_override.unwrap_or_else(|| PathBuf::from(&self.source_folder));

        let destination_root = destination_override
            .or_else(|| self.destination.root.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| {
                let parent = source_folder.parent().unwrap_or(&source_folder);
                let folder = format!(
                    "{}{}",
                    self.destination.folder_prefix,
                    today.format(&self.destination.date_format)
                );
                parent.join(folder)
            });

        RunConfig {
            source_folder,
            destination_root,
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            label_transform: self.label_transform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_dated_destination_next_to_source() {
        let config = AppConfig::default();
        let run = config.run_config(Some(PathBuf::from("/home/me/Desktop")), None, date());
        assert_eq!(run.destination_root, PathBuf::from("/home/me/Organized_Images_2024-03-09"));
        assert_eq!(run.source_folder, PathBuf::from("/home/me/Desktop"));
    }

    #[test]
    fn test_destination_override_wins() {
        let mut config = AppConfig::default();
        config.destination.root = Some("/srv/sorted".to_string());
        let run = config.run_config(Some(PathBuf::from("/a/b")), None, date());
        assert_eq!(run.destination_root, PathBuf::from("/srv/sorted"));

        let run = config.run_config(Some(PathBuf::from("/a/b")), Some(PathBuf::from("/x")), date());
        assert_eq!(run.destination_root, PathBuf::from("/x"));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let mut config = AppConfig::default();
        config.extensions = vec![".JPG".to_string(), "Png".to_string()];
        let run = config.run_config(Some(PathBuf::from("/a/b")), None, date());
        assert_eq!(run.extensions, vec!["jpg", "png"]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"categories": ["cat", "dog"]}"#).unwrap();
        assert_eq!(config.categories, vec!["cat", "dog"]);
        assert_eq!(config.extensions.len(), 5);
        assert_eq!(config.label_transform, LabelTransform::TitleCase);
        assert!(config.classifiers.geometry.enabled);
        assert_eq!(config.classifiers.ollama.models, vec!["moondream"]);
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let mut config = AppConfig::default();
        config.extensions = vec![".".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_date_format() {
        let mut config = AppConfig::default();
        config.destination.date_format = "%Y-%".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dates_with_separators() {
        let mut config = AppConfig::default();
        for format in ["%D", "%Y/%m", "%x", "%Y\\%m"] {
            config.destination.date_format = format.to_string();
            assert!(config.validate().is_err(), "{} should be rejected", format);
        }
        config.destination.date_format = "%H-%M".to_string();
        assert!(config.validate().is_err());
        config.destination.date_format = "%d.%m.%Y".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.categories = vec!["receipt".to_string()];
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.categories, vec!["receipt"]);
    }
}

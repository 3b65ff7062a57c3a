// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image decoding and the classifiers that vote on each image

pub mod filename;
pub mod geometry;
pub mod ollama;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ClassificationError, DecodeError};
use crate::voter::{vote, ClassificationResult, ClassificationVote};
use crate::{AppConfig, Result};

/// An image opened for classification
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl DecodedImage {
    pub fn new(path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    }
}

/// Opens image files
pub trait ImageDecoder: Send + Sync {
    fn open(&self, path: &Path) -> std::result::Result<DecodedImage, DecodeError>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn open(&self, path: &Path) -> std::result::Result<DecodedImage, DecodeError> {
        let image = image::ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| DecodeError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .decode()
            .map_err(|e| DecodeError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(DecodedImage::new(path, image))
    }
}

/// Trait for image classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Stable identifier, used in logs and votes
    fn id(&self) -> &str;

    /// Propose a label for an image
    async fn classify(&self, image: &DecodedImage) -> std::result::Result<String, ClassificationError>;
}

/// Classifiers in the fixed order they are queried
#[derive(Default)]
pub struct ClassifierRegistry {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the configured classifiers: Ollama models first, then filename, then geometry
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new();
        let settings = &config.classifiers;

        if settings.ollama.enabled {
            for model in &settings.ollama.models {
                registry.register(Box::new(ollama::OllamaClassifier::new(
                    &settings.ollama,
                    model,
                    &config.categories,
                )?));
            }
        }
        if settings.filename.enabled {
            registry.register(Box::new(filename::FilenameClassifier::new()));
        }
        if settings.geometry.enabled {
            registry.register(Box::new(geometry::GeometryClassifier::new()));
        }

        Ok(registry)
    }

    /// Append a classifier; it is queried after all earlier ones
    pub fn register(&mut self, classifier: Box<dyn Classifier>) {
        self.classifiers.push(classifier);
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn classifier_ids(&self) -> Vec<&str> {
        self.classifiers.iter().map(|c| c.id()).collect()
    }

    /// Ask every classifier, one after another
    pub async fn poll(&self, image: &DecodedImage) -> Vec<ClassificationVote> {
        let mut votes = Vec::with_capacity(self.classifiers.len());
        for classifier in &self.classifiers {
            let label = classifier.classify(image).await;
            match &label {
                Ok(l) => debug!("{} voted '{}' for {:?}", classifier.id(), l, image.path),
                Err(e) => warn!("{}", e),
            }
            votes.push(ClassificationVote::new(classifier.id(), label));
        }
        votes
    }

    /// Poll all classifiers and reduce their votes to one label
    pub async fn classify(&self, image: &DecodedImage) -> ClassificationResult {
        vote(&self.poll(image).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed(&'static str, Option<&'static str>, Arc<AtomicUsize>);

    #[async_trait]
    impl Classifier for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        async fn classify(&self, _image: &DecodedImage) -> std::result::Result<String, ClassificationError> {
            self.2.fetch_add(1, Ordering::SeqCst);
            self.1
                .map(String::from)
                .ok_or_else(|| ClassificationError::new(self.0, "no answer"))
        }
    }

    fn image() -> DecodedImage {
        DecodedImage::new("/tmp/x.png", DynamicImage::new_rgb8(2, 2))
    }

    #[tokio::test]
    async fn test_poll_keeps_order_and_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ClassifierRegistry::new();
        registry.register(Box::new(Fixed("a", None, calls.clone())));
        registry.register(Box::new(Fixed("b", Some("dog"), calls.clone())));
        registry.register(Box::new(Fixed("c", Some("cat"), calls.clone())));

        let votes = registry.poll(&image()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let ids: Vec<_> = votes.iter().map(|v| v.classifier_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(votes[0].label.is_err());

        let result = registry.classify(&image()).await;
        assert_eq!(result.label, "dog");
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_registry_from_config_order() {
        let mut config = AppConfig::default();
        config.classifiers.ollama.models = vec!["llava".to_string(), "moondream".to_string()];
        let registry = ClassifierRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.classifier_ids(),
            vec!["ollama:llava", "ollama:moondream", "filename", "geometry"]
        );

        config.classifiers.ollama.enabled = false;
        config.classifiers.geometry.enabled = false;
        let registry = ClassifierRegistry::from_config(&config).unwrap();
        assert_eq!(registry.classifier_ids(), vec!["filename"]);
    }

    #[test]
    fn test_decoder_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let err = ImageCrateDecoder.open(&path).unwrap_err();
        assert_eq!(err.path, path);

        let good = dir.path().join("ok.png");
        image::RgbImage::new(3, 2).save(&good).unwrap();
        let decoded = ImageCrateDecoder.open(&good).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.file_name(), "ok.png");
    }
}

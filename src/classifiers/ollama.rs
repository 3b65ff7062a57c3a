// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classifier backed by a local Ollama vision model

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GenericImageView};
use std::time::Duration;
use tracing::debug;

use super::{Classifier, DecodedImage};
use crate::config::OllamaClassifierConfig;
use crate::error::ClassificationError;
use crate::ollama::OllamaClient;
use crate::Result;

/// Longest side sent to the model
const MAX_EDGE: u32 = 768;

/// Asks one vision model to pick a category from a fixed list
pub struct OllamaClassifier {
    id: String,
    model: String,
    client: OllamaClient,
    prompt: String,
    categories: Vec<String>,
    retries: u32,
}

impl OllamaClassifier {
    pub fn new(config: &OllamaClassifierConfig, model: &str, categories: &[String]) -> Result<Self> {
        let client = OllamaClient::new(&config.url, Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            id: format!("ollama:{}", model),
            model: model.to_string(),
            client,
            prompt: render_prompt(&config.prompt, categories),
            categories: categories.to_vec(),
            retries: config.retries,
        })
    }

    /// Downscale and re-encode as JPEG for the request body
    fn prepare_image(img: &DynamicImage) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();
        let resized;
        let img = if width > MAX_EDGE || height > MAX_EDGE {
            resized = img.resize(MAX_EDGE, MAX_EDGE, image::imageops::FilterType::Triangle);
            &resized
        } else {
            img
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

        Ok(buffer)
    }

    fn fail(&self, reason: impl Into<String>) -> ClassificationError {
        ClassificationError::new(&self.id, reason)
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    fn id(&self) -> &str {
        &self.id
    }

    async fn classify(&self, image: &DecodedImage) -> std::result::Result<String, ClassificationError> {
        let data = Self::prepare_image(&image.image).map_err(|e| self.fail(e.to_string()))?;
        let encoded = general_purpose::STANDARD.encode(&data);

        let reply = self
            .client
            .generate_with_image_retry(&self.model, &self.prompt, &encoded, self.retries)
            .await
            .map_err(|e| self.fail(e.to_string()))?;

        debug!("{} replied {:?}", self.id, reply);
        match_category(&reply, &self.categories)
            .map(String::from)
            .ok_or_else(|| self.fail(format!("Reply {:?} names no known category", reply.trim())))
    }
}

/// Substitute `{categories}` in a prompt template
pub fn render_prompt(template: &str, categories: &[String]) -> String {
    template.replace("{categories}", &categories.join(", "))
}

/// Map a free-text model reply onto one of `categories`.
///
/// An exact (case-insensitive) match wins; otherwise the longest category
/// mentioned in the reply is taken.
pub fn match_category<'a>(reply: &str, categories: &'a [String]) -> Option<&'a str> {
    let cleaned = reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(exact) = categories.iter().find(|c| c.to_lowercase() == cleaned) {
        return Some(exact.as_str());
    }

    categories
        .iter()
        .filter(|c| !c.is_empty() && cleaned.contains(&c.to_lowercase()))
        .max_by_key(|c| c.len())
        .map(String::as_str)
}

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classifier that votes from pixel dimensions alone

use async_trait::async_trait;

use super::{Classifier, DecodedImage};
use crate::error::ClassificationError;

/// Common display resolutions (landscape orientation)
const SCREEN_SIZES: &[(u32, u32)] = &[
    (1280, 720), (1280, 800), (1366, 768), (1440, 900), (1536, 864),
    (1600, 900), (1680, 1050), (1920, 1080), (1920, 1200), (2560, 1440),
    (2560, 1600), (2880, 1800), (3024, 1964), (3456, 2234), (3840, 2160),
    (1170, 2532), (1179, 2556), (1284, 2778), (1290, 2796), (1080, 2400),
    (1080, 1920), (750, 1334), (828, 1792),
];

/// Aspect ratio beyond which an image counts as clearly wide or tall
const STRONG_RATIO: f64 = 1.6;

/// Votes screenshot / portrait / landscape from width and height
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometryClassifier;

impl GeometryClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Label implied by image dimensions, if they are distinctive enough
pub fn label_for_dimensions(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return None;
    }
    if SCREEN_SIZES
        .iter()
        .any(|&(w, h)| (w, h) == (width, height) || (h, w) == (width, height))
    {
        return Some("screenshot");
    }

    let ratio = width as f64 / height as f64;
    if ratio >= STRONG_RATIO {
        Some("landscape photo")
    } else if ratio <= 1.0 / STRONG_RATIO {
        Some("portrait photo")
    } else {
        None
    }
}

#[async_trait]
impl Classifier for GeometryClassifier {
    fn id(&self) -> &str {
        "geometry"
    }

    async fn classify(&self, image: &DecodedImage) -> Result<String, ClassificationError> {
        let (width, height) = image.dimensions();
        label_for_dimensions(width, height)
            .map(String::from)
            .ok_or_else(|| {
                ClassificationError::new(self.id(), format!("No geometric cue in {}x{}", width, height))
            })
    }
}

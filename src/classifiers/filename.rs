// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classifier that reads hints from the original file name

use async_trait::async_trait;

use super::{Classifier, DecodedImage};
use crate::error::ClassificationError;

/// Keyword -> label, checked in order
const KEYWORDS: &[(&[&str], &str)] = &[
    (&["screenshot", "screen shot", "screen_shot", "bildschirmfoto", "capture"], "screenshot"),
    (&["receipt", "invoice", "bill"], "receipt"),
    (&["selfie"], "selfie"),
    (&["meme"], "meme"),
    (&["diagram", "flowchart", "schematic"], "diagram"),
    (&["chart", "graph", "plot"], "chart"),
    (&["scan", "document", "doc"], "document"),
    (&["wallpaper", "landscape", "panorama", "pano"], "landscape photo"),
    (&["portrait"], "portrait photo"),
    (&["artwork", "drawing", "sketch", "painting"], "artwork"),
    (&["food", "dinner", "lunch", "breakfast"], "food photo"),
    (&["dog", "cat", "puppy", "kitten", "pet"], "pet photo"),
];

/// Votes from words in the file name
#[derive(Debug, Default, Clone, Copy)]
pub struct FilenameClassifier;

impl FilenameClassifier {
    pub fn new() -> Self {
        Self
    }
}

/// Split a file stem into lowercase words
fn words(stem: &str) -> Vec<String> {
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Label suggested by a file name, if any keyword matches
pub fn infer_label(file_name: &str) -> Option<&'static str> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let lower = stem.to_lowercase();
    let words = words(stem);

    KEYWORDS.iter().find_map(|(keys, label)| {
        let hit = keys.iter().any(|k| {
            if k.len() <= 4 {
                // Short keys must be whole words ("cat" is not "category")
                words.iter().any(|w| w == k)
            } else {
                lower.contains(k)
            }
        });
        hit.then_some(*label)
    })
}

#[async_trait]
impl Classifier for FilenameClassifier {
    fn id(&self) -> &str {
        "filename"
    }

    async fn classify(&self, image: &DecodedImage) -> Result<String, ClassificationError> {
        infer_label(image.file_name())
            .map(String::from)
            .ok_or_else(|| ClassificationError::new(self.id(), "No keyword in file name"))
    }
}

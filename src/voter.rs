// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Majority voting across classifier outputs

use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;

/// Label used when no classifier produced a vote
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One classifier's answer for one image
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationVote {
    pub classifier_id: String,
    pub label: Result<String, ClassificationError>,
}

impl ClassificationVote {
    pub fn new(classifier_id: impl Into<String>, label: Result<String, ClassificationError>) -> Self {
        Self {
            classifier_id: classifier_id.into(),
            label,
        }
    }
}

/// Final label for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// Share of cast votes that went to `label` (0.0 - 1.0)
    pub confidence: f64,
    /// Number of classifiers that answered
    pub votes_cast: usize,
}

impl ClassificationResult {
    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }
}

/// Coarse confidence bucket for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.7 {
            Self::High
        } else if confidence > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Combine per-classifier answers into one label.
///
/// Failed classifiers are left out of the count. The label with the most
/// votes wins; on a tie the label seen first in `votes` order wins.
pub fn vote(votes: &[ClassificationVote]) -> ClassificationResult {
    // (label, count) in first-seen order
    let mut tally: Vec<(&str, usize)> = Vec::new();
    let mut cast = 0;

    for vote in votes {
        let Ok(label) = &vote.label else { continue };
        cast += 1;
        match tally.iter_mut().find(|(l, _)| *l == label.as_str()) {
            Some((_, count)) => *count += 1,
            None => tally.push((label.as_str(), 1)),
        }
    }

    let mut winner: Option<(&str, usize)> = None;
    for &(label, count) in &tally {
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((label, count));
        }
    }

    match winner {
        Some((label, count)) => ClassificationResult {
            label: label.to_string(),
            confidence: count as f64 / cast as f64,
            votes_cast: cast,
        },
        None => ClassificationResult {
            label: UNCATEGORIZED.to_string(),
            confidence: 0.0,
            votes_cast: 0,
        },
    }
}

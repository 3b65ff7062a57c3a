// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Collision-free destination paths inside category folders
//!
//! Files land at `<root>/<Category>/<Category>_<N><ext>`, with `_<M>`
//! appended when that name is already taken. `N` continues from the highest
//! number already present in the folder, so earlier runs are never clobbered.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MoveError;
use crate::voter::UNCATEGORIZED;
use crate::Result;

/// How a raw classifier label becomes a category name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelTransform {
    /// `tabby_cat` -> `Tabby Cat`
    #[default]
    TitleCase,
    /// `tabby_cat` -> `tabby cat`
    Verbatim,
}

/// Turn a raw label into a folder-safe category name.
///
/// Underscores become spaces, whitespace runs collapse to one space and
/// characters that cannot appear in a file name are dropped.
pub fn normalize_category(raw: &str, transform: LabelTransform) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if collapsed.is_empty() {
        return UNCATEGORIZED.to_string();
    }

    match transform {
        LabelTransform::TitleCase => title_case(collapsed),
        LabelTransform::Verbatim => collapsed.to_string(),
    }
}

/// Uppercase the first letter of every run of letters, lowercase the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Sequence number of `<category>_<N>.<ext>` or `<category>_<N>_<M>.<ext>`
pub fn parse_sequence_number(file_name: &str, category: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(category)?.strip_prefix('_')?;
    let token = rest.split('_').next()?.split('.').next()?;
    token.parse().ok()
}

/// Hands out unique destination paths for one run
#[derive(Debug, Default)]
pub struct PathAllocator {
    /// Paths handed out this run, treated as occupied even before the move
    issued: HashSet<PathBuf>,
    transform: LabelTransform,
}

impl PathAllocator {
    pub fn new(transform: LabelTransform) -> Self {
        Self {
            issued: HashSet::new(),
            transform,
        }
    }

    /// Category folder name for a raw label
    pub fn category_for(&self, raw_label: &str) -> String {
        normalize_category(raw_label, self.transform)
    }

    /// Compute a destination for `original_name` under the label's category.
    ///
    /// The category folder is created if missing and rescanned on every call.
    pub fn allocate(&mut self, root: &Path, raw_label: &str, original_name: &str) -> Result<PathBuf> {
        let category = self.category_for(raw_label);
        let folder = root.join(&category);
        fs::create_dir_all(&folder)?;

        let next = self.next_sequence(&folder, &category)?;
        let ext = original_name
            .rfind('.')
            .map_or("", |dot| &original_name[dot..]);

        let candidate = self.first_free(&folder, &category, next, ext);
        debug!("Allocated {:?} for {}", candidate, original_name);
        self.issued.insert(candidate.clone());
        Ok(candidate)
    }

    /// One past the highest number found on disk or issued this run
    fn next_sequence(&self, folder: &Path, category: &str) -> Result<u64> {
        let mut highest: Option<u64> = None;
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            if let Some(n) = entry.file_name().to_str().and_then(|name| parse_sequence_number(name, category)) {
                highest = highest.max(Some(n));
            }
        }

        let issued = self
            .issued
            .iter()
            .filter(|p| p.parent() == Some(folder))
            .filter_map(|p| p.file_name()?.to_str())
            .filter_map(|name| parse_sequence_number(name, category));
        highest = highest.max(issued.max());

        Ok(highest.map_or(1, |n| n.saturating_add(1)))
    }

    /// `<category>_<next><ext>`, or the first free `<category>_<next>_<M><ext>`
    fn first_free(&self, folder: &Path, category: &str, next: u64, ext: &str) -> PathBuf {
        let mut candidate = folder.join(format!("{}_{}{}", category, next, ext));
        let mut counter = 1u64;
        while self.is_taken(&candidate) {
            candidate = folder.join(format!("{}_{}_{}{}", category, next, counter, ext));
            counter += 1;
        }
        candidate
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.issued.contains(path) || path.symlink_metadata().is_ok()
    }
}

/// Move a file, falling back to copy + delete when a plain rename fails
pub fn move_file(source: &Path, destination: &Path) -> std::result::Result<(), MoveError> {
    let err = |reason: String| MoveError {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        reason,
    };

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if destination.exists() || !source.is_file() {
                return Err(err(rename_err.to_string()));
            }
            debug!("Rename failed ({}), copying {:?} instead", rename_err, source);
            fs::copy(source, destination).map_err(|e| err(e.to_string()))?;
            if let Err(e) = fs::remove_file(source) {
                // Keep the original; drop the half-finished copy
                let _ = fs::remove_file(destination);
                return Err(err(e.to_string()));
            }
            Ok(())
        }
    }
}

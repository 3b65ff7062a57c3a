// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use imgsort::allocator::{normalize_category, parse_sequence_number, LabelTransform};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    label: &'a str,
    file_name: &'a str,
    verbatim: bool,
}

fuzz_target!(|input: Input<'_>| {
    let transform = if input.verbatim {
        LabelTransform::Verbatim
    } else {
        LabelTransform::TitleCase
    };
    let category = normalize_category(input.label, transform);

    assert!(!category.is_empty());
    assert!(!category.contains(['/', '\\', '_']));
    assert_eq!(category, category.trim());

    let _ = parse_sequence_number(input.file_name, &category);
    let numbered = format!("{}_{}.jpg", category, input.file_name.len());
    assert_eq!(parse_sequence_number(&numbered, &category), Some(input.file_name.len() as u64));
});

//! Turkish-aware text helpers
//!
//! Legal PDFs mix `İ/I/ı/i` freely and users type queries with or without
//! diacritics. Every comparison in the crate goes through [`fold_turkish`]
//! so that "TANIMLAR", "Tanımlar" and "tanimlar" compare equal.

use std::path::Path;

/// Turkish lower-casing (`İ` → `i`, `I` → `ı`)
pub fn normalize_turkish(text: &str) -> String {
    text.replace('İ', "i").replace('I', "ı").to_lowercase()
}

/// Turkish lower-casing followed by folding diacritics to ASCII
///
/// Used for matching only; never for stored or displayed text.
pub fn fold_turkish(text: &str) -> String {
    normalize_turkish(text)
        .chars()
        .map(|c| match c {
            'ç' => 'c',
            'ğ' => 'g',
            'ı' => 'i',
            'ö' => 'o',
            'ş' => 's',
            'ü' => 'u',
            'â' => 'a',
            'î' => 'i',
            'û' => 'u',
            other => other,
        })
        .collect()
}

/// Stable identifier prefix for a source label
///
/// Uses the file stem when the label looks like a file name:
/// `9903_karar.pdf` → `9903_karar`, `HIT30.pdf` → `hit30`.
pub fn slugify(label: &str) -> String {
    let stem = Path::new(label.trim())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(label);

    let mut slug = String::with_capacity(stem.len());
    for c in fold_turkish(stem).chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "doc".to_string()
    } else {
        slug
    }
}

/// Number of Unicode scalar values
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// A line holding nothing but digits (page numbers in extracted PDF text)
pub fn is_page_number(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// Tests
// ============================================================================

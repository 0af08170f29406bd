//! PDF text extraction (pdf-extract)
//!
//! Official Gazette PDFs carry a running page number above or below every
//! page. Those lines are dropped here, before the structure parser ever
//! sees them; anything in the middle of a page is kept as is.

use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

use crate::text::is_page_number;

lazy_static! {
    /// `--- Page 3 ---` style separators some exporters insert
    static ref PAGE_SEPARATOR: Regex =
        Regex::new(r"(?m)^\s*[-=]+\s*(?:Page|Sayfa)?\s*\d+\s*[-=]+\s*$").unwrap();

    /// `Sayfa 3`, `Sayfa 3 / 12`, `3 / 12`
    static ref PAGE_FOOTER: Regex =
        Regex::new(r"^(?i:sayfa\s*)?\d+(?:\s*/\s*\d+)?$").unwrap();
}

/// Cleaned page texts of a PDF, in order
///
/// Scanned PDFs without a text layer yield a single empty page.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!("No text layer in {:?}; scanned documents are not supported", path);
        return Ok(vec![String::new()]);
    }

    let pages: Vec<String> = split_pages(&text)
        .into_iter()
        .map(strip_page_furniture)
        .filter(|page| !page.is_empty())
        .collect();
    tracing::debug!("{:?}: {} pages", path, pages.len());

    Ok(pages)
}

/// Form feeds first, separator lines second, otherwise one page
fn split_pages(text: &str) -> Vec<&str> {
    let by_form_feed: Vec<&str> = text.split('\x0c').collect();
    if by_form_feed.len() > 1 {
        return by_form_feed;
    }

    PAGE_SEPARATOR.split(text).collect()
}

/// Drop page-number lines at the top and bottom of a page
fn strip_page_furniture(page: &str) -> String {
    let is_furniture =
        |line: &&str| line.trim().is_empty() || is_page_number(line) || PAGE_FOOTER.is_match(line.trim());

    let lines: Vec<&str> = page.lines().collect();
    let start = lines.iter().position(|l| !is_furniture(l));
    let end = lines.iter().rposition(|l| !is_furniture(l));

    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

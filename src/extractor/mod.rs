//! Content extraction - raw text of a source file
//!
//! - Text files: read directly
//! - PDF files: pdf-extract, pages joined back into one text

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::FileType;

// ============================================================================
// Extracted Content
// ============================================================================

/// Raw text of one source file
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub text: String,
    pub source_type: FileType,
    /// Page count (PDF only)
    pub total_pages: Option<usize>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// Extract the full text of a file
pub async fn extract(path: &Path, file_type: FileType) -> Result<ExtractedContent> {
    match file_type {
        FileType::Text => extract_text(path).await,
        FileType::Pdf => extract_pdf(path).await,
    }
}

async fn extract_text(path: &Path) -> Result<ExtractedContent> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read text file: {:?}", path))?;

    Ok(ExtractedContent {
        text,
        source_type: FileType::Text,
        total_pages: None,
    })
}

async fn extract_pdf(path: &Path) -> Result<ExtractedContent> {
    // CPU bound
    let path = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
        .await
        .context("PDF extraction task failed")??;

    Ok(ExtractedContent {
        total_pages: Some(pages.len()),
        text: pages.join("\n"),
        source_type: FileType::Pdf,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sektor.txt");
        std::fs::write(&path, "NACE KODU: 23.41").unwrap();

        let content = extract(&path, FileType::Text).await.unwrap();
        assert_eq!(content.text, "NACE KODU: 23.41");
        assert_eq!(content.source_type, FileType::Text);
        assert!(content.total_pages.is_none());
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(extract(&dir.path().join("yok.txt"), FileType::Text)
            .await
            .is_err());
    }
}

//! Chunk Store - storage capability trait and shared matching rules
//!
//! The retriever only sees [`ChunkStore`]. Implementations: in-memory
//! (tests, dry runs) and SQLite + LanceDB on local disk.

use anyhow::Result;
use async_trait::async_trait;

use super::chunker::{Chunk, ChunkMetadata};
use crate::text::fold_turkish;

/// Embedding dimension (OpenAI text-embedding-3-small)
/// source: https://platform.openai.com/docs/guides/embeddings
pub const EMBEDDING_DIMENSION: i32 = 1536;

// ============================================================================
// Types
// ============================================================================

/// Chunk row as read back from a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity, set by nearest-neighbour reads only
    pub similarity: Option<f32>,
}

impl StoredChunk {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
            similarity: None,
        }
    }
}

/// Chunk count of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub chunks: usize,
}

// ============================================================================
// ChunkStore Trait
// ============================================================================

/// ChunkStore trait (async)
///
/// One logical table holding legal-document chunks and sector chunks,
/// keyed by chunk id. Writes are idempotent upserts (last write wins).
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert or replace a chunk and its embedding
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> Result<()>;

    /// Nearest chunks by cosine similarity, most similar first
    async fn knn(&self, embedding: &[f32], k: usize) -> Result<Vec<StoredChunk>>;

    /// Article chunks (and their sub-units and parts) for an article number
    ///
    /// # Arguments
    /// * `number` - `"5"` or `"Geçici 1"`
    /// * `source_hint` - keep only sources matching this hint key
    /// * `limit` - maximum rows, ordered by id
    async fn find_article(
        &self,
        number: &str,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>>;

    /// Chunks whose text contains every term (folded, case-insensitive)
    ///
    /// With `include_annexes`, annex chunks are returned regardless of the
    /// terms. Annex chunks come first.
    async fn find_keywords(
        &self,
        terms: &[String],
        include_annexes: bool,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>>;

    /// Sector chunks whose NACE code is an ancestor or descendant of `code`
    async fn find_nace(&self, code: &str, limit: usize) -> Result<Vec<StoredChunk>>;

    /// Remove every chunk of a source
    async fn delete_source(&self, source: &str) -> Result<usize>;

    /// Total chunk count
    async fn count(&self) -> Result<usize>;

    /// Chunk count per source, ordered by source
    async fn source_counts(&self) -> Result<Vec<SourceCount>>;

    /// Content fingerprint recorded by the last ingest of a source
    async fn source_fingerprint(&self, source: &str) -> Result<Option<String>>;

    async fn set_source_fingerprint(&self, source: &str, fingerprint: &str) -> Result<()>;
}

// ============================================================================
// Matching Rules
// ============================================================================

/// Folded source label with everything but ASCII letters and digits removed
///
/// `2016-9495_Proje_Bazli.pdf` → `20169495projebazlipdf`
pub fn source_key(source: &str) -> String {
    fold_turkish(source)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Whether a source belongs to the instrument named by a hint key
pub fn source_matches_hint(source: &str, hint: &str) -> bool {
    !hint.is_empty() && source_key(source).contains(hint)
}

/// Whether a chunk id belongs to an article number
///
/// `5` matches `x_article_5`, `x_article_5_p_2`, `x_article_5_part_1` and
/// the provisional `x_article_Geçici_5`, but not `x_article_50`.
pub fn article_id_matches(id: &str, number: &str) -> bool {
    let safe = number.split_whitespace().collect::<Vec<_>>().join("_");
    if safe.is_empty() {
        return false;
    }

    let mut needles = vec![format!("_article_{}", safe)];
    if !safe.starts_with("Geçici") {
        needles.push(format!("_article_Geçici_{}", safe));
    }

    needles.iter().any(|needle| {
        id.match_indices(needle.as_str()).any(|(i, _)| {
            let rest = &id[i + needle.len()..];
            rest.is_empty() || rest.starts_with('_')
        })
    })
}

/// Segment-aware bidirectional prefix match of two NACE codes
///
/// `23` relates to `23.41.12` and vice versa; `2` does not relate to `23`.
pub fn nace_related(a: &str, b: &str) -> bool {
    let segments = |code: &str| -> Vec<String> {
        code.split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let (a, b) = (segments(a), segments(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Cosine similarity
///
/// Returns 0.0 for empty, mismatched or zero-norm vectors.
///
/// # Arguments
/// * `a` - first vector
/// * `b` - second vector
///
/// # Returns
/// Cosine similarity (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

//! In-memory chunk store
//!
//! Brute-force cosine search over every stored embedding. Meant for tests
//! and dry runs; the local disk store is used for real corpora.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::chunker::{Chunk, UnitType};
use super::vector::{
    article_id_matches, cosine_similarity, nace_related, source_matches_hint, ChunkStore,
    SourceCount, StoredChunk,
};
use crate::text::fold_turkish;

struct Entry {
    chunk: StoredChunk,
    /// folded content for keyword matching
    search_text: String,
    embedding: Vec<f32>,
}

/// In-memory [`ChunkStore`]
#[derive(Default)]
pub struct MemoryChunkStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    fingerprints: RwLock<HashMap<String, String>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// Rows passing `keep`, in id order, at most `limit`
    fn select<F>(&self, limit: usize, keep: F) -> Result<Vec<StoredChunk>>
    where
        F: Fn(&Entry) -> bool,
    {
        let entries = self.read_entries()?;
        Ok(entries
            .values()
            .filter(|e| keep(e))
            .take(limit)
            .map(|e| e.chunk.clone())
            .collect())
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        entries.insert(
            chunk.id.clone(),
            Entry {
                chunk: StoredChunk::from_chunk(chunk),
                search_text: fold_turkish(&chunk.text),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn knn(&self, embedding: &[f32], k: usize) -> Result<Vec<StoredChunk>> {
        let entries = self.read_entries()?;

        let mut scored: Vec<StoredChunk> = entries
            .values()
            .map(|e| StoredChunk {
                similarity: Some(cosine_similarity(embedding, &e.embedding)),
                ..e.chunk.clone()
            })
            .collect();

        // stable: equal scores keep id order
        scored.sort_by(|a, b| {
            b.similarity
                .unwrap_or(0.0)
                .partial_cmp(&a.similarity.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn find_article(
        &self,
        number: &str,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        self.select(limit, |e| {
            article_id_matches(&e.chunk.id, number)
                && source_hint.map_or(true, |h| source_matches_hint(&e.chunk.metadata.source, h))
        })
    }

    async fn find_keywords(
        &self,
        terms: &[String],
        include_annexes: bool,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let terms: Vec<String> = terms.iter().map(|t| fold_turkish(t)).collect();
        let matches = |e: &Entry| -> bool {
            let hinted =
                source_hint.map_or(true, |h| source_matches_hint(&e.chunk.metadata.source, h));
            let annex = include_annexes && e.chunk.metadata.unit_type == UnitType::Annex;
            let terms_hit = !terms.is_empty() && terms.iter().all(|t| e.search_text.contains(t));
            hinted && (annex || terms_hit)
        };

        let entries = self.read_entries()?;
        let (mut annexes, others): (Vec<&Entry>, Vec<&Entry>) = entries
            .values()
            .filter(|e| matches(e))
            .partition(|e| e.chunk.metadata.unit_type == UnitType::Annex);
        annexes.extend(others);

        Ok(annexes
            .into_iter()
            .take(limit)
            .map(|e| e.chunk.clone())
            .collect())
    }

    async fn find_nace(&self, code: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        let entries = self.read_entries()?;

        let mut rows: Vec<&Entry> = entries
            .values()
            .filter(|e| {
                e.chunk.metadata.unit_type == UnitType::Sector
                    && e.chunk
                        .metadata
                        .nace
                        .as_deref()
                        .is_some_and(|nace| nace_related(nace, code))
            })
            .collect();
        rows.sort_by(|a, b| a.chunk.metadata.nace.cmp(&b.chunk.metadata.nace));

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|e| e.chunk.clone())
            .collect())
    }

    async fn delete_source(&self, source: &str) -> Result<usize> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let before = entries.len();
        entries.retain(|_, e| e.chunk.metadata.source != source);
        Ok(before - entries.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    async fn source_counts(&self) -> Result<Vec<SourceCount>> {
        let entries = self.read_entries()?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for e in entries.values() {
            *counts.entry(e.chunk.metadata.source.clone()).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(source, chunks)| SourceCount { source, chunks })
            .collect())
    }

    async fn source_fingerprint(&self, source: &str) -> Result<Option<String>> {
        let fingerprints = self
            .fingerprints
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(fingerprints.get(source).cloned())
    }

    async fn set_source_fingerprint(&self, source: &str, fingerprint: &str) -> Result<()> {
        let mut fingerprints = self
            .fingerprints
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        fingerprints.insert(source.to_string(), fingerprint.to_string());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

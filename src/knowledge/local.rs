//! Local disk chunk store - SQLite rows + LanceDB vectors
//!
//! Layout under the data directory:
//! - knowledge.db     chunk rows, metadata, source fingerprints
//! - vectors.lance    chunk embeddings

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::chunker::Chunk;
use super::lance::LanceVectorStore;
use super::store::{KnowledgeStore, StoreStats};
use super::vector::{ChunkStore, SourceCount, StoredChunk};

/// [`ChunkStore`] on local disk
pub struct LocalChunkStore {
    store: KnowledgeStore,
    vectors: LanceVectorStore,
}

impl LocalChunkStore {
    /// Open (or create) both stores under `data_dir`
    ///
    /// # Arguments
    /// * `data_dir` - data directory
    pub async fn open(data_dir: &Path) -> Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        }

        let store = KnowledgeStore::open(&data_dir.join("knowledge.db"))
            .context("Failed to open knowledge store")?;
        let vectors = LanceVectorStore::open(&data_dir.join("vectors.lance"))
            .await
            .context("Failed to open vector store")?;

        Ok(Self { store, vectors })
    }

    /// Row store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    /// Number of stored vectors
    pub async fn vector_count(&self) -> Result<usize> {
        self.vectors.count().await
    }
}

#[async_trait]
impl ChunkStore for LocalChunkStore {
    async fn upsert(&self, chunk: &Chunk, embedding: &[f32]) -> Result<()> {
        // row last: knn only returns hits that have a row
        self.vectors
            .upsert(&chunk.id, &chunk.metadata.source, embedding)
            .await?;
        self.store.upsert_chunk(chunk)
    }

    async fn knn(&self, embedding: &[f32], k: usize) -> Result<Vec<StoredChunk>> {
        let hits = self.vectors.search(embedding, k).await?;
        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let mut rows = self.store.get_chunks(&ids)?;

        for row in &mut rows {
            row.similarity = hits
                .iter()
                .find(|h| h.chunk_id == row.id)
                .map(|h| h.similarity);
        }

        if rows.len() < hits.len() {
            tracing::warn!(
                "{} vector hits have no chunk row",
                hits.len() - rows.len()
            );
        }

        Ok(rows)
    }

    async fn find_article(
        &self,
        number: &str,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        self.store.find_article(number, source_hint, limit)
    }

    async fn find_keywords(
        &self,
        terms: &[String],
        include_annexes: bool,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        self.store
            .find_keywords(terms, include_annexes, source_hint, limit)
    }

    async fn find_nace(&self, code: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        self.store.find_nace(code, limit)
    }

    async fn delete_source(&self, source: &str) -> Result<usize> {
        let vectors = self.vectors.delete_source(source).await?;
        let rows = self.store.delete_source(source)?;
        tracing::info!("Deleted {} chunks ({} vectors) of {}", rows, vectors, source);
        Ok(rows)
    }

    async fn count(&self) -> Result<usize> {
        self.store.count()
    }

    async fn source_counts(&self) -> Result<Vec<SourceCount>> {
        self.store.source_counts()
    }

    async fn source_fingerprint(&self, source: &str) -> Result<Option<String>> {
        self.store.source_fingerprint(source)
    }

    async fn set_source_fingerprint(&self, source: &str, fingerprint: &str) -> Result<()> {
        self.store.set_source_fingerprint(source, fingerprint)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::{ChunkMetadata, UnitType};
    use crate::knowledge::vector::EMBEDDING_DIMENSION;
    use tempfile::TempDir;

    fn chunk(id: &str, source: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("metin {}", id),
            metadata: ChunkMetadata {
                document_id: id.to_string(),
                unit_type: UnitType::Article,
                topic: String::new(),
                linked_units: Vec::new(),
                source: source.to_string(),
                nace: None,
            },
        }
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSION as usize];
        v[i] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = LocalChunkStore::open(dir.path()).await.unwrap();

        store.upsert(&chunk("a_article_1", "a.pdf"), &axis(0)).await.unwrap();
        store.upsert(&chunk("a_article_2", "a.pdf"), &axis(1)).await.unwrap();
        store.upsert(&chunk("b_article_1", "b.pdf"), &axis(2)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.vector_count().await.unwrap(), 3);

        let rows = store.knn(&axis(1), 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a_article_2");
        assert!(rows[0].similarity.unwrap() > 0.99);

        let rows = store.find_article("1", None, 15).await.unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(store.delete_source("a.pdf").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.vector_count().await.unwrap(), 1);
    }
}

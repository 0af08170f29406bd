//! Ingestion - raw source text → chunks → embeddings → store
//!
//! One source (file) at a time. Per-chunk failures are logged and counted;
//! a source whose chunks all landed records its content fingerprint so an
//! unchanged re-ingest is skipped.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::chunker::{Chunk, ChunkConfig, Chunker};
use super::vector::ChunkStore;
use crate::collector::CollectedFile;
use crate::embedding::EmbeddingProvider;
use crate::extractor;
use crate::parsing::{is_sector_table, parse_sector_table, parse_structure};

/// Per-run ingest switches
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Delete every stored chunk of the source first
    pub replace: bool,
    /// Ingest even when the content fingerprint is unchanged
    pub force: bool,
}

/// Outcome of ingesting one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub total_chunks: usize,
    pub stored_chunks: usize,
    pub failed_chunks: usize,
    /// Unchanged content, nothing written
    pub skipped: bool,
}

/// SHA-256 of the raw text, lower-case hex
pub fn content_fingerprint(raw_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Chunks of one source
///
/// Sector tables are recognised by their record label; everything else
/// goes through the structure parser.
pub fn chunk_source(chunker: &Chunker, source: &str, raw_text: &str) -> Vec<Chunk> {
    if is_sector_table(raw_text) {
        let records = parse_sector_table(raw_text);
        tracing::info!("{}: sector table with {} records", source, records.len());
        chunker.chunk_sector_records(&records, source)
    } else {
        let tree = parse_structure(raw_text);
        tracing::info!(
            "{}: {} articles, {} definitions, {} annexes",
            source,
            tree.articles.len(),
            tree.definitions.len(),
            tree.annexes.len()
        );
        chunker.chunk(&tree, source)
    }
}

// ============================================================================
// Ingestor
// ============================================================================

pub struct Ingestor {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunk_config: ChunkConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::new(chunk_config),
        }
    }

    /// Ingest the raw text of one source
    ///
    /// # Arguments
    /// * `source` - source label stored with every chunk
    /// * `raw_text` - extracted document text
    /// * `options` - replace / force switches
    pub async fn ingest_text(
        &self,
        source: &str,
        raw_text: &str,
        options: IngestOptions,
    ) -> Result<IngestReport> {
        let fingerprint = content_fingerprint(raw_text);

        if !options.force {
            let previous = self
                .store
                .source_fingerprint(source)
                .await
                .context("Failed to read source fingerprint")?;
            if previous.as_deref() == Some(fingerprint.as_str()) {
                tracing::info!("{}: unchanged, skipping", source);
                return Ok(IngestReport {
                    source: source.to_string(),
                    skipped: true,
                    ..Default::default()
                });
            }
        }

        if options.replace {
            let removed = self
                .store
                .delete_source(source)
                .await
                .context("Failed to delete previous chunks")?;
            tracing::info!("{}: removed {} previous chunks", source, removed);
        }

        let chunks = chunk_source(&self.chunker, source, raw_text);
        let mut report = IngestReport {
            source: source.to_string(),
            total_chunks: chunks.len(),
            ..Default::default()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            match self.store_chunk(chunk).await {
                Ok(()) => report.stored_chunks += 1,
                Err(e) => {
                    report.failed_chunks += 1;
                    tracing::warn!("{}: chunk {} failed: {:#}", source, chunk.id, e);
                }
            }

            if (i + 1) % 25 == 0 {
                tracing::info!("{}: {}/{} chunks", source, i + 1, chunks.len());
            }
        }

        if report.failed_chunks == 0 {
            self.store
                .set_source_fingerprint(source, &fingerprint)
                .await
                .context("Failed to record source fingerprint")?;
        }

        tracing::info!(
            "{}: stored {}/{} chunks ({} failed)",
            source,
            report.stored_chunks,
            report.total_chunks,
            report.failed_chunks
        );
        Ok(report)
    }

    /// Extract and ingest a file; the file name is the default source label
    pub async fn ingest_file(
        &self,
        path: &Path,
        source: Option<&str>,
        options: IngestOptions,
    ) -> Result<IngestReport> {
        let collected = CollectedFile::from_path(path.to_path_buf())?
            .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {:?}", path))?;
        let source = source
            .map(str::to_string)
            .unwrap_or_else(|| collected.source_label());

        let content = extractor::extract(&collected.path, collected.file_type).await?;
        if content.text.trim().is_empty() {
            tracing::warn!("{}: no text extracted", source);
        }

        self.ingest_text(&source, &content.text, options).await
    }

    async fn store_chunk(&self, chunk: &Chunk) -> Result<()> {
        let embedding = self
            .embedder
            .embed(&chunk.text)
            .await
            .context("Embedding failed")?;
        self.store
            .upsert(chunk, &embedding)
            .await
            .context("Upsert failed")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::memory::MemoryChunkStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails every call whose text contains `fail_on`
    struct StubEmbedder {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl StubEmbedder {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.is_some_and(|f| text.contains(f)) {
                anyhow::bail!("stub failure");
            }
            Ok(vec![text.len() as f32, 1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    const DECREE: &str = "Amaç\nMADDE 1- (1) Bu Kararın amacı yatırımları desteklemektir.\n\
                          Tanımlar\nMADDE 2- (1) Bu Kararda geçen;\n\
                          a) Bakanlık: Sanayi ve Teknoloji Bakanlığını,\n\
                          b) Belge: Yatırım teşvik belgesini,\nifade eder.";

    fn ingestor(embedder: Arc<StubEmbedder>) -> (Arc<MemoryChunkStore>, Ingestor) {
        let store = Arc::new(MemoryChunkStore::new());
        let ingestor = Ingestor::new(store.clone(), embedder, ChunkConfig::default());
        (store, ingestor)
    }

    #[test]
    fn test_content_fingerprint() {
        let a = content_fingerprint("MADDE 1");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_fingerprint("MADDE 1"));
        assert_ne!(a, content_fingerprint("MADDE 2"));
    }

    #[test]
    fn test_chunk_source_detects_sector_table() {
        let chunker = Chunker::with_defaults();
        let sector = "NACE KODU: 23.41, YATIRIM KONUSU: Seramik, HEDEF YATIRIM DURUMU: EVET";
        let chunks = chunk_source(&chunker, "sektor.txt", sector);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.nace.as_deref(), Some("23.41"));

        let chunks = chunk_source(&chunker, "9903_karar.pdf", DECREE);
        assert!(chunks.iter().any(|c| c.id == "9903_karar_article_2"));
        assert!(chunks.iter().all(|c| c.metadata.nace.is_none()));
    }

    #[tokio::test]
    async fn test_ingest_and_skip_unchanged() {
        let embedder = Arc::new(StubEmbedder::new(None));
        let (store, ingestor) = ingestor(embedder.clone());

        let report = ingestor
            .ingest_text("9903_karar.pdf", DECREE, IngestOptions::default())
            .await
            .unwrap();
        assert!(!report.skipped);
        assert!(report.total_chunks > 0);
        assert_eq!(report.stored_chunks, report.total_chunks);
        assert_eq!(store.count().await.unwrap(), report.total_chunks);

        let calls = embedder.calls.load(Ordering::SeqCst);
        let again = ingestor
            .ingest_text("9903_karar.pdf", DECREE, IngestOptions::default())
            .await
            .unwrap();
        assert!(again.skipped);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);

        let forced = ingestor
            .ingest_text(
                "9903_karar.pdf",
                DECREE,
                IngestOptions {
                    force: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!forced.skipped);
        assert_eq!(store.count().await.unwrap(), report.total_chunks);
    }

    #[tokio::test]
    async fn test_replace_removes_stale_chunks() {
        let (store, ingestor) = ingestor(Arc::new(StubEmbedder::new(None)));

        ingestor
            .ingest_text("9903_karar.pdf", DECREE, IngestOptions::default())
            .await
            .unwrap();
        let before = store.count().await.unwrap();

        let shorter = "Amaç\nMADDE 1- Bu Kararın amacı yatırımları desteklemektir.";
        let report = ingestor
            .ingest_text(
                "9903_karar.pdf",
                shorter,
                IngestOptions {
                    replace: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(report.total_chunks, 1);
        assert!(before > 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chunk_failures_are_counted() {
        let embedder = Arc::new(StubEmbedder::new(Some("TANIM: Belge")));
        let (store, ingestor) = ingestor(embedder);

        let report = ingestor
            .ingest_text("9903_karar.pdf", DECREE, IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.stored_chunks, report.total_chunks - 1);

        // failed runs do not record a fingerprint
        assert!(store
            .source_fingerprint("9903_karar.pdf")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ingest_file_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ytak_esaslar.txt");
        std::fs::write(&path, DECREE).unwrap();

        let (store, ingestor) = ingestor(Arc::new(StubEmbedder::new(None)));
        let report = ingestor
            .ingest_file(&path, None, IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(report.source, "ytak_esaslar.txt");

        let counts = store.source_counts().await.unwrap();
        assert_eq!(counts[0].source, "ytak_esaslar.txt");

        assert!(ingestor
            .ingest_file(&dir.path().join("x.docx"), None, IngestOptions::default())
            .await
            .is_err());
    }
}

//! Hybrid retrieval - four strategies, one source-loyal ranking
//!
//! Candidate strategies, issued concurrently:
//! 1. NACE: sector chunks along the ancestor chain of a NACE code
//! 2. Direct: chunks of a referenced article (and its sub-units)
//! 3. Keyword: chunks containing the leading search terms
//! 4. Vector: nearest chunks to the query embedding
//!
//! Each strategy runs under its own timeout; a failing strategy contributes
//! nothing. Candidates are merged in that group order, de-duplicated by id
//! and stably sorted by (NACE hit, hinted source, direct hit, similarity).

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::query::QueryAnalysis;
use crate::embedding::EmbeddingProvider;
use crate::error::{self, RetrievalError};
use crate::knowledge::{source_matches_hint, ChunkStore, StoredChunk, UnitType};
use crate::text::char_len;

/// Separator between rendered chunks
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched by the vector strategy
    pub vector_top_k: usize,
    pub direct_limit: usize,
    pub keyword_limit: usize,
    /// Rows per NACE ancestor level
    pub nace_limit: usize,
    /// Context budget in characters
    pub max_context_chars: usize,
    pub strategy_timeout: Duration,
    /// Leading search terms that must all occur in a keyword hit
    pub keyword_required_terms: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 20,
            direct_limit: 15,
            keyword_limit: 25,
            nace_limit: 15,
            max_context_chars: 18_000,
            strategy_timeout: Duration::from_secs(15),
            keyword_required_terms: 2,
        }
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Candidate generation strategy, in merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Nace,
    Direct,
    Keyword,
    Vector,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Nace => "nace",
            Strategy::Direct => "direct",
            Strategy::Keyword => "keyword",
            Strategy::Vector => "vector",
        }
    }
}

/// Ranked retrieval candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk: StoredChunk,
    /// First strategy that produced the chunk
    pub strategy: Strategy,
    /// Sector chunk found by the NACE strategy
    pub sector: bool,
    /// Source matches an active hint
    pub hinted: bool,
    /// Also found by the direct lookup
    pub direct: bool,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn source(&self) -> &str {
        &self.chunk.metadata.source
    }

    pub fn similarity(&self) -> f32 {
        self.chunk.similarity.unwrap_or(0.0)
    }
}

/// Raw candidate lists, one per strategy
#[derive(Debug, Clone, Default)]
pub struct StrategyResults {
    pub nace: Vec<StoredChunk>,
    pub direct: Vec<StoredChunk>,
    pub keyword: Vec<StoredChunk>,
    pub vector: Vec<StoredChunk>,
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// Hybrid retriever over a [`ChunkStore`]
pub struct HybridRetriever {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Assembled context for a question (empty when nothing was found)
    ///
    /// # Arguments
    /// * `query` - raw user question
    pub async fn retrieve(&self, query: &str) -> String {
        let ranked = self.retrieve_ranked(query).await;
        let context = assemble_context(&ranked, self.config.max_context_chars);
        tracing::info!(
            "Context: {} chars from {} candidates",
            char_len(&context),
            ranked.len()
        );
        context
    }

    /// Like [`retrieve`](Self::retrieve), abandoned when `cancel` completes first
    ///
    /// In-flight strategy calls are dropped; `None` means cancelled.
    pub async fn retrieve_cancellable<C>(&self, query: &str, cancel: C) -> Option<String>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            context = self.retrieve(query) => Some(context),
            _ = cancel => {
                tracing::info!("Retrieval cancelled");
                None
            }
        }
    }

    /// Ranked, de-duplicated candidates (before the context budget)
    pub async fn retrieve_ranked(&self, query: &str) -> Vec<Candidate> {
        let analysis = QueryAnalysis::analyze(query);
        tracing::debug!(
            "Query analysis: hints={:?} article={:?} nace={:?} keywords={:?}",
            analysis.hints,
            analysis.article,
            analysis.nace,
            analysis.keywords
        );

        let results = self.gather(query, &analysis).await;
        rank_candidates(results, &analysis.hints)
    }

    /// Run every strategy concurrently
    async fn gather(&self, query: &str, analysis: &QueryAnalysis) -> StrategyResults {
        let (nace, direct, keyword, vector) = tokio::join!(
            self.run(Strategy::Nace, self.nace_search(analysis)),
            self.run(Strategy::Direct, self.direct_lookup(analysis)),
            self.run(Strategy::Keyword, self.keyword_search(analysis)),
            self.run(Strategy::Vector, self.vector_search(query)),
        );

        StrategyResults {
            nace,
            direct,
            keyword,
            vector,
        }
    }

    /// Timeout + error absorption for one strategy
    async fn run<F>(&self, strategy: Strategy, fut: F) -> Vec<StoredChunk>
    where
        F: Future<Output = error::Result<Vec<StoredChunk>>>,
    {
        let timeout = self.config.strategy_timeout;
        let outcome = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout(timeout)),
        };

        match outcome {
            Ok(rows) => {
                tracing::debug!("{} search: {} candidates", strategy.name(), rows.len());
                rows
            }
            Err(e) => {
                tracing::warn!("{} search failed: {}", strategy.name(), e);
                Vec::new()
            }
        }
    }

    async fn vector_search(&self, query: &str) -> error::Result<Vec<StoredChunk>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(RetrievalError::embedding)?;

        self.store
            .knn(&embedding, self.config.vector_top_k)
            .await
            .map_err(RetrievalError::store)
    }

    async fn direct_lookup(&self, analysis: &QueryAnalysis) -> error::Result<Vec<StoredChunk>> {
        let Some(number) = analysis.direct_target() else {
            return Ok(Vec::new());
        };

        self.store
            .find_article(&number, analysis.primary_hint(), self.config.direct_limit)
            .await
            .map_err(RetrievalError::store)
    }

    async fn keyword_search(&self, analysis: &QueryAnalysis) -> error::Result<Vec<StoredChunk>> {
        if analysis.keywords.is_empty() {
            return Ok(Vec::new());
        }

        let required = self.config.keyword_required_terms.max(1);
        let terms: Vec<String> = analysis.keywords.iter().take(required).cloned().collect();

        self.store
            .find_keywords(
                &terms,
                analysis.list_intent,
                analysis.primary_hint(),
                self.config.keyword_limit,
            )
            .await
            .map_err(RetrievalError::store)
    }

    async fn nace_search(&self, analysis: &QueryAnalysis) -> error::Result<Vec<StoredChunk>> {
        let levels = analysis.nace_ancestors();
        if levels.is_empty() {
            return Ok(Vec::new());
        }

        let per_level = futures::future::try_join_all(
            levels
                .iter()
                .map(|code| self.store.find_nace(code, self.config.nace_limit)),
        )
        .await
        .map_err(RetrievalError::store)?;

        let mut seen = HashSet::new();
        Ok(per_level
            .into_iter()
            .flatten()
            .filter(|row| seen.insert(row.id.clone()))
            .collect())
    }
}

// ============================================================================
// Ranking and Assembly
// ============================================================================

/// Merge strategy results into the final candidate order
///
/// Groups are concatenated NACE, direct, keyword, vector; the first copy of
/// an id is kept (with the best similarity seen for it). A stable sort then
/// puts NACE sector hits first, hinted sources next, direct hits next, and
/// orders the rest by descending similarity.
pub fn rank_candidates(results: StrategyResults, hints: &[&str]) -> Vec<Candidate> {
    let nace_ids: HashSet<String> = results
        .nace
        .iter()
        .filter(|c| c.metadata.unit_type == UnitType::Sector)
        .map(|c| c.id.clone())
        .collect();
    let direct_ids: HashSet<String> = results.direct.iter().map(|c| c.id.clone()).collect();

    let groups = [
        (Strategy::Nace, results.nace),
        (Strategy::Direct, results.direct),
        (Strategy::Keyword, results.keyword),
        (Strategy::Vector, results.vector),
    ];

    let mut merged: Vec<Candidate> = Vec::new();
    for (strategy, rows) in groups {
        for chunk in rows {
            if let Some(existing) = merged.iter_mut().find(|c| c.chunk.id == chunk.id) {
                if chunk.similarity.unwrap_or(0.0) > existing.similarity() {
                    existing.chunk.similarity = chunk.similarity;
                }
                continue;
            }

            merged.push(Candidate {
                sector: nace_ids.contains(&chunk.id),
                hinted: hints
                    .iter()
                    .any(|h| source_matches_hint(&chunk.metadata.source, h)),
                direct: direct_ids.contains(&chunk.id),
                strategy,
                chunk,
            });
        }
    }

    merged.sort_by(|a, b| {
        b.sector
            .cmp(&a.sector)
            .then(b.hinted.cmp(&a.hinted))
            .then(b.direct.cmp(&a.direct))
            .then(
                b.similarity()
                    .partial_cmp(&a.similarity())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    merged
}

/// `[Kaynak: <source> | ID: <id>]` header and text
pub fn render_candidate(candidate: &Candidate) -> String {
    if candidate.source().is_empty() {
        return candidate.chunk.content.clone();
    }
    format!(
        "[Kaynak: {} | ID: {}]\n{}",
        candidate.source(),
        candidate.id(),
        candidate.chunk.content
    )
}

/// Join rendered candidates within the budget
///
/// A block that would push the context past `max_chars` (separator
/// included) is dropped and the next candidates are still tried, so one
/// oversized chunk never empties the context. The result never exceeds
/// `max_chars` characters.
pub fn assemble_context(candidates: &[Candidate], max_chars: usize) -> String {
    let separator_chars = char_len(CONTEXT_SEPARATOR);
    let mut blocks: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut total = 0;

    for candidate in candidates {
        if !seen.insert(candidate.id()) {
            continue;
        }

        let block = render_candidate(candidate);
        let cost = char_len(&block) + if blocks.is_empty() { 0 } else { separator_chars };
        if total + cost > max_chars {
            tracing::debug!(
                "Dropping {} ({} chars) from context, {} of {} chars used",
                candidate.id(),
                cost,
                total,
                max_chars
            );
            continue;
        }

        total += cost;
        blocks.push(block);
    }

    blocks.join(CONTEXT_SEPARATOR)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Chunk, ChunkMetadata, MemoryChunkStore};
    use anyhow::Result;
    use async_trait::async_trait;

    const DIM: usize = 4;

    /// Maps texts to fixed vectors by keyword
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let text = crate::text::fold_turkish(text);
            let mut v = vec![0.0; DIM];
            if text.contains("kdv") {
                v[0] = 1.0;
            }
            if text.contains("faiz") {
                v[1] = 1.0;
            }
            if text.contains("seramik") {
                v[2] = 1.0;
            }
            v[3] = 0.1;
            Ok(v)
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("provider unavailable")
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![0.0; DIM])
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn chunk(id: &str, text: &str, source: &str, unit_type: UnitType, nace: Option<&str>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_id: id.to_string(),
                unit_type,
                topic: String::new(),
                linked_units: Vec::new(),
                source: source.to_string(),
                nace: nace.map(str::to_string),
            },
        }
    }

    fn stored(id: &str, source: &str, similarity: Option<f32>) -> StoredChunk {
        StoredChunk {
            similarity,
            ..StoredChunk::from_chunk(&chunk(id, "metin", source, UnitType::Article, None))
        }
    }

    async fn corpus() -> Arc<MemoryChunkStore> {
        let store = Arc::new(MemoryChunkStore::new());
        let rows = [
            chunk(
                "9903_karar_article_5",
                "MADDE 5 - KDV istisnası\n\nYatırım teşvik belgesi kapsamında KDV istisnası uygulanır.",
                "9903_karar.pdf",
                UnitType::Article,
                None,
            ),
            chunk(
                "9903_karar_article_5_p_1",
                "MADDE 5 / Paragraf 1\nKDV istisnası belge kapsamındaki makineler için geçerlidir.",
                "9903_karar.pdf",
                UnitType::Article,
                None,
            ),
            chunk(
                "2016_9495_proje_bazli_article_5",
                "MADDE 5 - KDV istisnası\n\nProje bazlı yatırımlarda KDV istisnası ve KDV iadesi.",
                "2016-9495_Proje_Bazli.pdf",
                UnitType::Article,
                None,
            ),
            chunk(
                "ytak_article_3",
                "MADDE 3 - Faiz\n\nYTAK kredilerinde faiz indirimi uygulanır.",
                "ytak.pdf",
                UnitType::Article,
                None,
            ),
            chunk(
                "9903_karar_ek_2_part_1",
                "EK-2 Bölgeler\nAdana, Ankara, İstanbul",
                "9903_karar.pdf",
                UnitType::Annex,
                None,
            ),
            chunk("sektor_nace_23", "NACE KODU: 23\nYATIRIM KONUSU: Diğer mineraller", "sektor.txt", UnitType::Sector, Some("23")),
            chunk("sektor_nace_23_41", "NACE KODU: 23.41\nYATIRIM KONUSU: Seramik", "sektor.txt", UnitType::Sector, Some("23.41")),
            chunk("sektor_nace_23_41_12", "NACE KODU: 23.41.12\nYATIRIM KONUSU: Seramik sağlık gereçleri", "sektor.txt", UnitType::Sector, Some("23.41.12")),
            chunk("sektor_nace_24", "NACE KODU: 24\nYATIRIM KONUSU: Metal", "sektor.txt", UnitType::Sector, Some("24")),
        ];

        let embedder = KeywordEmbedder;
        for c in &rows {
            let embedding = embedder.embed(&c.text).await.unwrap();
            store.upsert(c, &embedding).await.unwrap();
        }
        store
    }

    fn retriever(store: Arc<MemoryChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> HybridRetriever {
        HybridRetriever::new(store, embedder, RetrievalConfig::default())
    }

    #[test]
    fn test_rank_precedence() {
        let results = StrategyResults {
            nace: vec![],
            direct: vec![stored("b_article_2", "b.pdf", None)],
            keyword: vec![stored("a_article_9", "9903_karar.pdf", None)],
            vector: vec![
                stored("c_article_1", "c.pdf", Some(0.99)),
                stored("a_article_1", "9903_karar.pdf", Some(0.40)),
                stored("b_article_2", "b.pdf", Some(0.95)),
            ],
        };

        let ranked = rank_candidates(results, &["9903"]);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id()).collect();
        // hinted (by similarity), then direct, then the rest
        assert_eq!(ids, vec!["a_article_1", "a_article_9", "b_article_2", "c_article_1"]);

        // duplicate keeps the first strategy and the best similarity
        let b = &ranked[2];
        assert_eq!(b.strategy, Strategy::Direct);
        assert!(b.direct);
        assert_eq!(b.similarity(), 0.95);
    }

    #[test]
    fn test_assemble_context_format_and_budget() {
        let candidates: Vec<Candidate> = ["a", "b", "a", "c"]
            .iter()
            .map(|id| Candidate {
                chunk: StoredChunk {
                    content: "x".repeat(100),
                    ..stored(id, "s.pdf", None)
                },
                strategy: Strategy::Vector,
                sector: false,
                hinted: false,
                direct: false,
            })
            .collect();

        let context = assemble_context(&candidates, 100_000);
        let blocks: Vec<&str> = context.split(CONTEXT_SEPARATOR).collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("[Kaynak: s.pdf | ID: a]\n"));
        assert!(blocks[1].starts_with("[Kaynak: s.pdf | ID: b]\n"));

        // one block is 23 + 1 + 100 chars; two blocks need 124 + 7 + 124
        let one = assemble_context(&candidates, 254);
        assert_eq!(char_len(&one), 124);
        let two = assemble_context(&candidates, 255);
        assert_eq!(char_len(&two), 255);

        assert_eq!(assemble_context(&candidates, 50), "");
        assert_eq!(assemble_context(&[], 1000), "");
    }

    #[test]
    fn test_oversized_block_does_not_empty_context() {
        let candidate = |id: &str, chars: usize| Candidate {
            chunk: StoredChunk {
                content: "y".repeat(chars),
                ..stored(id, "9903_karar.pdf", None)
            },
            strategy: Strategy::Direct,
            sector: false,
            hinted: true,
            direct: true,
        };
        let candidates = vec![
            candidate("9903_karar_article_2", 19_200),
            candidate("9903_karar_article_2_p_1", 300),
            candidate("9903_karar_article_3", 17_700),
            candidate("9903_karar_article_4", 200),
        ];

        let context = assemble_context(&candidates, 18_000);
        assert!(!context.contains("ID: 9903_karar_article_2]"));
        assert!(context.starts_with("[Kaynak: 9903_karar.pdf | ID: 9903_karar_article_2_p_1]"));
        // article 3 no longer fits after the paragraph, article 4 still does
        assert!(!context.contains("ID: 9903_karar_article_3]"));
        assert!(context.contains("ID: 9903_karar_article_4]"));
        assert!(char_len(&context) <= 18_000);
    }

    #[tokio::test]
    async fn test_long_article_still_yields_context() {
        let store = Arc::new(MemoryChunkStore::new());
        let rows = [
            chunk(
                "9903_karar_article_2",
                &format!("MADDE 2 - Tanımlar\n\n{}", "Belge: yatırım teşvik belgesi. ".repeat(600)),
                "9903_karar.pdf",
                UnitType::Article,
                None,
            ),
            chunk(
                "9903_karar_article_2_p_1",
                "MADDE 2 / Paragraf 1\nBu Kararda geçen tanımlar.",
                "9903_karar.pdf",
                UnitType::Article,
                None,
            ),
        ];
        assert!(char_len(&rows[0].text) > 18_000);
        for c in &rows {
            store.upsert(c, &[0.0, 0.0, 0.0, 0.1]).await.unwrap();
        }

        let context = retriever(store, Arc::new(KeywordEmbedder))
            .retrieve("9903 madde 2")
            .await;
        assert!(context.contains("9903_karar_article_2_p_1"));
        assert!(char_len(&context) <= RetrievalConfig::default().max_context_chars);
    }

    #[tokio::test]
    async fn test_source_loyalty() {
        let store = corpus().await;
        let retriever = retriever(store, Arc::new(KeywordEmbedder));

        let ranked = retriever
            .retrieve_ranked("Proje Bazlı kararda KDV istisnası madde 5")
            .await;
        assert!(!ranked.is_empty());

        let first_other = ranked.iter().position(|c| !c.hinted).unwrap_or(ranked.len());
        assert!(ranked[..first_other]
            .iter()
            .all(|c| c.source() == "2016-9495_Proje_Bazli.pdf"));
        assert!(ranked[first_other..].iter().all(|c| !c.hinted));
        assert_eq!(ranked[0].id(), "2016_9495_proje_bazli_article_5");
    }

    #[tokio::test]
    async fn test_direct_lookup_with_hint() {
        let store = corpus().await;
        let retriever = retriever(store, Arc::new(KeywordEmbedder));

        let ranked = retriever.retrieve_ranked("9903 madde 5 ne diyor").await;
        let direct: Vec<&str> = ranked.iter().filter(|c| c.direct).map(|c| c.id()).collect();
        assert_eq!(direct, vec!["9903_karar_article_5", "9903_karar_article_5_p_1"]);
        assert!(ranked[0].direct && ranked[1].direct);
    }

    #[tokio::test]
    async fn test_nace_ancestor_search() {
        let store = corpus().await;
        let retriever = retriever(store, Arc::new(KeywordEmbedder));

        let ranked = retriever.retrieve_ranked("23.41.12 hedef yatırım mı?").await;
        let sector: Vec<&str> = ranked
            .iter()
            .filter(|c| c.sector)
            .map(|c| c.chunk.metadata.nace.as_deref().unwrap_or(""))
            .collect();

        assert!(sector.contains(&"23"));
        assert!(sector.contains(&"23.41"));
        assert!(sector.contains(&"23.41.12"));
        assert!(!sector.contains(&"24"));
        // sector chunks lead
        assert!(ranked[..3].iter().all(|c| c.sector));
    }

    #[tokio::test]
    async fn test_date_is_not_a_sector_code() {
        let r = retriever(corpus().await, Arc::new(KeywordEmbedder));
        let ranked = r
            .retrieve_ranked("9903 sayılı kararda 23.12.2025 tarihinden sonra madde 5 KDV istisnası")
            .await;

        assert!(!ranked.is_empty());
        assert!(ranked.iter().all(|c| !c.sector && c.strategy != Strategy::Nace));
        assert_eq!(ranked[0].source(), "9903_karar.pdf");
        assert!(ranked[0].id().starts_with("9903_karar_article_5"));
    }

    #[tokio::test]
    async fn test_list_query_includes_annexes() {
        let store = corpus().await;
        let retriever = retriever(store, Arc::new(KeywordEmbedder));

        let ranked = retriever.retrieve_ranked("9903 bölge illeri hangileri").await;
        assert!(ranked.iter().any(|c| c.id() == "9903_karar_ek_2_part_1"));
    }

    #[tokio::test]
    async fn test_embedding_outage_degrades() {
        let store = corpus().await;
        let retriever = retriever(store, Arc::new(FailingEmbedder));

        let context = retriever.retrieve("9903 madde 5").await;
        assert!(context.contains("ID: 9903_karar_article_5]"));
        assert!(!context.contains("ytak_article_3"));

        assert_eq!(retriever.retrieve("merhaba").await, "");
    }

    #[tokio::test]
    async fn test_strategy_timeout() {
        let store = corpus().await;
        let retriever = HybridRetriever::new(
            store,
            Arc::new(SlowEmbedder),
            RetrievalConfig {
                strategy_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );

        let started = std::time::Instant::now();
        let context = retriever.retrieve("9903 madde 5").await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(context.contains("9903_karar_article_5"));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let store = corpus().await;
        let retriever = retriever(store.clone(), Arc::new(SlowEmbedder));

        let cancelled = retriever
            .retrieve_cancellable("9903 madde 5", tokio::time::sleep(Duration::from_millis(20)))
            .await;
        assert!(cancelled.is_none());

        let fast = HybridRetriever::new(store, Arc::new(KeywordEmbedder), RetrievalConfig::default());
        let done = fast
            .retrieve_cancellable("9903 madde 5", std::future::pending())
            .await;
        assert!(done.is_some_and(|c| !c.is_empty()));
    }

    #[tokio::test]
    async fn test_budget_respected() {
        let store = Arc::new(MemoryChunkStore::new());
        for i in 0..40 {
            let c = chunk(
                &format!("9903_karar_article_{}", i),
                &format!("MADDE {} - KDV\n\n{}", i, "kdv istisnası ".repeat(100)),
                "9903_karar.pdf",
                UnitType::Article,
                None,
            );
            store.upsert(&c, &[1.0, 0.0, 0.0, 0.1]).await.unwrap();
        }

        let retriever = HybridRetriever::new(
            store,
            Arc::new(KeywordEmbedder),
            RetrievalConfig {
                max_context_chars: 5_000,
                ..Default::default()
            },
        );
        let context = retriever.retrieve("kdv istisnası").await;
        assert!(!context.is_empty());
        assert!(char_len(&context) <= 5_000);
    }
}

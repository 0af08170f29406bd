//! tesvik-rag - hybrid RAG core for Turkish investment-incentive legislation
//!
//! Legal PDF text is parsed into articles, definitions and annexes, chunked
//! with stable ids, embedded and stored. Questions are answered with a
//! source-loyal context assembled from vector, direct, keyword and NACE
//! lookups.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod parsing;
pub mod retrieval;
pub mod text;

// Re-exports
pub use config::RagConfig;
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, OpenAiEmbedding};
pub use error::RetrievalError;
pub use knowledge::{
    Chunk, ChunkConfig, ChunkMetadata, ChunkStore, Chunker, IngestOptions, IngestReport,
    Ingestor, LocalChunkStore, MemoryChunkStore, StoredChunk, UnitType,
};
pub use parsing::{parse_sector_table, parse_structure, DocumentTree, SectorRecord};
pub use retrieval::{build_system_prompt, HybridRetriever, QueryAnalysis, RetrievalConfig};

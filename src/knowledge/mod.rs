//! Knowledge module - chunking and chunk storage
//!
//! - Chunker: document tree → retrieval units with stable ids
//! - ChunkStore: storage capability the retriever reads through
//! - SQLite: chunk rows, metadata, keyword / article / NACE lookups
//! - LanceDB: chunk embeddings (cosine nearest neighbour)
//! - Ingest: extract → chunk → embed → upsert

mod chunker;
mod ingest;
mod lance;
mod local;
mod memory;
mod store;
mod vector;

// Re-exports
pub use chunker::{split_recursive, Chunk, ChunkConfig, ChunkMetadata, Chunker, UnitType};
pub use ingest::{chunk_source, content_fingerprint, IngestOptions, IngestReport, Ingestor};
pub use lance::{LanceVectorStore, VectorHit};
pub use local::LocalChunkStore;
pub use memory::MemoryChunkStore;
pub use store::{KnowledgeStore, StoreStats};
pub use vector::{
    article_id_matches, cosine_similarity, nace_related, source_key, source_matches_hint,
    ChunkStore, SourceCount, StoredChunk, EMBEDDING_DIMENSION,
};

//! Retrieval module - question → ranked chunks → context string
//!
//! - Query: source hints, article references, intents, keywords, NACE code
//! - Hybrid: concurrent strategies, source-loyal ranking, budgeted context
//! - Prompt: system prompt around the context

mod hybrid;
mod prompt;
mod query;

// Re-exports
pub use hybrid::{
    assemble_context, rank_candidates, render_candidate, Candidate, HybridRetriever,
    RetrievalConfig, Strategy, StrategyResults, CONTEXT_SEPARATOR,
};
pub use prompt::{build_system_prompt, DOCUMENT_CATALOGUE, NO_CONTEXT_MESSAGE};
pub use query::{extract_keywords, nace_ancestors, QueryAnalysis};

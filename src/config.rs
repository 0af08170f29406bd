//! Runtime configuration
//!
//! Everything has a default; `TESVIK_RAG_*` environment variables override.
//! Unparseable values are reported and ignored.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::knowledge::ChunkConfig;
use crate::retrieval::RetrievalConfig;

const ENV_DATA_DIR: &str = "TESVIK_RAG_DATA_DIR";
const ENV_MAX_CHUNK_CHARS: &str = "TESVIK_RAG_MAX_CHUNK_CHARS";
const ENV_ANNEX_CHUNK_CHARS: &str = "TESVIK_RAG_ANNEX_CHUNK_CHARS";
const ENV_VECTOR_TOP_K: &str = "TESVIK_RAG_VECTOR_TOP_K";
const ENV_MAX_CONTEXT_CHARS: &str = "TESVIK_RAG_MAX_CONTEXT_CHARS";
const ENV_STRATEGY_TIMEOUT_SECS: &str = "TESVIK_RAG_STRATEGY_TIMEOUT_SECS";

/// Default data directory (`~/.local/share/.tesvik-rag` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tesvik-rag")
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// SQLite + LanceDB location
    pub data_dir: PathBuf,
    pub chunk: ChunkConfig,
    pub retrieval: RetrievalConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl RagConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup(name)`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        override_with(&lookup, ENV_MAX_CHUNK_CHARS, &mut config.chunk.max_chars);
        override_with(&lookup, ENV_ANNEX_CHUNK_CHARS, &mut config.chunk.annex_max_chars);
        override_with(&lookup, ENV_VECTOR_TOP_K, &mut config.retrieval.vector_top_k);
        override_with(
            &lookup,
            ENV_MAX_CONTEXT_CHARS,
            &mut config.retrieval.max_context_chars,
        );

        let mut timeout_secs = config.retrieval.strategy_timeout.as_secs();
        override_with(&lookup, ENV_STRATEGY_TIMEOUT_SECS, &mut timeout_secs);
        config.retrieval.strategy_timeout = Duration::from_secs(timeout_secs);

        config
    }
}

/// Replace `target` with the parsed variable; zero counts as invalid
fn override_with<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => *target = value,
        _ => tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, target),
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Retrieval strategy errors
//!
//! A strategy failure never escapes the retriever: it is logged and the
//! strategy contributes no candidates.

use std::time::Duration;

/// Ways a single retrieval strategy can fail
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Query embedding failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Store read failed
    #[error("store error: {0}")]
    Store(String),

    /// Strategy did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl RetrievalError {
    pub fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{:#}", err))
    }

    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

/// Result type for retrieval strategies
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RetrievalError::store(anyhow::anyhow!("disk I/O error"));
        assert_eq!(err.to_string(), "store error: disk I/O error");

        let err = RetrievalError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "timed out after 15s");
    }
}

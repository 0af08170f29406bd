//! LanceDB Vector Store - chunk embeddings keyed by chunk id
//!
//! Only ids, source labels and vectors live here; text and metadata are in
//! the SQLite chunk table. Vectors are L2-normalised on the way in, so the
//! default (squared L2) distance converts to cosine similarity exactly.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::EMBEDDING_DIMENSION;

/// Vector table name
const TABLE_NAME: &str = "chunk_vectors";

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    /// Cosine similarity (-1.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB vector table
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// Open the LanceDB directory
    ///
    /// # Arguments
    /// * `path` - .lance directory path
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    fn to_batch(chunk_id: &str, source: &str, embedding: &[f32]) -> Result<RecordBatch> {
        if embedding.len() != EMBEDDING_DIMENSION as usize {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                EMBEDDING_DIMENSION,
                embedding.len()
            );
        }

        let values = Float32Array::from(normalize(embedding));
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(vec![chunk_id])),
                Arc::new(StringArray::from(vec![source])),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<Option<lancedb::table::Table>> {
        if !self.table_exists().await {
            return Ok(None);
        }

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open vector table")?;
        Ok(Some(table))
    }

    /// Insert or replace the vector of one chunk
    pub async fn upsert(&self, chunk_id: &str, source: &str, embedding: &[f32]) -> Result<()> {
        let batch = Self::to_batch(chunk_id, source, embedding)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match self.open_table().await? {
            Some(table) => {
                table
                    .delete(&format!("chunk_id = '{}'", escape_literal(chunk_id)))
                    .await
                    .context("Failed to delete previous vector")?;
                table
                    .add(batches)
                    .execute()
                    .await
                    .context("Failed to add vector to table")?;
            }
            None => {
                self.db
                    .create_table(TABLE_NAME, batches)
                    .execute()
                    .await
                    .context("Failed to create vector table")?;
            }
        }

        Ok(())
    }

    /// Nearest chunk ids, most similar first
    pub async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let results = table
            .vector_search(normalize(query_embedding))
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut hits = Vec::new();

        for batch in batches {
            let ids = batch
                .column_by_name("chunk_id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_id column"))?;

            // _distance is added by LanceDB (squared L2)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                hits.push(VectorHit {
                    chunk_id: ids.value(i).to_string(),
                    similarity: similarity_from_distance(distances.value(i)),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }

    /// Delete every vector of a source
    pub async fn delete_source(&self, source: &str) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let filter = format!("source = '{}'", escape_literal(source));
        let before = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count source vectors")?;

        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;

        Ok(before)
    }

    pub async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Unit-length copy of a vector (zero vectors are returned unchanged)
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// For unit vectors: |a - b|² = 2 - 2·cos
fn similarity_from_distance(squared_l2: f32) -> f32 {
    1.0 - squared_l2 / 2.0
}

/// SQL string literal escaping for Lance filters
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSION as usize];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_similarity_from_distance() {
        assert!((similarity_from_distance(0.0) - 1.0).abs() < 1e-6);
        assert!(similarity_from_distance(2.0).abs() < 1e-6);
        assert!((similarity_from_distance(4.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("Bakan'lık.pdf"), "Bakan''lık.pdf");
    }

    #[test]
    fn test_dimension_checked() {
        assert!(LanceVectorStore::to_batch("a", "s", &[1.0, 2.0]).is_err());
    }

    #[tokio::test]
    async fn test_lance_upsert_search_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&axis(0), 3).await.unwrap().is_empty());

        store.upsert("a", "one.pdf", &axis(0)).await.unwrap();
        store.upsert("b", "one.pdf", &axis(1)).await.unwrap();
        store.upsert("c", "two.pdf", &axis(2)).await.unwrap();
        // replacing keeps one row per chunk id
        store.upsert("a", "one.pdf", &axis(0)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.search(&axis(0), 2).await.unwrap();
        assert_eq!(hits[0].chunk_id, "a");
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);

        assert_eq!(store.delete_source("one.pdf").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}

//! Knowledge Store - rusqlite chunk table
//!
//! Holds chunk text, metadata JSON and a folded copy of the text used for
//! keyword matching, plus one content fingerprint per ingested source.
//! Default location: <data dir>/knowledge.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;

use super::chunker::{Chunk, ChunkMetadata};
use super::vector::{article_id_matches, source_key, SourceCount, StoredChunk};
use crate::text::fold_turkish;

const SELECT_COLUMNS: &str = "SELECT id, content, metadata FROM chunks";

// ============================================================================
// Types
// ============================================================================

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub source_count: usize,
    pub total_content_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// SQLite chunk table
///
/// Synchronous; the async [`super::LocalChunkStore`] pairs it with the
/// LanceDB vector table.
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
    /// Open the store (created when missing)
    ///
    /// # Arguments
    /// * `path` - database file path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// Schema initialisation
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                source TEXT NOT NULL,
                source_key TEXT NOT NULL,
                unit_type TEXT NOT NULL,
                nace TEXT,
                search_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create chunks table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
            [],
        )
        .context("Failed to create source index")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chunks_unit_type ON chunks(unit_type)",
            [],
        )
        .context("Failed to create unit type index")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sources (
                source TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create sources table")?;

        tracing::debug!("Knowledge store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// Insert or replace a chunk (keyed by id)
    pub fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let conn = self.lock()?;
        let metadata =
            serde_json::to_string(&chunk.metadata).context("Failed to serialize metadata")?;

        conn.execute(
            "INSERT INTO chunks (id, content, metadata, source, source_key, unit_type, nace, search_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata = excluded.metadata,
                source = excluded.source,
                source_key = excluded.source_key,
                unit_type = excluded.unit_type,
                nace = excluded.nace,
                search_text = excluded.search_text,
                created_at = excluded.created_at",
            params![
                chunk.id,
                chunk.text,
                metadata,
                chunk.metadata.source,
                source_key(&chunk.metadata.source),
                chunk.metadata.unit_type.as_str(),
                chunk.metadata.nace,
                fold_turkish(&chunk.text),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to upsert chunk")?;

        Ok(())
    }

    /// Chunks by id, in the order of `ids`; unknown ids are skipped
    pub fn get_chunks(&self, ids: &[String]) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;

        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = stmt.query_row(params![id], row_to_chunk).optional()? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Article chunks for an article number, ordered by id
    pub fn find_article(
        &self,
        number: &str,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        let safe = number.split_whitespace().collect::<Vec<_>>().join("_");
        let conn = self.lock()?;

        // coarse filter in SQL, exact boundary check below
        let mut stmt = conn.prepare(&format!(
            "{} WHERE unit_type = 'article'
               AND (instr(id, ?1) > 0 OR instr(id, ?2) > 0)
               AND (?3 IS NULL OR instr(source_key, ?3) > 0)
             ORDER BY id ASC",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(
                params![
                    format!("_article_{}", safe),
                    format!("_article_Geçici_{}", safe),
                    source_hint,
                ],
                row_to_chunk,
            )?
            .filter_map(|r| r.ok())
            .filter(|chunk| article_id_matches(&chunk.id, number))
            .take(limit)
            .collect();

        Ok(rows)
    }

    /// Chunks containing every folded term; annexes first
    pub fn find_keywords(
        &self,
        terms: &[String],
        include_annexes: bool,
        source_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredChunk>> {
        if terms.is_empty() && !include_annexes {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        for term in terms {
            values.push(Value::Text(fold_turkish(term)));
            clauses.push(format!("instr(search_text, ?{}) > 0", values.len()));
        }
        let terms_clause = if clauses.is_empty() {
            "0".to_string()
        } else {
            clauses.join(" AND ")
        };
        let annex_clause = if include_annexes {
            " OR unit_type = 'annex'"
        } else {
            ""
        };

        let hint_clause = match source_hint {
            Some(hint) => {
                values.push(Value::Text(hint.to_string()));
                format!(" AND instr(source_key, ?{}) > 0", values.len())
            }
            None => String::new(),
        };

        values.push(Value::Integer(limit as i64));
        let sql = format!(
            "{} WHERE (({}){}){}
             ORDER BY (unit_type = 'annex') DESC, id ASC
             LIMIT ?{}",
            SELECT_COLUMNS,
            terms_clause,
            annex_clause,
            hint_clause,
            values.len()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_chunk)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Sector chunks whose code is an ancestor or descendant of `code`
    pub fn find_nace(&self, code: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE unit_type = 'sector' AND nace IS NOT NULL
               AND (nace = ?1 OR nace LIKE ?1 || '.%' OR ?1 LIKE nace || '.%')
             ORDER BY nace ASC, id ASC
             LIMIT ?2",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![code, limit as i64], row_to_chunk)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Delete every chunk of a source
    pub fn delete_source(&self, source: &str) -> Result<usize> {
        let conn = self.lock()?;
        let rows = conn
            .execute("DELETE FROM chunks WHERE source = ?1", params![source])
            .context("Failed to delete source chunks")?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Chunk count per source
    pub fn source_counts(&self) -> Result<Vec<SourceCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(*) FROM chunks GROUP BY source ORDER BY source ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SourceCount {
                    source: row.get(0)?,
                    chunks: row.get::<_, i64>(1)? as usize,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    pub fn source_fingerprint(&self, source: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let fingerprint = conn
            .query_row(
                "SELECT fingerprint FROM sources WHERE source = ?1",
                params![source],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fingerprint)
    }

    pub fn set_source_fingerprint(&self, source: &str, fingerprint: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sources (source, fingerprint, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                updated_at = excluded.updated_at",
            params![source, fingerprint, Utc::now().to_rfc3339()],
        )
        .context("Failed to record source fingerprint")?;
        Ok(())
    }

    /// Store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let (count, total_size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(content AS BLOB))), 0) FROM chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0));

        let sources: i64 = conn
            .query_row("SELECT COUNT(DISTINCT source) FROM chunks", [], |row| row.get(0))
            .unwrap_or(0);

        Ok(StoreStats {
            chunk_count: count as usize,
            source_count: sources as usize,
            total_content_bytes: total_size as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<StoredChunk> {
    let metadata: String = row.get(2)?;
    let metadata: ChunkMetadata = serde_json::from_str(&metadata)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(StoredChunk {
        id: row.get(0)?,
        content: row.get(1)?,
        metadata,
        similarity: None,
    })
}

// ============================================================================
// Tests
// ============================================================================

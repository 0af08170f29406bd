//! Chunker - document tree → retrieval units
//!
//! Every article, sub-unit, definition, annex and sector record becomes one
//! or more [`Chunk`]s with a stable id and provenance metadata. Oversized
//! text goes through [`split_recursive`], which never emits a piece longer
//! than its limit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::parsing::{DocumentTree, SectorRecord};
use crate::text::{char_len, slugify};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// Size limits in characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Articles, sub-units, definitions and sector records
    pub max_chars: usize,
    /// Annexes (long enumerations: provinces, sectors)
    pub annex_max_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 20_000,
            annex_max_chars: 4_000,
        }
    }
}

// ============================================================================
// Chunk Types
// ============================================================================

/// Kind of structural unit a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Article,
    Annex,
    Definition,
    Sector,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Article => "article",
            UnitType::Annex => "annex",
            UnitType::Definition => "definition",
            UnitType::Sector => "sector",
        }
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance stored next to every chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Id of the unit the chunk belongs to (parent article for sub-units)
    pub document_id: String,
    pub unit_type: UnitType,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_units: Vec<String>,
    /// Source label, usually the file name
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nace: Option<String>,
}

/// Unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// Retrievable text including its header line
    pub text: String,
    pub metadata: ChunkMetadata,
}

// ============================================================================
// Chunker
// ============================================================================

/// Document tree chunker
///
/// Ids are `<prefix>_article_<n>`, `<articleId>_p_<label>`,
/// `<prefix>_definition_<term>`, `<prefix>_<annexKey>_part_<n>` and
/// `<prefix>_nace_<code>`, where the prefix is the slug of the source label.
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Chunk a parsed legal document
    ///
    /// # Arguments
    /// * `tree` - output of the structure parser
    /// * `source` - source label stored in every chunk's metadata
    pub fn chunk(&self, tree: &DocumentTree, source: &str) -> Vec<Chunk> {
        let prefix = slugify(source);
        let mut ids = IdRegistry::default();
        let mut chunks = Vec::new();

        // 1. Articles and their sub-units
        for article in &tree.articles {
            let article_id = ids.claim(format!("{}_article_{}", prefix, safe_id(&article.number)));
            let topic = if article.title.is_empty() {
                format!("MADDE {}", article.number)
            } else {
                article.title.clone()
            };

            let text = format!("MADDE {} - {}\n\n{}", article.number, article.title, article.body);
            let metadata = ChunkMetadata {
                document_id: article_id.clone(),
                unit_type: UnitType::Article,
                topic: topic.clone(),
                linked_units: Vec::new(),
                source: source.to_string(),
                nace: None,
            };
            self.push_split(&mut chunks, &mut ids, &article_id, &text, metadata);

            for sub in &article.subclauses {
                let sub_id = ids.claim(format!("{}_p_{}", article_id, safe_id(&sub.label)));
                let sub_topic = subclause_topic(&sub.label, &sub.text)
                    .unwrap_or_else(|| format!("{} (Prg. {})", topic, sub.label));

                let text = format!("MADDE {} / Paragraf {}\n{}", article.number, sub.label, sub.text);
                let metadata = ChunkMetadata {
                    document_id: article_id.clone(),
                    unit_type: UnitType::Article,
                    topic: sub_topic,
                    linked_units: vec![article_id.clone()],
                    source: source.to_string(),
                    nace: None,
                };
                self.push_split(&mut chunks, &mut ids, &sub_id, &text, metadata);
            }
        }

        // 2. One chunk per definition
        for (term, definition) in &tree.definitions {
            let id = ids.claim(format!("{}_definition_{}", prefix, safe_id(term)));
            let text = format!("TANIM: {}\n{}", term, definition);
            let metadata = ChunkMetadata {
                document_id: id.clone(),
                unit_type: UnitType::Definition,
                topic: term.clone(),
                linked_units: Vec::new(),
                source: source.to_string(),
                nace: None,
            };
            self.push_split(&mut chunks, &mut ids, &id, &text, metadata);
        }

        // 3. Annexes, always part-numbered
        for annex in &tree.annexes {
            let document_id = format!("{}_{}", prefix, annex.key);
            let full_text = format!("{}\n{}", annex.title, annex.body);

            for (i, part) in split_recursive(&full_text, self.config.annex_max_chars)
                .into_iter()
                .enumerate()
            {
                chunks.push(Chunk {
                    id: ids.claim(format!("{}_part_{}", document_id, i + 1)),
                    text: part,
                    metadata: ChunkMetadata {
                        document_id: document_id.clone(),
                        unit_type: UnitType::Annex,
                        topic: format!("{} (Bölüm {})", annex.title, i + 1),
                        linked_units: Vec::new(),
                        source: source.to_string(),
                        nace: None,
                    },
                });
            }
        }

        tracing::debug!(
            "Chunked {}: {} articles, {} definitions, {} annexes → {} chunks",
            source,
            tree.articles.len(),
            tree.definitions.len(),
            tree.annexes.len(),
            chunks.len()
        );

        chunks
    }

    /// Chunk sector table records, one chunk per NACE code
    pub fn chunk_sector_records(&self, records: &[SectorRecord], source: &str) -> Vec<Chunk> {
        let prefix = slugify(source);
        let mut ids = IdRegistry::default();
        let mut chunks = Vec::new();

        for record in records {
            let id = ids.claim(format!("{}_nace_{}", prefix, safe_id(&record.nace_code)));
            let metadata = ChunkMetadata {
                document_id: id.clone(),
                unit_type: UnitType::Sector,
                topic: record.topic.clone(),
                linked_units: Vec::new(),
                source: source.to_string(),
                nace: Some(record.nace_code.clone()),
            };
            self.push_split(&mut chunks, &mut ids, &id, &render_sector_record(record), metadata);
        }

        tracing::debug!("Chunked {} sector records from {}", chunks.len(), source);
        chunks
    }

    /// Push `text` as a single chunk, or as `_part_<n>` chunks when too long
    fn push_split(
        &self,
        chunks: &mut Vec<Chunk>,
        ids: &mut IdRegistry,
        id: &str,
        text: &str,
        metadata: ChunkMetadata,
    ) {
        let parts = split_recursive(text, self.config.max_chars);

        if parts.len() == 1 {
            chunks.extend(parts.into_iter().map(|text| Chunk {
                id: id.to_string(),
                text,
                metadata: metadata.clone(),
            }));
            return;
        }

        for (i, part) in parts.into_iter().enumerate() {
            chunks.push(Chunk {
                id: ids.claim(format!("{}_part_{}", id, i + 1)),
                text: part,
                metadata: metadata.clone(),
            });
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Collision-free id assignment: repeats get `_v2`, `_v3`, ...
#[derive(Debug, Default)]
struct IdRegistry {
    seen: HashMap<String, usize>,
}

impl IdRegistry {
    fn claim(&mut self, base: String) -> String {
        let Some(count) = self.seen.get(&base).copied() else {
            self.seen.insert(base.clone(), 1);
            return base;
        };

        let mut count = count;
        loop {
            count += 1;
            let candidate = format!("{}_v{}", base, count);
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(base, count);
                self.seen.insert(candidate.clone(), 1);
                return candidate;
            }
        }
    }
}

// ============================================================================
// Recursive Splitter
// ============================================================================

/// Split text into pieces of at most `max_chars` characters
///
/// Paragraphs (blank-line separated) are packed greedily; a paragraph that
/// is still too long is packed line by line; a line that is still too long
/// is hard-sliced. Whitespace-only paragraphs and lines are dropped.
pub fn split_recursive(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    pack(text.split("\n\n"), "\n\n", max_chars)
        .into_iter()
        .flat_map(|chunk| {
            if char_len(&chunk) <= max_chars {
                vec![chunk]
            } else {
                split_by_line(&chunk, max_chars)
            }
        })
        .collect()
}

fn split_by_line(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    // lines that fit are packed; pathological lines are sliced in place
    let mut fitting: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if char_len(line) <= max_chars {
            fitting.push(line);
            continue;
        }
        chunks.extend(pack(fitting.drain(..), "\n", max_chars));
        chunks.extend(hard_slice(line, max_chars));
    }
    chunks.extend(pack(fitting.into_iter(), "\n", max_chars));

    chunks
}

/// Greedy packing of pieces joined by `separator`
fn pack<'a>(pieces: impl Iterator<Item = &'a str>, separator: &str, max_chars: usize) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces {
        if piece.trim().is_empty() {
            continue;
        }
        let piece_len = char_len(piece);

        if current.is_empty() {
            current.push_str(piece);
            current_len = piece_len;
        } else if current_len + separator_len + piece_len <= max_chars {
            current.push_str(separator);
            current.push_str(piece);
            current_len += separator_len + piece_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(piece);
            current_len = piece_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Fixed-width slices on char boundaries
fn hard_slice(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|slice| slice.iter().collect::<String>())
        .filter(|slice| !slice.trim().is_empty())
        .collect()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Whitespace runs → `_`
fn safe_id(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Heading of a colon-headed sub-unit (`Yatırım Yeri Tahsisi: ...`)
fn subclause_topic(label: &str, text: &str) -> Option<String> {
    if !label.starts_with("ek_") {
        return None;
    }
    let (heading, _) = text.split_once(':')?;
    let heading = heading.trim();
    (!heading.is_empty()).then(|| heading.to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "EVET"
    } else {
        "HAYIR"
    }
}

fn render_sector_record(record: &SectorRecord) -> String {
    format!(
        "NACE KODU: {}\n\
         YATIRIM KONUSU: {}\n\
         HEDEF YATIRIM: {}\n\
         ÖNCELİKLİ YATIRIM: {}\n\
         YÜKSEK TEKNOLOJİ: {}\n\
         ORTA-YÜKSEK TEKNOLOJİ: {}\n\
         TEKNOLOJİ HAMLESİ: {}\n\
         YATIRIM ŞARTLARI: {}\n\
         ASGARİ YATIRIM TUTARLARI: {}",
        record.nace_code,
        record.topic,
        yes_no(record.is_target_investment),
        yes_no(record.is_priority_investment),
        yes_no(record.is_high_tech),
        yes_no(record.is_mid_high_tech),
        yes_no(record.is_tech_move_program),
        record.conditions,
        record.minimum_investment_by_region
    )
}

// ============================================================================
// Tests
// ============================================================================

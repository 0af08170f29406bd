//! Parsing module - raw document text → typed structures
//!
//! - Structure: legislation text → articles, definitions, annexes
//! - Sector: NACE reference table → sector records
//! - Tree: shared data model

mod sector;
mod structure;
mod tree;

// Re-exports
pub use sector::{is_sector_table, parse_sector_table, RECORD_LABEL};
pub use structure::{
    parse_definitions, parse_structure, parse_subclauses, CallCategory, GENERAL_ARTICLE_NUMBER,
    GENERAL_ARTICLE_TITLE,
};
pub use tree::{Annex, Article, DocumentInfo, DocumentTree, SectorRecord, Subclause};

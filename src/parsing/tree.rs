//! Document tree produced by the structure parser

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Descriptive fields about the parsed document (informational only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// First meaningful line of the document, usually the instrument name
    pub name: String,
    /// Year or date mentioned near the top of the document
    pub date: Option<String>,
}

/// Hierarchical view of a legal document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub info: DocumentInfo,
    pub articles: Vec<Article>,
    /// term → definition, filled only when a Definitions article exists
    pub definitions: BTreeMap<String, String>,
    /// Ordered annexes with unique keys (`ek_2`, `ek_4`, ...)
    pub annexes: Vec<Annex>,
}

impl DocumentTree {
    /// Annex by key
    pub fn annex(&self, key: &str) -> Option<&Annex> {
        self.annexes.iter().find(|a| a.key == key)
    }

    /// First article with the given number
    pub fn article(&self, number: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.number == number)
    }
}

/// One article (MADDE) of a legal document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// `"5"`, `"Geçici 1"`, or a title fragment for non-standard documents
    pub number: String,
    pub title: String,
    pub body: String,
    pub subclauses: Vec<Subclause>,
}

/// Numbered paragraph `(1)` or colon-headed sub-unit (`ek_N`) of an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subclause {
    pub label: String,
    pub text: String,
}

/// Annex (EK) of a legal document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annex {
    /// `ek_<number>`
    pub key: String,
    pub title: String,
    pub body: String,
}

/// One row of the NACE sector reference table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub nace_code: String,
    pub topic: String,
    pub is_target_investment: bool,
    pub is_priority_investment: bool,
    pub is_high_tech: bool,
    pub is_mid_high_tech: bool,
    pub is_tech_move_program: bool,
    pub conditions: String,
    /// Raw text, one amount per region
    pub minimum_investment_by_region: String,
}

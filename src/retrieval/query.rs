//! Query analysis
//!
//! Everything the retriever needs to know about a question before touching
//! the store: which regulatory instruments it names, which article it points
//! at, whether it asks for a definition or a list, its search terms and a
//! NACE code.

use lazy_static::lazy_static;
use regex::Regex;

use crate::text::{char_len, fold_turkish};

/// Hint keys and the folded query patterns that activate them
///
/// A key is also what a matching source label contains (see
/// [`crate::knowledge::source_matches_hint`]).
const SOURCE_HINT_PATTERNS: [(&str, &str); 5] = [
    ("9903", r"9903"),
    ("9495", r"9495|proje\s*bazli"),
    ("ytak", r"ytak"),
    ("hit30", r"hit\s*-?\s*30"),
    ("cmp", r"\bcmp\b|cazibe"),
];

/// Folded words never used as search terms
const STOP_WORDS: [&str; 9] = [
    "sayili",
    "karar",
    "karari",
    "gore",
    "oldugu",
    "hakkinda",
    "numbered",
    "decision",
    "according",
];

/// Search terms kept per query
const MAX_KEYWORDS: usize = 3;

/// Article the definitions conventionally live in
const DEFINITIONS_ARTICLE: &str = "2";

lazy_static! {
    static ref SOURCE_HINTS: Vec<(&'static str, Regex)> = SOURCE_HINT_PATTERNS
        .iter()
        .map(|(key, pattern)| (*key, Regex::new(pattern).unwrap()))
        .collect();

    /// `geçici madde 3`, `madde 5`, `5. madde`, `article 5`
    static ref PROVISIONAL_REF: Regex =
        Regex::new(r"(?:gecici\s+madde|provisional\s+article)\s*(\d+)").unwrap();
    static ref ARTICLE_REF: Regex =
        Regex::new(r"(?:madde|article)\s*(\d+)|\b(\d+)\s*\.\s*madde").unwrap();

    static ref DEFINITION_INTENT: Regex =
        Regex::new(r"tanim|nedir|ne\s*demek|un\s*anlami|what\s+is|definition\s+of").unwrap();
    static ref LIST_INTENT: Regex = Regex::new(
        r"liste|hangileri|iller|ilceler|ekler|ekleri|\blist|which\s+ones|provinces|annexes"
    )
    .unwrap();

    /// `23.41`, `23,41,12`
    static ref NACE_DOTTED: Regex =
        Regex::new(r"\b(\d{2})[.,](\d{2})(?:[.,](\d{2}))?\b").unwrap();
    /// `23`, `2341`, `234112` (only next to the word "nace")
    static ref NACE_BARE: Regex = Regex::new(r"\b(\d{6}|\d{4}|\d{2})\b").unwrap();
}

// ============================================================================
// QueryAnalysis
// ============================================================================

/// What a user question asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnalysis {
    /// Folded query text
    pub normalized: String,
    /// Active source hint keys, in table order
    pub hints: Vec<&'static str>,
    /// Explicitly referenced article (`"5"`, `"Geçici 3"`)
    pub article: Option<String>,
    pub definition_intent: bool,
    pub list_intent: bool,
    /// Up to three folded search terms, in query order
    pub keywords: Vec<String>,
    /// Canonical dotted NACE code (`"23.41.12"`)
    pub nace: Option<String>,
}

impl QueryAnalysis {
    /// Analyse a raw user question
    pub fn analyze(query: &str) -> Self {
        let normalized = fold_turkish(query);

        let hints = SOURCE_HINTS
            .iter()
            .filter(|(_, re)| re.is_match(&normalized))
            .map(|(key, _)| *key)
            .collect();

        Self {
            hints,
            article: article_reference(&normalized),
            definition_intent: DEFINITION_INTENT.is_match(&normalized),
            list_intent: LIST_INTENT.is_match(&normalized),
            keywords: extract_keywords(&normalized),
            nace: nace_code(&normalized),
            normalized,
        }
    }

    /// Hint used to filter lookups (the first active one)
    pub fn primary_hint(&self) -> Option<&'static str> {
        self.hints.first().copied()
    }

    /// Article number for the direct lookup strategy
    ///
    /// An explicit reference wins; a definition question about a named
    /// instrument falls back to its Definitions article.
    pub fn direct_target(&self) -> Option<String> {
        match &self.article {
            Some(article) => Some(article.clone()),
            None if self.definition_intent && !self.hints.is_empty() => {
                Some(DEFINITIONS_ARTICLE.to_string())
            }
            None => None,
        }
    }

    /// `23.41.12` → `["23", "23.41", "23.41.12"]`
    pub fn nace_ancestors(&self) -> Vec<String> {
        self.nace.as_deref().map(nace_ancestors).unwrap_or_default()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn article_reference(normalized: &str) -> Option<String> {
    if let Some(caps) = PROVISIONAL_REF.captures(normalized) {
        return Some(format!("Geçici {}", &caps[1]));
    }

    ARTICLE_REF
        .captures(normalized)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
}

/// Folded words longer than three characters, minus stop words and numbers
pub fn extract_keywords(normalized: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    // apostrophes split off case suffixes: "karar'a" → "karar", "a"
    for word in normalized.split(|c: char| !c.is_alphanumeric()) {
        if char_len(word) <= 3
            || STOP_WORDS.contains(&word)
            || !word.chars().any(char::is_alphabetic)
            || keywords.iter().any(|k| k == word)
        {
            continue;
        }

        keywords.push(word.to_string());
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }

    keywords
}

fn nace_code(normalized: &str) -> Option<String> {
    let dotted = NACE_DOTTED
        .captures_iter(normalized)
        .find(|caps| caps.get(0).is_some_and(|m| stands_alone(normalized, m.start(), m.end())));
    if let Some(caps) = dotted {
        let segments: Vec<&str> = (1..=3)
            .filter_map(|i| caps.get(i).map(|m| m.as_str()))
            .collect();
        return Some(segments.join("."));
    }

    if !normalized.contains("nace") {
        return None;
    }

    NACE_BARE
        .captures_iter(normalized)
        .find(|caps| caps.get(0).is_some_and(|m| stands_alone(normalized, m.start(), m.end())))
        .map(|caps| {
            let digits = &caps[1];
            digits
                .as_bytes()
                .chunks(2)
                .filter_map(|pair| std::str::from_utf8(pair).ok())
                .collect::<Vec<_>>()
                .join(".")
        })
}

/// Whether `text[start..end]` is not part of a longer dotted number
///
/// `31.12.2025` and `1.234.567` continue past the match with `[.,]<digit>`
/// (or lead into it with `<digit>[.,]`); those are dates and amounts.
fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    !continues_number(text[..start].chars().rev()) && !continues_number(text[end..].chars())
}

/// `[.,]` followed by a digit, walking away from the match
fn continues_number(mut chars: impl Iterator<Item = char>) -> bool {
    matches!(chars.next(), Some('.' | ','))
        && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Every prefix level of a dotted code, shortest first
pub fn nace_ancestors(code: &str) -> Vec<String> {
    let segments: Vec<&str> = code.split('.').filter(|s| !s.is_empty()).collect();
    (1..=segments.len())
        .map(|n| segments[..n].join("."))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

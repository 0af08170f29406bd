//! Structure Parser - legal PDF text → [`DocumentTree`]
//!
//! Extracted legislation text has no reliable layout. Articles are found by
//! their opening token (`MADDE 5 -`, `GEÇİCİ MADDE 1 -`), the heading sits on
//! the line *above* the token, and annexes (`EK-2`) follow the last article.
//!
//! Parsing never fails. Documents that do not follow the legislation layout
//! fall through to a call-listing parser (`HIT-...` blocks) and finally to a
//! single catch-all article, so every input yields something chunkable.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::tree::{Annex, Article, DocumentInfo, DocumentTree, Subclause};
use crate::text::{char_len, fold_turkish, is_page_number, truncate_chars};

lazy_static! {
    /// Article opening token at the start of a line
    static ref ARTICLE_MARKER: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(GEÇİCİ|Geçici|GECICI|PROVISIONAL|Provisional)[ \t]+)?(?:MADDE|ARTICLE)[ \t]+(\d+)[ \t]*[-–.]*[ \t]*"
    )
    .unwrap();

    /// Annex opening token (`EK-2 Bölgeler`, `ANNEX 4`) and the rest of its line
    static ref ANNEX_MARKER: Regex =
        Regex::new(r"(?m)^[ \t]*(?:EK|ANNEX)[ \t]*[-–]?[ \t]*(\d+)\b([^\n]*)").unwrap();

    /// `(3) text`
    static ref NUMBERED_SUBCLAUSE: Regex = Regex::new(r"^\((\d+)\)\s+(.*)$").unwrap();

    /// `Yatırım Yeri Tahsisi: text`
    static ref COLON_HEADING: Regex =
        Regex::new(r"^[A-ZÇĞİÖŞÜ][^:()\n]{2,}:\s+\S").unwrap();

    /// `a) ` / `(b) ` list marker in front of a defined term
    static ref LIST_MARKER: Regex = Regex::new(r"^\(?[a-zçğıöşü]{1,2}\)\s*").unwrap();

    /// Call identifier opening a block in program guides
    /// (any case, the identifier may wrap onto the next line)
    static ref CALL_MARKER: Regex = Regex::new(r"(?mi)^[ \t]*HIT-\s*[A-Z0-9ÇĞİÖŞÜ]").unwrap();

    static ref YEAR: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").unwrap();
}

/// Number of a catch-all article
pub const GENERAL_ARTICLE_NUMBER: &str = "Genel";
/// Title of a catch-all article
pub const GENERAL_ARTICLE_TITLE: &str = "Döküman İçeriği";

/// Longest defined term accepted; longer left sides are ordinary sentences
const MAX_TERM_CHARS: usize = 50;
/// Longest line accepted as a recovered heading
const MAX_TITLE_CHARS: usize = 150;
/// Fallback article numbers and titles are cut to these lengths
const FALLBACK_NUMBER_CHARS: usize = 50;
const FALLBACK_TITLE_CHARS: usize = 100;

// ============================================================================
// Markers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum MarkerKind {
    Article { number: String, provisional: bool },
    Annex { number: String, rest: String },
}

#[derive(Debug, Clone)]
struct Marker {
    kind: MarkerKind,
    start: usize,
    end: usize,
}

/// All article and annex markers, ordered by position
fn find_markers(text: &str) -> Vec<Marker> {
    let mut markers: Vec<Marker> = ARTICLE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Marker {
                kind: MarkerKind::Article {
                    number: caps.get(2)?.as_str().to_string(),
                    provisional: caps.get(1).is_some(),
                },
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect();

    for caps in ANNEX_MARKER.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        // "EK-2'de sayılan" is a cross reference, not an annex heading
        if rest.starts_with('\'') || rest.starts_with('’') {
            continue;
        }

        markers.push(Marker {
            kind: MarkerKind::Annex {
                number: number.as_str().to_string(),
                rest: rest.trim().to_string(),
            },
            start: whole.start(),
            end: whole.end(),
        });
    }

    markers.sort_by_key(|m| m.start);
    markers
}

// ============================================================================
// Parser
// ============================================================================

/// Parse raw extracted text into a document tree
///
/// Always returns at least one article or annex.
pub fn parse_structure(raw_text: &str) -> DocumentTree {
    let text = raw_text.replace("\r\n", "\n").replace('\r', "\n");

    let mut tree = DocumentTree {
        info: document_info(&text),
        ..Default::default()
    };

    let markers = find_markers(&text);
    let mut previous_end = 0;

    for (i, marker) in markers.iter().enumerate() {
        let body_end = markers.get(i + 1).map(|m| m.start).unwrap_or(text.len());
        let body = text[marker.end..body_end].trim();

        match &marker.kind {
            MarkerKind::Article {
                number,
                provisional,
            } => {
                let title = recover_title(&text[previous_end..marker.start]);
                add_article(&mut tree, number, *provisional, title, body);
            }
            MarkerKind::Annex { number, rest } => {
                add_annex(&mut tree, number, rest, body);
            }
        }

        previous_end = marker.end;
    }

    if tree.articles.is_empty() && tree.annexes.is_empty() {
        tree.articles = parse_call_listing(&text);
        tracing::debug!(
            "No legislation markers found, fallback produced {} blocks",
            tree.articles.len()
        );
    }

    if tree.articles.is_empty() && tree.annexes.is_empty() {
        tree.articles.push(Article {
            number: GENERAL_ARTICLE_NUMBER.to_string(),
            title: GENERAL_ARTICLE_TITLE.to_string(),
            body: text.trim().to_string(),
            subclauses: Vec::new(),
        });
    }

    tree
}

fn add_article(tree: &mut DocumentTree, number: &str, provisional: bool, title: String, body: &str) {
    let (number, title) = if provisional {
        let title = if title.is_empty() {
            "Geçici Madde".to_string()
        } else {
            title
        };
        (format!("Geçici {}", number), title)
    } else {
        (number.to_string(), title)
    };

    if !provisional && is_definitions_title(&title) {
        let definitions = parse_definitions(body);
        tracing::debug!("Article {} holds {} definitions", number, definitions.len());
        tree.definitions.extend(definitions);
    }

    tree.articles.push(Article {
        number,
        title,
        body: body.to_string(),
        subclauses: parse_subclauses(body),
    });
}

fn add_annex(tree: &mut DocumentTree, number: &str, rest: &str, body: &str) {
    let key = format!("ek_{}", number);

    if let Some(existing) = tree.annexes.iter_mut().find(|a| a.key == key) {
        if !body.is_empty() {
            if !existing.body.is_empty() {
                existing.body.push_str("\n\n");
            }
            existing.body.push_str(body);
        }
        return;
    }

    let title = if rest.is_empty() {
        format!("Ek-{}", number)
    } else {
        format!("Ek-{} {}", number, rest)
    };

    tree.annexes.push(Annex {
        key,
        title,
        body: body.to_string(),
    });
}

/// Heading of an article: the last non-empty line above its marker
///
/// Page numbers are skipped. A line that reads like the end of a sentence
/// is body text of the previous article, so the title stays empty.
fn recover_title(preceding: &str) -> String {
    let candidate = preceding
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_page_number(line));

    match candidate {
        Some(line)
            if char_len(line) <= MAX_TITLE_CHARS
                && !line.ends_with(['.', ';', ',']) =>
        {
            line.to_string()
        }
        _ => String::new(),
    }
}

fn is_definitions_title(title: &str) -> bool {
    let folded = fold_turkish(title);
    folded.contains("tanimlar") || folded.contains("definitions")
}

fn document_info(text: &str) -> DocumentInfo {
    let name = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_page_number(line))
        .map(|line| truncate_chars(line, 200))
        .unwrap_or_default();

    let head = truncate_chars(text, 2000);
    let date = YEAR.find(&head).map(|m| m.as_str().to_string());

    DocumentInfo { name, date }
}

// ============================================================================
// Sub-units
// ============================================================================

/// Split an article body into numbered and colon-headed sub-units
///
/// Single left-to-right pass; a line belongs to the most recently opened
/// sub-unit. Lines before the first sub-unit stay in the article body only.
pub fn parse_subclauses(body: &str) -> Vec<Subclause> {
    let mut subclauses = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut heading_counter = 1;

    let flush = |current: &mut Option<(String, Vec<String>)>, out: &mut Vec<Subclause>| {
        if let Some((label, parts)) = current.take() {
            out.push(Subclause {
                label,
                text: parts.join(" ").trim().to_string(),
            });
        }
    };

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = NUMBERED_SUBCLAUSE.captures(line) {
            flush(&mut current, &mut subclauses);
            current = Some((caps[1].to_string(), vec![caps[2].trim().to_string()]));
        } else if COLON_HEADING.is_match(line) {
            flush(&mut current, &mut subclauses);
            current = Some((format!("ek_{}", heading_counter), vec![line.to_string()]));
            heading_counter += 1;
        } else if let Some((_, parts)) = current.as_mut() {
            parts.push(line.to_string());
        }
    }

    flush(&mut current, &mut subclauses);
    subclauses
}

/// `term: definition` lines of a Definitions article
pub fn parse_definitions(body: &str) -> BTreeMap<String, String> {
    let mut definitions = BTreeMap::new();

    for line in body.lines() {
        let Some((left, right)) = line.split_once(':') else {
            continue;
        };

        let term = LIST_MARKER.replace(left.trim(), "").trim().to_string();
        let definition = right.trim();

        if term.is_empty() || definition.is_empty() || char_len(&term) > MAX_TERM_CHARS {
            continue;
        }

        definitions.insert(term, definition.to_string());
    }

    definitions
}

// ============================================================================
// Fallback: call listings
// ============================================================================

/// Status banner of a call-listing section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCategory {
    Open,
    Closed,
}

impl CallCategory {
    pub fn label(self) -> &'static str {
        match self {
            CallCategory::Open => "AÇIK ÇAĞRI",
            CallCategory::Closed => "KAPALI ÇAĞRI",
        }
    }

    /// Banner lines are short and fully upper-case
    fn from_banner(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || char_len(line) > 80 || line.chars().any(char::is_lowercase) {
            return None;
        }

        let folded = fold_turkish(line);
        if folded.contains("kapali cagri") || folded.contains("closed call") {
            Some(CallCategory::Closed)
        } else if folded.contains("acik cagri")
            || folded.contains("aktif cagri")
            || folded.contains("open call")
        {
            Some(CallCategory::Open)
        } else {
            None
        }
    }
}

/// Split a program guide on call identifiers
///
/// Blocks found under a status banner are tagged with it and paired with a
/// short summary article so the status is retrievable on its own.
fn parse_call_listing(text: &str) -> Vec<Article> {
    let starts: Vec<usize> = CALL_MARKER.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Vec::new();
    }

    let mut articles = Vec::new();

    let preamble = &text[..starts[0]];
    let mut category = scan_banners(preamble, None);
    if let Some(article) = call_block_article(preamble, None) {
        articles.push(article);
    }

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let block = &text[start..end];

        if let Some(article) = call_block_article(block, category) {
            if let Some(cat) = category {
                articles.push(call_summary_article(&article, cat));
            }
            articles.push(article);
        }

        category = scan_banners(block, category);
    }

    articles
}

fn scan_banners(block: &str, mut category: Option<CallCategory>) -> Option<CallCategory> {
    for line in block.lines() {
        if let Some(found) = CallCategory::from_banner(line) {
            category = Some(found);
        }
    }
    category
}

fn call_block_article(block: &str, category: Option<CallCategory>) -> Option<Article> {
    // banners describe the blocks after them, not this one
    let content = block
        .lines()
        .filter(|line| CallCategory::from_banner(line).is_none())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = content.trim();
    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let first = lines.first()?;

    // "HIT-" identifiers are often broken over several short lines
    let mut title = first.to_string();
    if fold_turkish(&title).starts_with("hit-")
        && char_len(&title) < 25
        && lines.len() > 1
        && char_len(lines[1]) < 40
    {
        if !title.ends_with('-') {
            title.push(' ');
        }
        title.push_str(lines[1]);
        if lines.len() > 2 && char_len(lines[2]) < 40 && lines[2].starts_with('(') {
            title.push(' ');
            title.push_str(lines[2]);
        }
    }

    let number = truncate_chars(&title, FALLBACK_NUMBER_CHARS);
    let title = truncate_chars(&title, FALLBACK_TITLE_CHARS);

    let (title, body) = match category {
        Some(cat) => (
            format!("{} [{}]", title, cat.label()),
            format!("Çağrı Durumu: {}\n{}", cat.label(), trimmed),
        ),
        None => (title, trimmed.to_string()),
    };

    Some(Article {
        number,
        title,
        body: body.clone(),
        subclauses: parse_subclauses(&body),
    })
}

fn call_summary_article(article: &Article, category: CallCategory) -> Article {
    Article {
        number: format!("{} Özet", article.number),
        title: format!("{} (Özet)", article.title),
        body: format!(
            "{} çağrısının durumu: {}. Bu çağrı {} başlığı altında listelenmektedir.",
            article.number,
            category.label(),
            category.label()
        ),
        subclauses: Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const KARAR: &str = "YATIRIMLARDA DEVLET YARDIMLARI HAKKINDA KARAR
Karar Sayısı: 9903 (2025)
BİRİNCİ BÖLÜM
Amaç ve kapsam
MADDE 1- (1) Bu Kararın amacı yatırımların
desteklenmesidir.
Tanımlar
12
MADDE 2- (1) Bu Kararda geçen;
a) Bakanlık: Sanayi ve Teknoloji Bakanlığını,
b) Yatırım teşvik belgesi: Destek unsurlarını gösteren belgeyi,
ifade eder.
Destek unsurları
MADDE 3 – (1) Bu Karar kapsamında destekler uygulanır.
(2) Vergi indirimi oranı yüzde elli olarak uygulanır.
Devamı ikinci satırda.
Yatırım Yeri Tahsisi: Hazine taşınmazları tahsis edilir.
GEÇİCİ MADDE 1- (1) Önceki belgeler geçerliliğini korur.
EK-1 Bölgesel Destekler
Bölge 1 İlleri: Ankara, İstanbul
EK-2 İller Listesi
Adana
Adıyaman
";

    #[test]
    fn test_articles_and_titles() {
        let tree = parse_structure(KARAR);
        let numbers: Vec<&str> = tree.articles.iter().map(|a| a.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2", "3", "Geçici 1"]);

        assert_eq!(tree.articles[0].title, "Amaç ve kapsam");
        // page number "12" skipped
        assert_eq!(tree.articles[1].title, "Tanımlar");
        assert_eq!(tree.articles[2].title, "Destek unsurları");
        // previous line ends a sentence → no heading
        assert_eq!(tree.articles[3].title, "Geçici Madde");
    }

    #[test]
    fn test_article_body_starts_after_marker() {
        let tree = parse_structure(KARAR);
        assert!(tree.articles[0].body.starts_with("(1) Bu Kararın amacı"));
        assert!(tree.articles[2].body.starts_with("(1) Bu Karar kapsamında"));
    }

    #[test]
    fn test_article_body_stops_at_annex() {
        let tree = parse_structure(KARAR);
        let provisional = tree.article("Geçici 1").unwrap();
        assert!(!provisional.body.contains("Bölgesel Destekler"));
    }

    #[test]
    fn test_subclauses_numbered_and_colon() {
        let tree = parse_structure(KARAR);
        let subs = &tree.article("3").unwrap().subclauses;
        let labels: Vec<&str> = subs.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "ek_1"]);
        assert_eq!(
            subs[1].text,
            "Vergi indirimi oranı yüzde elli olarak uygulanır. Devamı ikinci satırda."
        );
        assert_eq!(
            subs[2].text,
            "Yatırım Yeri Tahsisi: Hazine taşınmazları tahsis edilir."
        );
    }

    #[test]
    fn test_subclause_example() {
        let subs = parse_subclauses(
            "(1) First rule text\n(2) Second rule text\nAdditional continuation.",
        );
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].label, "1");
        assert_eq!(subs[0].text, "First rule text");
        assert_eq!(subs[1].label, "2");
        assert_eq!(subs[1].text, "Second rule text Additional continuation.");
    }

    #[test]
    fn test_lines_before_first_subclause_are_not_captured() {
        let subs = parse_subclauses("Giriş cümlesi\n(1) Birinci fıkra");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "Birinci fıkra");
    }

    #[test]
    fn test_definitions_extracted() {
        let tree = parse_structure(KARAR);
        assert_eq!(tree.definitions.len(), 2);
        assert_eq!(
            tree.definitions.get("Bakanlık").map(String::as_str),
            Some("Sanayi ve Teknoloji Bakanlığını,")
        );
        assert!(tree.definitions.contains_key("Yatırım teşvik belgesi"));
    }

    #[test]
    fn test_definitions_reject_long_terms() {
        let body = "a) Kısa terim: açıklama\nBu cümle elli karakterden çok daha uzun bir cümledir ve iki nokta içerir: evet";
        let defs = parse_definitions(body);
        assert_eq!(defs.len(), 1);
        assert!(defs.contains_key("Kısa terim"));
    }

    #[test]
    fn test_annexes() {
        let tree = parse_structure(KARAR);
        assert_eq!(tree.annexes.len(), 2);
        let ek1 = tree.annex("ek_1").unwrap();
        assert_eq!(ek1.title, "Ek-1 Bölgesel Destekler");
        assert_eq!(ek1.body, "Bölge 1 İlleri: Ankara, İstanbul");
        let ek2 = tree.annex("ek_2").unwrap();
        assert!(ek2.body.contains("Adıyaman"));
    }

    #[test]
    fn test_annex_cross_reference_is_not_a_marker() {
        let text = "Amaç\nMADDE 1- (1) Metin.\nEK-2'de sayılan iller için uygulanır.";
        let tree = parse_structure(text);
        assert!(tree.annexes.is_empty());
        assert!(tree.articles[0].body.contains("EK-2'de sayılan"));
    }

    #[test]
    fn test_title_recovery_example() {
        let text = "...preceding paragraph.\nDefinitions\nARTICLE 2- (1) In this Decision the terms mean.";
        let tree = parse_structure(text);
        assert_eq!(tree.articles.len(), 1);
        assert_eq!(tree.articles[0].number, "2");
        assert_eq!(tree.articles[0].title, "Definitions");
    }

    #[test]
    fn test_info() {
        let tree = parse_structure(KARAR);
        assert_eq!(tree.info.name, "YATIRIMLARDA DEVLET YARDIMLARI HAKKINDA KARAR");
        assert_eq!(tree.info.date.as_deref(), Some("2025"));
    }

    #[test]
    fn test_empty_input_yields_single_article() {
        let tree = parse_structure("");
        assert_eq!(tree.articles.len(), 1);
        assert_eq!(tree.articles[0].number, GENERAL_ARTICLE_NUMBER);
        assert!(tree.annexes.is_empty());
        assert!(tree.definitions.is_empty());
    }

    #[test]
    fn test_unstructured_text_becomes_general_article() {
        let tree = parse_structure("Sadece serbest metin.\nHiç madde yok.");
        assert_eq!(tree.articles.len(), 1);
        assert_eq!(tree.articles[0].title, GENERAL_ARTICLE_TITLE);
        assert!(tree.articles[0].body.contains("Hiç madde yok."));
    }

    #[test]
    fn test_crlf_normalized() {
        let tree = parse_structure("Amaç\r\nMADDE 1- (1) Birinci.\r\n(2) İkinci.");
        assert_eq!(tree.articles[0].title, "Amaç");
        assert_eq!(tree.articles[0].subclauses.len(), 2);
    }

    const HIT30: &str = "HIT-30 Yüksek Teknoloji Yatırım Programı
Program rehberi
AKTİF AÇIK ÇAĞRILAR
HIT-Yarı İletkenler
(Çip Üretimi)
Başvurular devam etmektedir.
HIT-Elektrikli Araçlar
Batarya ve araç üretimi.
KAPALI ÇAĞRILAR
HIT-Mobilite
Bu çağrının başvuru süresi 2024 yılında dolmuştur.
";

    #[test]
    fn test_call_listing_fallback_with_categories() {
        let tree = parse_structure(HIT30);
        assert!(tree.annexes.is_empty());

        // preamble + 3 blocks + 3 summaries
        assert_eq!(tree.articles.len(), 7);
        assert!(tree.articles[0].body.starts_with("HIT-30 Yüksek Teknoloji"));

        let chip = tree
            .articles
            .iter()
            .find(|a| a.number == "HIT-Yarı İletkenler (Çip Üretimi)")
            .unwrap();
        assert!(chip.title.ends_with("[AÇIK ÇAĞRI]"));
        assert!(chip.body.starts_with("Çağrı Durumu: AÇIK ÇAĞRI"));

        let mobility = tree
            .articles
            .iter()
            .find(|a| a.number == "HIT-Mobilite")
            .unwrap();
        assert!(mobility.title.ends_with("[KAPALI ÇAĞRI]"));

        // the banner after an open call is not part of its text
        let vehicles = tree
            .articles
            .iter()
            .find(|a| a.number == "HIT-Elektrikli Araçlar Batarya ve araç üretimi.")
            .unwrap();
        assert!(vehicles.body.starts_with("Çağrı Durumu: AÇIK ÇAĞRI"));
        assert!(!vehicles.body.contains("KAPALI"));
        assert!(!tree.articles[0].body.contains("AKTİF AÇIK ÇAĞRILAR"));

        let summary = tree
            .articles
            .iter()
            .find(|a| a.number == "HIT-Mobilite Özet")
            .unwrap();
        assert!(summary.body.contains("KAPALI ÇAĞRI"));
        assert!(summary.body.len() < 200);
    }

    #[test]
    fn test_call_marker_any_case_and_wrapped() {
        let guide = "Program rehberi\nhit-Kuantum\nAçıklama.\nHIT-\nYapay Zeka\nDetay.\n";
        let tree = parse_structure(guide);

        assert_eq!(tree.articles.len(), 3);
        assert_eq!(tree.articles[0].body, "Program rehberi");
        assert!(tree.articles[1].number.starts_with("hit-Kuantum"));
        assert_eq!(tree.articles[2].number, "HIT-Yapay Zeka");
        assert!(tree.articles[2].body.ends_with("Detay."));
    }

    #[test]
    fn test_banner_requires_uppercase() {
        assert_eq!(CallCategory::from_banner("KAPALI ÇAĞRILAR"), Some(CallCategory::Closed));
        assert_eq!(CallCategory::from_banner("AKTİF AÇIK ÇAĞRILAR"), Some(CallCategory::Open));
        assert_eq!(CallCategory::from_banner("açık çağrı döneminde başvurulur"), None);
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_structure(KARAR), parse_structure(KARAR));
        assert_eq!(parse_structure(HIT30), parse_structure(HIT30));
    }
}

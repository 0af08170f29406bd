//! Sector Table Parser - NACE reference table → [`SectorRecord`]
//!
//! The sector table is exported as one flat text where every record reads
//! `NACE KODU: 23.41, YATIRIM KONUSU: ..., HEDEF YATIRIM DURUMU: EVET, ...`.
//! Fields always appear in the same order, so each value is captured between
//! its own label and the next one.

use lazy_static::lazy_static;
use regex::Regex;

use super::tree::SectorRecord;
use crate::text::fold_turkish;

/// Label that opens every record
pub const RECORD_LABEL: &str = "NACE KODU:";

/// Field labels in document order
const FIELD_LABELS: [&str; 9] = [
    "NACE KODU",
    "YATIRIM KONUSU",
    "HEDEF YATIRIM DURUMU",
    "ÖNCELİKLİ YATIRIM DURUMU",
    "YÜKSEK TEKNOLOJİ YATIRIM DURUMU",
    "ORTA-YÜKSEK TEKNOLOJİ YATIRIM DURUMU",
    "TEKNOLOJİ HAMLESİ YATIRIM DURUMU",
    "YATIRIM ŞARTLARI VE DİPNOTLAR",
    "BÖLGELERE GÖRE ASGARİ YATIRIM TUTARLARI",
];

/// Spreadsheet export artefact for a carriage return
const CR_ARTEFACT: &str = "_x000D_";

lazy_static! {
    /// One regex per field: `LABEL:\s*(.*?),\s*NEXT_LABEL:`, last one to end of block
    static ref FIELD_PATTERNS: Vec<Regex> = FIELD_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let pattern = match FIELD_LABELS.get(i + 1) {
                Some(next) => format!(
                    r"(?s){}:\s*(.*?),\s*{}:",
                    regex::escape(label),
                    regex::escape(next)
                ),
                None => format!(r"(?s){}:\s*(.*)$", regex::escape(label)),
            };
            Regex::new(&pattern).unwrap()
        })
        .collect();
}

/// Whether the content looks like a sector table export
pub fn is_sector_table(content: &str) -> bool {
    content.contains(RECORD_LABEL)
}

/// Parse every record of a sector table
///
/// Records without a NACE code are dropped.
pub fn parse_sector_table(content: &str) -> Vec<SectorRecord> {
    let starts: Vec<usize> = content.match_indices(RECORD_LABEL).map(|(i, _)| i).collect();

    let records: Vec<SectorRecord> = starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            parse_block(&content[start..end])
        })
        .collect();

    tracing::debug!("Parsed {} sector records", records.len());
    records
}

fn parse_block(block: &str) -> Option<SectorRecord> {
    let fields: Vec<String> = FIELD_PATTERNS
        .iter()
        .map(|re| {
            re.captures(block)
                .and_then(|caps| caps.get(1))
                .map(|m| clean(m.as_str()))
                .unwrap_or_default()
        })
        .collect();

    if fields[0].is_empty() {
        return None;
    }

    Some(SectorRecord {
        nace_code: fields[0].clone(),
        topic: fields[1].clone(),
        is_target_investment: parse_flag(&fields[2]),
        is_priority_investment: parse_flag(&fields[3]),
        is_high_tech: parse_flag(&fields[4]),
        is_mid_high_tech: parse_flag(&fields[5]),
        is_tech_move_program: parse_flag(&fields[6]),
        conditions: fields[7].clone(),
        minimum_investment_by_region: fields[8].clone(),
    })
}

fn clean(value: &str) -> String {
    value.replace(CR_ARTEFACT, "").trim().to_string()
}

/// `EVET` / `HAYIR`
fn parse_flag(value: &str) -> bool {
    let folded = fold_turkish(value);
    folded.starts_with("evet") || folded.starts_with("yes")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record_text(code: &str, topic: &str, target: &str) -> String {
        format!(
            "NACE KODU: {code}, YATIRIM KONUSU: {topic}, HEDEF YATIRIM DURUMU: {target}, \
             ÖNCELİKLİ YATIRIM DURUMU: HAYIR, YÜKSEK TEKNOLOJİ YATIRIM DURUMU: HAYIR, \
             ORTA-YÜKSEK TEKNOLOJİ YATIRIM DURUMU: EVET, TEKNOLOJİ HAMLESİ YATIRIM DURUMU: HAYIR, \
             YATIRIM ŞARTLARI VE DİPNOTLAR: Asgari kapasite şartı aranır_x000D_, \
             BÖLGELERE GÖRE ASGARİ YATIRIM TUTARLARI: 1. Bölge: 50 milyon TL_x000D_\n2. Bölge: 40 milyon TL\n"
        )
    }

    #[test]
    fn test_parse_single_record() {
        let content = record_text("23.41.12", "Seramik sofra eşyası", "EVET");
        let records = parse_sector_table(&content);
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.nace_code, "23.41.12");
        assert_eq!(r.topic, "Seramik sofra eşyası");
        assert!(r.is_target_investment);
        assert!(!r.is_priority_investment);
        assert!(!r.is_high_tech);
        assert!(r.is_mid_high_tech);
        assert!(!r.is_tech_move_program);
        assert_eq!(r.conditions, "Asgari kapasite şartı aranır");
        assert_eq!(
            r.minimum_investment_by_region,
            "1. Bölge: 50 milyon TL\n2. Bölge: 40 milyon TL"
        );
    }

    #[test]
    fn test_high_tech_label_not_confused_with_mid_high() {
        let content = record_text("26.11", "Elektronik bileşen", "HAYIR")
            .replace("YÜKSEK TEKNOLOJİ YATIRIM DURUMU: HAYIR, ORTA", "YÜKSEK TEKNOLOJİ YATIRIM DURUMU: EVET, ORTA");
        let records = parse_sector_table(&content);
        assert!(records[0].is_high_tech);
        assert!(!records[0].is_target_investment);
    }

    #[test]
    fn test_multiple_records_and_empty_code_dropped() {
        let mut content = String::from("Başlık satırı\n");
        content.push_str(&record_text("23", "Diğer metalik olmayan mineral ürünler", "HAYIR"));
        content.push_str(&record_text("", "Kodsuz kayıt", "HAYIR"));
        content.push_str(&record_text("23.41", "Seramik ev eşyası", "EVET"));

        let records = parse_sector_table(&content);
        let codes: Vec<&str> = records.iter().map(|r| r.nace_code.as_str()).collect();
        assert_eq!(codes, vec!["23", "23.41"]);
    }

    #[test]
    fn test_no_records() {
        assert!(parse_sector_table("serbest metin").is_empty());
        assert!(!is_sector_table("serbest metin"));
        assert!(is_sector_table(&record_text("10.11", "Et", "HAYIR")));
    }
}

//! Header field extraction
//!
//! Memorials open with a block of `Label: value` lines identifying the
//! property, its owner and the surveyor. Lines recognized here are excluded
//! from leg tokenization so that "Perímetro: 1.234,56 m" is never read as a
//! leg distance.

use georef_types::{DocumentHeader, FieldKey};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEADER_PATTERNS: Vec<(FieldKey, Regex)> = vec![
        (
            FieldKey::PropertyName,
            Regex::new(r"(?i)^(?:im[óo]vel|denomina[çc][ãa]o(?:\s+do\s+im[óo]vel)?|nome\s+do\s+im[óo]vel)\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::Owner,
            Regex::new(r"(?i)^(?:propriet[áa]ri[oa]s?(?:\s*\(a\))?|titular)\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::Municipality,
            Regex::new(r"(?i)^munic[íi]pio(?:\s*/\s*uf)?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::Registration,
            Regex::new(r"(?i)^matr[íi]cula(?:\s+n[°o.]*)?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::PropertyCode,
            Regex::new(r"(?i)^(?:c[óo]digo\s+(?:incra(?:\s*/\s*sncr)?|sncr|do\s+im[óo]vel)(?:\s*\([^)]*\))?|sncr|ccir)\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::DeclaredArea,
            Regex::new(r"(?i)^[áa]rea(?:\s+total)?(?:\s*\([^)]*\))?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::DeclaredPerimeter,
            Regex::new(r"(?i)^per[íi]metro(?:\s*\([^)]*\))?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::TechnicalResponsible,
            Regex::new(r"(?i)^respons[áa]vel\s+t[ée]cnic[oa](?:\s*\(a\))?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::AccreditationCode,
            Regex::new(r"(?i)^(?:c[óo]digo\s+de\s+credenciamento|credenciamento(?:\s+incra)?)\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::ReferenceSystem,
            Regex::new(r"(?i)^(?:sistema\s+(?:geod[ée]sico\s+de\s+refer[êe]ncia|de\s+coordenadas|de\s+refer[êe]ncia)|datum|sgr)\s*:\s*(?P<value>.*)$").unwrap(),
        ),
        (
            FieldKey::PrecisionClass,
            Regex::new(r"(?i)^classe(?:\s+de\s+precis[ãa]o)?\s*:\s*(?P<value>.*)$").unwrap(),
        ),
    ];
}

/// Classify a single (normalized, trimmed) line as a header field
pub fn match_header_line(line: &str) -> Option<(FieldKey, &str)> {
    HEADER_PATTERNS.iter().find_map(|(key, pattern)| {
        pattern
            .captures(line)
            .and_then(|caps| caps.name("value"))
            .map(|value| (*key, value.as_str().trim()))
    })
}

/// Collect header fields from normalized text.
///
/// Empty values are recorded too; the cross-reference rules report them as
/// malformed rather than missing.
pub fn extract_header(text: &str) -> DocumentHeader {
    let mut header = DocumentHeader::default();
    for (idx, line) in text.split(['\n', '\x0C']).enumerate() {
        if let Some((key, value)) = match_header_line(line) {
            header.insert(key, value.trim_end_matches(['.', ';']).to_string(), idx + 1);
        }
    }
    header
}

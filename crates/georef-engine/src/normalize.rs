//! Text normalization pass applied before tokenization
//!
//! Each function performs one transformation and can be tested on its own.
//! `normalize` composes them in a fixed order. Line structure and form-feed
//! page markers are preserved so table rows and page numbers survive.

use lazy_static::lazy_static;
use regex::Regex;

/// Page separator emitted by the OCR/text collaborator
pub const PAGE_BREAK: char = '\x0C';

lazy_static! {
    /// "confron-\ntando" style end-of-line hyphenation
    static ref LINE_HYPHENATION: Regex = Regex::new(r"(\p{L})-\n[ \t]*(\p{Ll})").unwrap();

    static ref HORIZONTAL_SPACE: Regex = Regex::new(r"[ \t\u{00A0}\u{2007}\u{202F}]+").unwrap();
}

/// Run every normalization step in order
pub fn normalize(text: &str) -> String {
    let text = normalize_line_endings(text);
    let text = canonicalize_symbols(&text);
    let text = strip_soft_hyphens(&text);
    let text = collapse_whitespace(&text);
    join_hyphenated_lines(&text)
}

/// CRLF and lone CR become LF
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Map the many glyphs OCR produces for degree, minute and second marks
/// onto `°`, `'` and `"`
pub fn canonicalize_symbols(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            'º' | '˚' | '⁰' => '°',
            '′' | '’' | '‘' | '´' | '`' => '\'',
            '″' | '“' | '”' | '„' => '"',
            '–' | '—' | '−' => '-',
            c => c,
        })
        .collect();
    mapped.replace("''", "\"")
}

/// Remove U+00AD soft hyphens
pub fn strip_soft_hyphens(text: &str) -> String {
    text.chars().filter(|c| *c != '\u{00AD}').collect()
}

/// Rejoin words hyphenated across a line break
pub fn join_hyphenated_lines(text: &str) -> String {
    let mut joined = text.to_string();
    while LINE_HYPHENATION.is_match(&joined) {
        joined = LINE_HYPHENATION.replace_all(&joined, "$1$2").into_owned();
    }
    joined
}

/// Collapse runs of horizontal whitespace to one space and trim each line
pub fn collapse_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            line.split(PAGE_BREAK)
                .map(|segment| HORIZONTAL_SPACE.replace_all(segment, " ").trim().to_string())
                .collect::<Vec<_>>()
                .join(&PAGE_BREAK.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Page number (1-based) of a byte offset in normalized text
pub fn page_at(text: &str, offset: usize) -> u32 {
    PageIndex::new(text).page_of(offset)
}

/// Offsets of every page break, for repeated page lookups over one text
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    breaks: Vec<usize>,
}

impl PageIndex {
    pub fn new(text: &str) -> Self {
        Self {
            breaks: text.match_indices(PAGE_BREAK).map(|(idx, _)| idx).collect(),
        }
    }

    pub fn page_of(&self, offset: usize) -> u32 {
        1 + self.breaks.partition_point(|brk| *brk < offset) as u32
    }

    pub fn page_count(&self) -> u32 {
        1 + self.breaks.len() as u32
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: normalization never panics and is idempotent
        #[test]
        fn normalize_idempotent(text in "\\PC{0,200}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        /// Property: page markers survive normalization
        #[test]
        fn page_breaks_preserved(pages in proptest::collection::vec("[a-z ]{0,20}", 1..5)) {
            let text = pages.join("\x0C");
            let normalized = normalize(&text);
            prop_assert_eq!(
                normalized.matches(PAGE_BREAK).count(),
                pages.len() - 1
            );
        }
    }
}

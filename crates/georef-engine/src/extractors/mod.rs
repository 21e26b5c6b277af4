//! Token and header-field extraction
//!
//! `extract` is the entry point: it normalizes raw text, collects header
//! fields and tokenizes the rest. It performs no I/O.

pub mod header;
pub mod numeric;
pub mod tokens;

use crate::error::VerifyError;
use crate::normalize::normalize;
use georef_types::{AzimuthReference, DocumentHeader, Token};
use tracing::debug;

pub use header::extract_header;
pub use tokens::{canonical_reference, merge_reference, tokenize};

/// Minimum number of measurement tokens for a document to be checked at all
pub const MIN_GEOMETRIC_TOKENS: usize = 2;

/// Everything the extractor learned from one document
#[derive(Debug, Clone)]
pub struct Extraction {
    pub normalized_text: String,
    pub tokens: Vec<Token>,
    pub header: DocumentHeader,
    pub azimuth_reference: AzimuthReference,
}

/// Normalize and tokenize a document.
///
/// Fails with `EmptyDocument` on blank input and `InsufficientData` when
/// fewer than two coordinate, azimuth or distance tokens are found.
pub fn extract(raw: &str) -> Result<Extraction, VerifyError> {
    let normalized_text = normalize(raw);
    if normalized_text.trim_matches(|c: char| c.is_whitespace()).is_empty() {
        return Err(VerifyError::EmptyDocument);
    }

    let header = extract_header(&normalized_text);
    let lexed = tokenize(&normalized_text);
    let found = lexed.tokens.iter().filter(|t| t.kind.is_geometric()).count();
    debug!(
        tokens = lexed.tokens.len(),
        geometric = found,
        header_fields = header.fields.len(),
        "Extracted tokens"
    );

    if found < MIN_GEOMETRIC_TOKENS {
        return Err(VerifyError::InsufficientData { found });
    }

    Ok(Extraction {
        normalized_text,
        tokens: lexed.tokens,
        header,
        azimuth_reference: lexed.azimuth_reference,
    })
}

//! Text preprocessing seam
//!
//! An external clean-up service (OCR correction, generative rewriting) can sit
//! in front of the engine. Its output is untrusted: it goes through the same
//! normalization and checks as raw text, and a failing service never stops a
//! verification.

use crate::error::PreprocessError;

/// Rewrites document text before extraction
pub trait TextPreprocessor: Send + Sync {
    fn preprocess(&self, text: &str) -> Result<String, PreprocessError>;
}

/// Returns the text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextPreprocessor for Passthrough {
    fn preprocess(&self, text: &str) -> Result<String, PreprocessError> {
        Ok(text.to_string())
    }
}

impl<F> TextPreprocessor for F
where
    F: Fn(&str) -> Result<String, PreprocessError> + Send + Sync,
{
    fn preprocess(&self, text: &str) -> Result<String, PreprocessError> {
        self(text)
    }
}

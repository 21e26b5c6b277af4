use thiserror::Error;

/// Hard failures: verification of the document stops before any finding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Insufficient survey data: found {found} measurement token(s), need at least 2")]
    InsufficientData { found: usize },

    #[error("Document text is not valid UTF-8 (first invalid byte at {valid_up_to})")]
    Encoding { valid_up_to: usize },
}

/// Errors loading tolerance or rule tables
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Tolerance table has no classes")]
    EmptyTable,

    #[error("Invalid tolerance class '{label}': {reason}")]
    InvalidClass { label: String, reason: String },

    #[error("Duplicate tolerance class label '{0}'")]
    DuplicateClass(String),

    #[error("Invalid rule table: {0}")]
    InvalidRules(String),
}

/// Errors reported by a text preprocessing collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("Preprocessor unavailable: {0}")]
    Unavailable(String),

    #[error("Preprocessor returned unusable output: {0}")]
    InvalidOutput(String),
}

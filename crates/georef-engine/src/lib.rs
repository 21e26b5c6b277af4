//! Survey verification core
//!
//! Turns the extracted text of a memorial descritivo into a traverse of
//! georeferenced vertices and scores it against a regulatory tolerance class.
//!
//! Pipeline: normalize and extract tokens and header fields, assemble legs,
//! resolve the precision class and cross-reference the registry rules,
//! validate geometry, then aggregate findings into a verdict.

pub mod aggregate;
pub mod builder;
pub mod compare;
pub mod error;
pub mod extractors;
pub mod geodesy;
pub mod geometry;
pub mod normalize;
pub mod preprocess;
pub mod rules;
pub mod tolerance;

// Re-export main types
pub use compare::{Comparison, FieldStatus, RowComparison, SectionSummary};
pub use error::{ConfigError, PreprocessError, VerifyError};
pub use georef_types::{
    Finding, FindingCode, FindingLocation, Severity, TraverseMetrics, Verdict, Verification,
};
pub use preprocess::{Passthrough, TextPreprocessor};
pub use rules::{RuleSet, RuleTable};
pub use tolerance::{ToleranceClass, ToleranceTable};

use std::sync::Arc;
use tracing::{info, warn};

/// Verifies memorials against a shared, read-only configuration.
///
/// Cloning is cheap and a `Verifier` may be used from any number of threads.
#[derive(Debug, Clone)]
pub struct Verifier {
    tolerances: Arc<ToleranceTable>,
    rules: Arc<RuleTable>,
}

impl Verifier {
    /// Verifier with the default rule set
    pub fn new(tolerances: ToleranceTable) -> Self {
        Self {
            tolerances: Arc::new(tolerances),
            rules: Arc::new(RuleTable::default()),
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn tolerances(&self) -> &ToleranceTable {
        &self.tolerances
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Verify one document.
    ///
    /// `declared_class` overrides the precision class stated in the document.
    /// Only empty or data-less documents fail; every other defect is a
    /// finding in the returned `Verification`.
    pub fn verify(
        &self,
        document_text: &str,
        declared_class: Option<&str>,
    ) -> Result<Verification, VerifyError> {
        self.run(document_text, declared_class, Vec::new())
    }

    /// Verify a document that has not been decoded yet
    pub fn verify_bytes(
        &self,
        bytes: &[u8],
        declared_class: Option<&str>,
    ) -> Result<Verification, VerifyError> {
        let text = std::str::from_utf8(bytes).map_err(|e| VerifyError::Encoding {
            valid_up_to: e.valid_up_to(),
        })?;
        self.verify(text, declared_class)
    }

    /// Verify a document after running it through a preprocessor.
    ///
    /// A failing preprocessor or an empty rewrite falls back to the original
    /// text and is reported as an `Info` finding.
    pub fn verify_preprocessed<P>(
        &self,
        document_text: &str,
        declared_class: Option<&str>,
        preprocessor: &P,
    ) -> Result<Verification, VerifyError>
    where
        P: TextPreprocessor + ?Sized,
    {
        let outcome = preprocessor.preprocess(document_text).and_then(|text| {
            if text.trim().is_empty() && !document_text.trim().is_empty() {
                Err(PreprocessError::InvalidOutput("empty text".to_string()))
            } else {
                Ok(text)
            }
        });

        match outcome {
            Ok(text) => self.run(&text, declared_class, Vec::new()),
            Err(e) => {
                warn!(error = %e, "Preprocessor failed, verifying original text");
                let finding = Finding::info(
                    FindingCode::PreprocessorFailed,
                    format!("Text preprocessing failed ({}); the original text was verified", e),
                );
                self.run(document_text, declared_class, vec![finding])
            }
        }
    }

    /// Compare two memorials of the same property field by field
    pub fn compare(&self, reference: &str, candidate: &str) -> Result<Comparison, VerifyError> {
        compare::compare_memorials(reference, candidate)
    }

    fn run(
        &self,
        document_text: &str,
        declared_class: Option<&str>,
        extra: Vec<Finding>,
    ) -> Result<Verification, VerifyError> {
        let extraction = extractors::extract(document_text)?;
        let assembly = builder::build_traverse(
            &extraction.tokens,
            &extraction.header,
            extraction.azimuth_reference,
        );
        let cross = rules::cross_reference(
            &assembly.traverse,
            &extraction.header,
            &self.tolerances,
            &self.rules,
            declared_class,
        );
        let geometry =
            geometry::validate_geometry(&assembly.traverse, cross.class, &extraction.header);

        let findings =
            aggregate::aggregate([extra, assembly.findings, geometry.findings, cross.findings]);
        let verdict = aggregate::verdict(&findings);
        info!(
            class = %geometry.metrics.precision_class,
            legs = geometry.metrics.leg_count,
            findings = findings.len(),
            verdict = ?verdict,
            "Verified memorial"
        );

        Ok(Verification {
            verdict,
            findings,
            metrics: geometry.metrics,
        })
    }
}

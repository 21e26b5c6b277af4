//! Batch verification
//!
//! Each document runs on a blocking worker; a semaphore bounds how many run
//! at once. A document that fails hard is reported and the batch goes on.

use anyhow::{Context, Result};
use georef_engine::Verifier;
use georef_types::{Verdict, Verification};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome for one input file
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub documents: usize,
    pub approved: usize,
    pub approved_with_warnings: usize,
    pub rejected: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub summary: BatchSummary,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn new(documents: Vec<DocumentReport>) -> Self {
        let summary = summarize(&documents);
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary,
            documents,
        }
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        for doc in &self.documents {
            output.push_str(&format!("{}\n", doc.file));
            match (&doc.verification, &doc.error) {
                (Some(verification), _) => output.push_str(&verification.to_text()),
                (None, Some(error)) => output.push_str(&format!("✗ FAILED: {}\n", error)),
                (None, None) => {}
            }
            output.push('\n');
        }
        let s = &self.summary;
        output.push_str(&format!(
            "{} documents: {} approved, {} with warnings, {} rejected, {} failed\n",
            s.documents, s.approved, s.approved_with_warnings, s.rejected, s.failed
        ));
        output
    }
}

pub fn summarize(documents: &[DocumentReport]) -> BatchSummary {
    let mut summary = BatchSummary {
        documents: documents.len(),
        ..Default::default()
    };
    for doc in documents {
        match doc.verification.as_ref().map(|v| v.verdict) {
            Some(Verdict::Approved) => summary.approved += 1,
            Some(Verdict::ApprovedWithWarnings) => summary.approved_with_warnings += 1,
            Some(Verdict::Rejected) => summary.rejected += 1,
            None => summary.failed += 1,
        }
    }
    summary
}

fn verify_file(verifier: &Verifier, path: &Path, class: Option<&str>) -> Result<Verification> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let verification = verifier
        .verify_bytes(&bytes, class)
        .with_context(|| format!("Cannot verify {}", path.display()))?;
    Ok(verification)
}

/// Verify every file, at most `jobs` at a time, keeping input order
pub async fn run(
    verifier: Verifier,
    files: Vec<PathBuf>,
    class: Option<String>,
    jobs: usize,
) -> Result<Vec<DocumentReport>> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let class: Option<Arc<str>> = class.map(Arc::from);
    let mut tasks = JoinSet::new();

    for (idx, path) in files.iter().cloned().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker pool closed")?;
        let verifier = verifier.clone();
        let class = class.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            debug!(file = %path.display(), "Verifying");
            (idx, verify_file(&verifier, &path, class.as_deref()))
        });
    }

    let mut slots: Vec<Option<DocumentReport>> = vec![None; files.len()];
    while let Some(joined) = tasks.join_next().await {
        let (idx, outcome) = joined.context("Verification worker panicked")?;
        let file = files[idx].display().to_string();
        let report = match outcome {
            Ok(verification) => DocumentReport {
                file,
                verification: Some(verification),
                error: None,
            },
            Err(e) => {
                warn!(file = %file, error = %format!("{:#}", e), "Document failed");
                DocumentReport {
                    file,
                    verification: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        slots[idx] = Some(report);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_engine::ToleranceTable;
    use pretty_assertions::assert_eq;

    const TOLERANCES: &str = r#"
        [[class]]
        label = "C3"
        min_closure_ratio = 2500.0
        max_azimuth_discrepancy_arcsec = 60.0
        max_distance_discrepancy_m = 0.5
    "#;

    #[tokio::test]
    async fn test_batch_keeps_order_and_reports_failures() {
        let dir = std::env::temp_dir().join(format!("georef-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.txt");
        let empty = dir.join("empty.txt");
        std::fs::write(
            &good,
            "vértice V1, azimute de 0°00'00\", distância de 10,00 m, até o vértice V2;\n\
             azimute de 120°00'00\", distância de 10,00 m, até o vértice V3;\n\
             azimute de 240°00'00\", distância de 10,00 m, até o vértice V1.",
        )
        .unwrap();
        std::fs::write(&empty, "").unwrap();
        let missing = dir.join("missing.txt");

        let verifier = Verifier::new(ToleranceTable::from_str(TOLERANCES).unwrap());
        let reports = run(
            verifier,
            vec![good.clone(), empty.clone(), missing.clone()],
            None,
            2,
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].file, good.display().to_string());
        assert!(reports[0].verification.is_some());
        assert!(reports[1].error.as_deref().unwrap().contains("empty"));
        assert!(reports[2].error.is_some());

        let summary = summarize(&reports);
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.failed, 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}

// Finding aggregation and verdict
use georef_types::{Finding, Severity, Verdict};
use std::cmp::Reverse;

/// Merge finding lists into report order: severity descending, then traverse
/// position (document-level findings first), then the order they were raised.
pub fn aggregate<I>(sources: I) -> Vec<Finding>
where
    I: IntoIterator<Item = Vec<Finding>>,
{
    let mut findings: Vec<Finding> = sources.into_iter().flatten().collect();
    // sort_by_key is stable, so ties keep insertion order
    findings.sort_by_key(|f| (Reverse(f.severity), f.position()));
    findings
}

/// Any Error rejects; otherwise any Warning approves with warnings
pub fn verdict(findings: &[Finding]) -> Verdict {
    let worst = findings.iter().map(|f| f.severity).max();
    match worst {
        Some(Severity::Error) => Verdict::Rejected,
        Some(Severity::Warning) => Verdict::ApprovedWithWarnings,
        Some(Severity::Info) | None => Verdict::Approved,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use georef_types::{FindingCode, FindingLocation};
    use proptest::prelude::*;

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Info),
            Just(Severity::Warning),
            Just(Severity::Error)
        ]
    }

    proptest! {
        /// Property: output is sorted and the verdict only depends on the worst severity
        #[test]
        fn sorted_by_severity_then_position(
            raw in proptest::collection::vec((severity(), proptest::option::of(0usize..20)), 0..30)
        ) {
            let findings: Vec<Finding> = raw
                .iter()
                .map(|(severity, index)| {
                    let f = Finding::new(FindingCode::DuplicateVertex, *severity, "x");
                    match index {
                        Some(index) => f.at(FindingLocation::Vertex { index: *index, name: String::new() }),
                        None => f,
                    }
                })
                .collect();
            let ordered = aggregate([findings.clone()]);
            prop_assert_eq!(ordered.len(), findings.len());
            for pair in ordered.windows(2) {
                let a = (Reverse(pair[0].severity), pair[0].position());
                let b = (Reverse(pair[1].severity), pair[1].position());
                prop_assert!(a <= b);
            }
            let has_error = findings.iter().any(|f| f.severity == Severity::Error);
            prop_assert_eq!(verdict(&ordered) == Verdict::Rejected, has_error);
        }
    }
}

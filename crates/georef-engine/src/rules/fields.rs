// Header field presence and format checks
use crate::extractors::canonical_reference;
use crate::extractors::numeric::parse_decimal;
use georef_types::{DocumentHeader, FieldKey, Finding, FindingCode, FindingLocation, Severity};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // INCRA/SNCR code: 000.000.000.000-0
    static ref PROPERTY_CODE: Regex = Regex::new(r"^\d{3}\.\d{3}\.\d{3}\.\d{3}-\d$").unwrap();
    static ref ACCREDITATION_CODE: Regex = Regex::new(r"(?i)^[A-Z0-9]{3,4}$").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d[\d.,]*\d|\d").unwrap();
}

/// Why a field value is unusable, if it is
fn format_problem(key: FieldKey, value: &str) -> Option<&'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Some("value is empty");
    }
    match key {
        FieldKey::PropertyCode if !PROPERTY_CODE.is_match(&value.replace(' ', "")) => {
            Some("expected the form 000.000.000.000-0")
        }
        FieldKey::AccreditationCode if !ACCREDITATION_CODE.is_match(value) => {
            Some("expected 3 or 4 letters or digits")
        }
        FieldKey::DeclaredArea | FieldKey::DeclaredPerimeter => {
            let positive = NUMBER
                .find(value)
                .and_then(|m| parse_decimal(m.as_str()))
                .is_some_and(|v| v > 0.0);
            (!positive).then_some("expected a positive number")
        }
        FieldKey::Registration if !value.chars().any(|c| c.is_ascii_digit()) => {
            Some("expected a registration number")
        }
        FieldKey::ReferenceSystem if canonical_reference(value).is_none() => {
            Some("reference system not recognized")
        }
        _ => None,
    }
}

/// Check mandatory header fields and the format of every field present.
///
/// A missing mandatory field is an Error. A malformed field is an Error when
/// mandatory and a Warning otherwise.
pub fn check_header_fields(header: &DocumentHeader, mandatory: &[FieldKey]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for key in FieldKey::ALL {
        let required = mandatory.contains(&key);
        match header.get(key) {
            None if required => findings.push(
                Finding::error(
                    FindingCode::MissingField(key),
                    format!("Mandatory field \"{}\" not found", key.label()),
                )
                .at(FindingLocation::Field { field: key }),
            ),
            None => {}
            Some(value) => {
                if let Some(problem) = format_problem(key, value) {
                    let severity = if required { Severity::Error } else { Severity::Warning };
                    findings.push(
                        Finding::new(
                            FindingCode::MalformedField(key),
                            severity,
                            format!("Field \"{}\" is malformed: {} (\"{}\")", key.label(), problem, value),
                        )
                        .at(FindingLocation::Field { field: key }),
                    );
                }
            }
        }
    }

    findings
}

//! Rule cross-reference engine
//!
//! Checks a document against the registry requirements of its precision
//! class: mandatory header fields, minimum vertex count, confrontations,
//! reference system and vertex coordinates. The class itself is resolved here
//! and handed on to the geometry validator.
//!
//! Rule tables are TOML: a `[default]` rule set and partial per-class
//! overrides keyed by class label or alias.
//!
//! ```toml
//! [default]
//! mandatory_fields = ["property_name", "owner", "municipality"]
//! min_vertex_count = 3
//!
//! [class.C1]
//! require_vertex_coordinates = true
//! ```

pub mod fields;
pub mod structure;

use crate::error::ConfigError;
use crate::tolerance::{ToleranceClass, ToleranceTable};
use anyhow::Context;
use georef_types::{DocumentHeader, FieldKey, Finding, FindingCode, Traverse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

pub use fields::check_header_fields;
pub use structure::{check_structure, vertex_count};

/// Requirements applied to every document of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub mandatory_fields: Vec<FieldKey>,
    pub min_vertex_count: usize,
    /// Every leg must name the confronting owner
    pub require_confrontations: bool,
    pub require_reference_system: bool,
    /// Every vertex must carry absolute coordinates
    pub require_vertex_coordinates: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            mandatory_fields: vec![
                FieldKey::PropertyName,
                FieldKey::Owner,
                FieldKey::Municipality,
                FieldKey::Registration,
                FieldKey::TechnicalResponsible,
            ],
            min_vertex_count: 3,
            require_confrontations: true,
            require_reference_system: true,
            require_vertex_coordinates: false,
        }
    }
}

/// Partial rule set; unset values fall back to the default set
#[derive(Debug, Clone, Default, Deserialize)]
struct RuleOverride {
    mandatory_fields: Option<Vec<FieldKey>>,
    min_vertex_count: Option<usize>,
    require_confrontations: Option<bool>,
    require_reference_system: Option<bool>,
    require_vertex_coordinates: Option<bool>,
}

impl RuleOverride {
    fn apply(self, base: &RuleSet) -> RuleSet {
        RuleSet {
            mandatory_fields: self
                .mandatory_fields
                .unwrap_or_else(|| base.mandatory_fields.clone()),
            min_vertex_count: self.min_vertex_count.unwrap_or(base.min_vertex_count),
            require_confrontations: self
                .require_confrontations
                .unwrap_or(base.require_confrontations),
            require_reference_system: self
                .require_reference_system
                .unwrap_or(base.require_reference_system),
            require_vertex_coordinates: self
                .require_vertex_coordinates
                .unwrap_or(base.require_vertex_coordinates),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    default: RuleSet,
    #[serde(rename = "class", default)]
    classes: BTreeMap<String, RuleOverride>,
}

/// Default rule set plus per-class overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    default: RuleSet,
    overrides: Vec<(String, RuleSet)>,
}

impl RuleTable {
    pub fn new(default: RuleSet) -> Result<Self, ConfigError> {
        validate(&default, "default")?;
        Ok(Self {
            default,
            overrides: Vec::new(),
        })
    }

    /// Load a rule table from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule table: {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("Invalid rule table: {}", path.display()))
    }

    /// Parse and validate a rule table from TOML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(s)?;
        let mut table = Self::new(file.default)?;
        for (label, partial) in file.classes {
            let rules = partial.apply(&table.default);
            validate(&rules, &label)?;
            table.overrides.push((label, rules));
        }
        Ok(table)
    }

    pub fn default_rules(&self) -> &RuleSet {
        &self.default
    }

    /// Rules for a class: its override if one names it, else the default
    pub fn for_class(&self, class: &ToleranceClass) -> &RuleSet {
        self.overrides
            .iter()
            .find(|(label, _)| class.matches(label))
            .map(|(_, rules)| rules)
            .unwrap_or(&self.default)
    }
}

fn validate(rules: &RuleSet, name: &str) -> Result<(), ConfigError> {
    if rules.min_vertex_count < 3 {
        return Err(ConfigError::InvalidRules(format!(
            "{}: min_vertex_count must be at least 3",
            name
        )));
    }
    Ok(())
}

/// Pick the tolerance class to score against.
///
/// An undeclared or unrecognized class falls back to the strictest class in
/// the table and yields an `UNKNOWN_PRECISION_CLASS` warning.
pub fn resolve_class<'t>(
    table: &'t ToleranceTable,
    declared: Option<&str>,
) -> (&'t ToleranceClass, Option<Finding>) {
    let declared = declared.map(str::trim).filter(|d| !d.is_empty());
    if let Some(class) = declared.and_then(|name| table.get(name)) {
        return (class, None);
    }

    let strictest = table.strictest();
    let message = match declared {
        Some(name) => format!(
            "Precision class \"{}\" is not in the tolerance table; scored as {}",
            name, strictest.label
        ),
        None => format!(
            "No precision class declared; scored as {}",
            strictest.label
        ),
    };
    (
        strictest,
        Some(Finding::warning(FindingCode::UnknownPrecisionClass, message)),
    )
}

/// Outcome of the cross-reference pass
#[derive(Debug, Clone)]
pub struct CrossReference<'t> {
    pub class: &'t ToleranceClass,
    pub findings: Vec<Finding>,
}

/// Resolve the precision class and check the document against its rules.
///
/// An explicit class overrides the one declared in the document header.
pub fn cross_reference<'t>(
    traverse: &Traverse,
    header: &DocumentHeader,
    tolerances: &'t ToleranceTable,
    rules: &RuleTable,
    declared_class: Option<&str>,
) -> CrossReference<'t> {
    let declared = declared_class.or(traverse.precision_class.as_deref());
    let (class, unknown) = resolve_class(tolerances, declared);
    let rule_set = rules.for_class(class);

    let mut findings: Vec<Finding> = unknown.into_iter().collect();
    findings.extend(check_header_fields(header, &rule_set.mandatory_fields));
    findings.extend(check_structure(traverse, header, rule_set));
    debug!(class = %class.label, findings = findings.len(), "Cross-reference checked");

    CrossReference { class, findings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_types::Severity;
    use pretty_assertions::assert_eq;

    const TOLERANCES: &str = r#"
        [[class]]
        label = "C3"
        min_closure_ratio = 1000.0
        max_azimuth_discrepancy_arcsec = 60.0
        max_distance_discrepancy_m = 0.5

        [[class]]
        label = "C1"
        min_closure_ratio = 10000.0
        max_azimuth_discrepancy_arcsec = 10.0
        max_distance_discrepancy_m = 0.05
    "#;

    const RULES: &str = r#"
        [default]
        mandatory_fields = ["property_name"]
        require_confrontations = false
        require_reference_system = false

        [class.c1]
        min_vertex_count = 4
        require_vertex_coordinates = true
    "#;

    #[test]
    fn test_rule_table_overrides_inherit_default() {
        let tolerances = ToleranceTable::from_str(TOLERANCES).unwrap();
        let rules = RuleTable::from_str(RULES).unwrap();

        let c3 = rules.for_class(tolerances.get("C3").unwrap());
        assert_eq!(c3.min_vertex_count, 3);
        assert!(!c3.require_vertex_coordinates);

        let c1 = rules.for_class(tolerances.get("C1").unwrap());
        assert_eq!(c1.min_vertex_count, 4);
        assert!(c1.require_vertex_coordinates);
        assert_eq!(c1.mandatory_fields, vec![FieldKey::PropertyName]);
        assert!(!c1.require_confrontations);
    }

    #[test]
    fn test_empty_rule_file_uses_defaults() {
        let rules = RuleTable::from_str("").unwrap();
        assert_eq!(rules.default_rules(), &RuleSet::default());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(matches!(
            RuleTable::from_str("[default]\nmin_vertex_count = 2"),
            Err(ConfigError::InvalidRules(_))
        ));
        assert!(matches!(
            RuleTable::from_str("[default]\nmandatory_fields = [\"colour\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_resolve_class() {
        let tolerances = ToleranceTable::from_str(TOLERANCES).unwrap();

        let (class, finding) = resolve_class(&tolerances, Some("c3"));
        assert_eq!(class.label, "C3");
        assert!(finding.is_none());

        let (class, finding) = resolve_class(&tolerances, Some("Classe Z"));
        assert_eq!(class.label, "C1");
        let finding = finding.unwrap();
        assert_eq!(finding.code, FindingCode::UnknownPrecisionClass);
        assert_eq!(finding.severity, Severity::Warning);

        let (class, finding) = resolve_class(&tolerances, Some("  "));
        assert_eq!(class.label, "C1");
        assert!(finding.is_some());
    }

    #[test]
    fn test_explicit_class_overrides_header() {
        let tolerances = ToleranceTable::from_str(TOLERANCES).unwrap();
        let rules = RuleTable::from_str(RULES).unwrap();
        let traverse = Traverse {
            precision_class: Some("C1".to_string()),
            ..Default::default()
        };
        let mut header = DocumentHeader::default();
        header.insert(FieldKey::PropertyName, "Sítio".to_string(), 1);

        let outcome = cross_reference(&traverse, &header, &tolerances, &rules, Some("C3"));
        assert_eq!(outcome.class.label, "C3");
        let outcome = cross_reference(&traverse, &header, &tolerances, &rules, None);
        assert_eq!(outcome.class.label, "C1");
        assert!(outcome
            .findings
            .iter()
            .all(|f| f.code != FindingCode::UnknownPrecisionClass));
    }
}

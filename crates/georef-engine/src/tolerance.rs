//! Tolerance classes
//!
//! Thresholds are injected configuration: a TOML table of classes loaded once
//! at startup and shared read-only afterwards. Nothing in the engine carries a
//! built-in threshold.
//!
//! ```toml
//! [[class]]
//! label = "C1"
//! aliases = ["classe 1"]
//! min_closure_ratio = 10000.0
//! max_azimuth_discrepancy_arcsec = 10.0
//! max_distance_discrepancy_m = 0.05
//! ```

use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Regulatory precision class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceClass {
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// N of the minimum acceptable relative precision 1:N
    pub min_closure_ratio: f64,
    /// Absolute cap on the linear closure error, in meters
    #[serde(default)]
    pub max_linear_closure_m: Option<f64>,
    pub max_azimuth_discrepancy_arcsec: f64,
    pub max_distance_discrepancy_m: f64,
    /// Decimal places required for projected coordinates (meters)
    #[serde(default = "default_min_coordinate_decimals")]
    pub min_coordinate_decimals: u8,
    /// Decimal places required for the seconds of geographic coordinates
    #[serde(default = "default_min_arcsecond_decimals")]
    pub min_arcsecond_decimals: u8,
    /// Fraction of the declared area the computed area may differ by
    #[serde(default = "default_max_declared_discrepancy")]
    pub max_area_discrepancy: f64,
    /// Fraction of the declared perimeter the computed one may differ by
    #[serde(default = "default_max_declared_discrepancy")]
    pub max_perimeter_discrepancy: f64,
    #[serde(default)]
    pub max_perimeter_m: Option<f64>,
    /// A leg longer than this fraction of the perimeter is an outlier
    #[serde(default = "default_outlier_leg_fraction")]
    pub outlier_leg_fraction: f64,
}

fn default_min_coordinate_decimals() -> u8 {
    2
}

fn default_min_arcsecond_decimals() -> u8 {
    3
}

fn default_max_declared_discrepancy() -> f64 {
    0.01
}

fn default_outlier_leg_fraction() -> f64 {
    0.5
}

impl ToleranceClass {
    /// True when `name` is this class's label or one of its aliases
    pub fn matches(&self, name: &str) -> bool {
        let wanted = normalize_label(name);
        !wanted.is_empty()
            && std::iter::once(&self.label)
                .chain(&self.aliases)
                .any(|candidate| normalize_label(candidate) == wanted)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidClass {
            label: self.label.clone(),
            reason: reason.to_string(),
        };
        if normalize_label(&self.label).is_empty() {
            return Err(invalid("label is empty"));
        }
        if !(self.min_closure_ratio.is_finite() && self.min_closure_ratio > 0.0) {
            return Err(invalid("min_closure_ratio must be positive"));
        }
        if self
            .max_linear_closure_m
            .is_some_and(|cap| !(cap.is_finite() && cap > 0.0))
        {
            return Err(invalid("max_linear_closure_m must be positive"));
        }
        if !(self.max_azimuth_discrepancy_arcsec >= 0.0 && self.max_distance_discrepancy_m >= 0.0) {
            return Err(invalid("discrepancy limits must not be negative"));
        }
        if !(self.max_area_discrepancy >= 0.0 && self.max_perimeter_discrepancy >= 0.0) {
            return Err(invalid("declared value discrepancies must not be negative"));
        }
        if self.max_perimeter_m.is_some_and(|max| !(max > 0.0)) {
            return Err(invalid("max_perimeter_m must be positive"));
        }
        if !(self.outlier_leg_fraction > 0.0 && self.outlier_leg_fraction <= 1.0) {
            return Err(invalid("outlier_leg_fraction must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Case, spacing and a leading "classe" do not distinguish class names
fn normalize_label(name: &str) -> String {
    let compact: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();
    match compact.strip_prefix("CLASSE") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => compact,
    }
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(rename = "class", default)]
    classes: Vec<ToleranceClass>,
}

/// Validated, non-empty set of tolerance classes
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceTable {
    classes: Vec<ToleranceClass>,
    strictest: usize,
}

impl ToleranceTable {
    pub fn new(classes: Vec<ToleranceClass>) -> Result<Self, ConfigError> {
        if classes.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        let mut seen = HashSet::new();
        for class in &classes {
            class.validate()?;
            for name in std::iter::once(&class.label).chain(&class.aliases) {
                if !seen.insert(normalize_label(name)) {
                    return Err(ConfigError::DuplicateClass(name.clone()));
                }
            }
        }

        // Largest N wins; the first listed wins a tie
        let strictest = classes
            .iter()
            .enumerate()
            .fold(0, |best, (idx, class)| {
                if class.min_closure_ratio > classes[best].min_closure_ratio {
                    idx
                } else {
                    best
                }
            });

        Ok(Self { classes, strictest })
    }

    /// Load a tolerance table from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tolerance table: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid tolerance table: {}", path.display()))
    }

    /// Parse and validate a tolerance table from TOML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let file: TableFile = toml::from_str(s)?;
        Self::new(file.classes)
    }

    pub fn classes(&self) -> &[ToleranceClass] {
        &self.classes
    }

    /// Class with the largest minimum closure ratio
    pub fn strictest(&self) -> &ToleranceClass {
        &self.classes[self.strictest]
    }

    /// Look a class up by label or alias
    pub fn get(&self, name: &str) -> Option<&ToleranceClass> {
        self.classes.iter().find(|class| class.matches(name))
    }
}

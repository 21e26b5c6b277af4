//! Memorial comparison
//!
//! Lines up two memorials of the same property (typically the registry's copy
//! and the surveyor's project) row by row: one vertex row and one segment row
//! per leg, in traverse order. Codes compare by normalized text and numbers
//! by parsed value, so `10,00` and `10.0` are identical but `10,01` is not.

use crate::builder::build_traverse;
use crate::error::VerifyError;
use crate::extractors::extract;
use georef_types::{AbsoluteCoordinate, CoordinateKind, Leg, Traverse};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Column of a compared row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedField {
    VertexCode,
    /// Longitude or easting
    X,
    /// Latitude or northing
    Y,
    Altitude,
    SegmentCode,
    Azimuth,
    Distance,
}

impl ComparedField {
    pub fn label(&self) -> &'static str {
        match self {
            ComparedField::VertexCode => "Código",
            ComparedField::X => "Longitude/E",
            ComparedField::Y => "Latitude/N",
            ComparedField::Altitude => "Altitude",
            ComparedField::SegmentCode => "Código",
            ComparedField::Azimuth => "Azimute",
            ComparedField::Distance => "Distância",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Identical,
    Different,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: ComparedField,
    pub reference: Option<String>,
    pub candidate: Option<String>,
    pub status: FieldStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowComparison {
    /// 1-based row number
    pub row: usize,
    pub fields: Vec<FieldComparison>,
}

impl RowComparison {
    pub fn has_difference(&self) -> bool {
        self.fields.iter().any(|f| f.status == FieldStatus::Different)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub identical_fields: usize,
    pub different_fields: usize,
    pub rows_with_differences: Vec<usize>,
    pub rows_analysed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub vertices: Vec<RowComparison>,
    pub segments: Vec<RowComparison>,
    pub vertex_summary: SectionSummary,
    pub segment_summary: SectionSummary,
}

impl Comparison {
    pub fn is_identical(&self) -> bool {
        self.vertex_summary.different_fields == 0 && self.segment_summary.different_fields == 0
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        for (title, rows, summary) in [
            ("Vertices", &self.vertices, &self.vertex_summary),
            ("Segments", &self.segments, &self.segment_summary),
        ] {
            output.push_str(&format!(
                "{}: {} rows, {} identical fields, {} different\n",
                title, summary.rows_analysed, summary.identical_fields, summary.different_fields
            ));
            for row in rows.iter().filter(|r| r.has_difference()) {
                for field in row.fields.iter().filter(|f| f.status == FieldStatus::Different) {
                    output.push_str(&format!(
                        "  #{} {}: {} ≠ {}\n",
                        row.row,
                        field.field.label(),
                        field.reference.as_deref().unwrap_or("-"),
                        field.candidate.as_deref().unwrap_or("-"),
                    ));
                }
            }
        }
        output
    }
}

/// One side of a compared value
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Code(String),
    Number { value: f64, shown: String },
}

impl Value {
    fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Code(a), Value::Code(b)) => normalize_code(a) == normalize_code(b),
            (Value::Number { value: a, .. }, Value::Number { value: b, .. }) => {
                (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Code(code) => write!(f, "{}", code),
            Value::Number { shown, .. } => write!(f, "{}", shown),
        }
    }
}

fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Degrees as `47°30'15,12"`, negative for south/west
fn format_dms(degrees: f64, second_decimals: usize) -> String {
    let sign = if degrees < 0.0 { "-" } else { "" };
    let total = degrees.abs() * 3600.0;
    let scale = 10f64.powi(second_decimals as i32);
    let total = (total * scale).round() / scale;
    let d = (total / 3600.0).floor();
    let m = ((total - d * 3600.0) / 60.0).floor();
    let s = total - d * 3600.0 - m * 60.0;
    let width = if second_decimals == 0 { 2 } else { 3 + second_decimals };
    let seconds = format!("{:0width$.prec$}", s, width = width, prec = second_decimals)
        .replace('.', ",");
    format!("{}{}°{:02}'{}\"", sign, d, m, seconds)
}

fn coordinate_value(coordinate: &AbsoluteCoordinate, value: f64) -> Value {
    let decimals = coordinate.decimals as usize;
    let shown = match coordinate.kind {
        CoordinateKind::Geographic => format_dms(value, decimals),
        CoordinateKind::Projected => format!("{:.*}", decimals, value).replace('.', ","),
    };
    Value::Number { value, shown }
}

fn number(value: f64) -> Value {
    Value::Number {
        value,
        shown: value.to_string().replace('.', ","),
    }
}

fn vertex_row(leg: Option<&Leg>) -> [(ComparedField, Option<Value>); 4] {
    let coordinate = leg.and_then(|l| l.absolute_coordinate.as_ref());
    [
        (ComparedField::VertexCode, leg.map(|l| Value::Code(l.from_vertex.clone()))),
        (ComparedField::X, coordinate.map(|c| coordinate_value(c, c.x))),
        (ComparedField::Y, coordinate.map(|c| coordinate_value(c, c.y))),
        (ComparedField::Altitude, coordinate.and_then(|c| c.altitude).map(number)),
    ]
}

fn segment_row(leg: Option<&Leg>) -> [(ComparedField, Option<Value>); 3] {
    [
        (ComparedField::SegmentCode, leg.map(|l| Value::Code(l.to_vertex.clone()))),
        (
            ComparedField::Azimuth,
            leg.and_then(|l| l.azimuth).map(|az| Value::Number {
                value: az,
                shown: format_dms(az, 2),
            }),
        ),
        (ComparedField::Distance, leg.and_then(|l| l.distance).map(number)),
    ]
}

fn compare_fields<const N: usize>(
    row: usize,
    reference: [(ComparedField, Option<Value>); N],
    candidate: [(ComparedField, Option<Value>); N],
    summary: &mut SectionSummary,
) -> RowComparison {
    let fields: Vec<FieldComparison> = reference
        .into_iter()
        .zip(candidate)
        .map(|((field, a), (_, b))| {
            let status = match (&a, &b) {
                (Some(a), Some(b)) if a.same_as(b) => FieldStatus::Identical,
                (None, None) => FieldStatus::Identical,
                _ => FieldStatus::Different,
            };
            match status {
                FieldStatus::Identical => summary.identical_fields += 1,
                FieldStatus::Different => summary.different_fields += 1,
            }
            FieldComparison {
                field,
                reference: a.map(|v| v.to_string()),
                candidate: b.map(|v| v.to_string()),
                status,
            }
        })
        .collect();

    let row = RowComparison { row, fields };
    summary.rows_analysed += 1;
    if row.has_difference() {
        summary.rows_with_differences.push(row.row);
    }
    row
}

/// Compare two assembled traverses row by row
pub fn compare_traverses(reference: &Traverse, candidate: &Traverse) -> Comparison {
    let rows = reference.legs.len().max(candidate.legs.len());
    let mut vertex_summary = SectionSummary::default();
    let mut segment_summary = SectionSummary::default();
    let mut vertices = Vec::with_capacity(rows);
    let mut segments = Vec::with_capacity(rows);

    for idx in 0..rows {
        let a = reference.legs.get(idx);
        let b = candidate.legs.get(idx);
        vertices.push(compare_fields(idx + 1, vertex_row(a), vertex_row(b), &mut vertex_summary));
        segments.push(compare_fields(idx + 1, segment_row(a), segment_row(b), &mut segment_summary));
    }

    Comparison {
        vertices,
        segments,
        vertex_summary,
        segment_summary,
    }
}

/// Extract, assemble and compare two memorials
pub fn compare_memorials(reference: &str, candidate: &str) -> Result<Comparison, VerifyError> {
    let assemble = |text: &str| -> Result<Traverse, VerifyError> {
        let extraction = extract(text)?;
        Ok(build_traverse(&extraction.tokens, &extraction.header, extraction.azimuth_reference).traverse)
    };
    let comparison = compare_traverses(&assemble(reference)?, &assemble(candidate)?);
    debug!(
        vertex_differences = comparison.vertex_summary.different_fields,
        segment_differences = comparison.segment_summary.different_fields,
        "Compared memorials"
    );
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REFERENCE: &str = "\
vértice P1, de coordenadas N 7.456.000,00 m e E 345.000,00 m; deste, segue com azimute de 90°00'00\" e distância de 100,00 m até o vértice P2, de coordenadas N 7.456.000,00 m e E 345.100,00 m; deste, segue com azimute de 180°00'00\" e distância de 100,00 m até o vértice P3, de coordenadas N 7.455.900,00 m e E 345.100,00 m; deste, segue com azimute de 315°00'00\" e distância de 141,42 m até o vértice P1.";

    #[test]
    fn test_identical_memorials() {
        let comparison = compare_memorials(REFERENCE, REFERENCE).unwrap();
        assert!(comparison.is_identical());
        assert_eq!(comparison.vertex_summary.rows_analysed, 3);
        assert_eq!(comparison.vertex_summary.identical_fields, 12);
        assert_eq!(comparison.segment_summary.identical_fields, 9);
    }

    #[test]
    fn test_written_format_does_not_matter() {
        let reformatted = REFERENCE.replace("distância de 100,00 m", "distância de 100.0 m");
        let comparison = compare_memorials(REFERENCE, &reformatted).unwrap();
        assert!(comparison.is_identical(), "{}", comparison.to_text());
    }

    #[test]
    fn test_differences_are_located() {
        let changed = REFERENCE
            .replace("141,42 m", "141,43 m")
            .replace("vértice P2", "vértice P-2");
        let comparison = compare_memorials(REFERENCE, &changed).unwrap();
        assert_eq!(comparison.segment_summary.rows_with_differences, vec![1, 3]);
        assert_eq!(comparison.vertex_summary.rows_with_differences, vec![2]);

        let distance = &comparison.segments[2].fields[2];
        assert_eq!(distance.field, ComparedField::Distance);
        assert_eq!(distance.status, FieldStatus::Different);
        assert_eq!(distance.reference.as_deref(), Some("141,42"));
        assert_eq!(distance.candidate.as_deref(), Some("141,43"));
    }

    #[test]
    fn test_extra_rows_are_different() {
        let a = Traverse {
            legs: vec![Leg {
                from_vertex: "V1".to_string(),
                to_vertex: "V2".to_string(),
                azimuth: Some(10.0),
                distance: Some(5.0),
                absolute_coordinate: None,
                to_coordinate: None,
                confrontation: None,
                page: 1,
            }],
            ..Default::default()
        };
        let comparison = compare_traverses(&a, &Traverse::default());
        assert_eq!(comparison.segment_summary.different_fields, 3);
        assert_eq!(comparison.vertex_summary.different_fields, 1);
        assert_eq!(comparison.vertex_summary.identical_fields, 3);
    }

    #[test]
    fn test_format_dms() {
        assert_eq!(format_dms(45.5, 2), "45°30'00,00\"");
        assert_eq!(format_dms(-47.504_2, 3), "-47°30'15,120\"");
        assert_eq!(format_dms(359.999_999_9, 0), "360°00'00\"");
    }
}

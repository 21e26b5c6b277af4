use crate::header::FieldKey;
use crate::survey::CoordinateKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextPosition {
    pub start_offset: usize, // Byte offset in the normalized text
    pub end_offset: usize,   // End byte offset
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable identifier of a defect, the key the report generator localizes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FindingCode {
    // Traverse assembly
    DiscontinuousTraverse,
    DuplicateVertex,
    MalformedLeg,
    IncompleteLeg,
    IncompleteCoordinate,
    CoordinateWithoutVertex,
    // Geometry
    OpenTraverse,
    ClosureUndetermined,
    ClosureMismatch,
    ClosurePrecisionExceeded,
    ClosureErrorExceeded,
    LegLengthOutlier,
    AzimuthMismatch,
    DistanceMismatch,
    InconsistentReferenceSystem,
    CoordinateOutOfRange,
    InsufficientCoordinatePrecision,
    DeclaredAreaMismatch,
    DeclaredPerimeterMismatch,
    PerimeterOutOfBounds,
    // Cross-reference
    MissingField(FieldKey),
    MalformedField(FieldKey),
    TooFewVertices,
    MissingConfrontation,
    MissingReferenceSystem,
    MissingVertexCoordinates,
    UnknownPrecisionClass,
    // Collaborators
    PreprocessorFailed,
}

impl FindingCode {
    const FIXED: [FindingCode; 26] = [
        FindingCode::DiscontinuousTraverse,
        FindingCode::DuplicateVertex,
        FindingCode::MalformedLeg,
        FindingCode::IncompleteLeg,
        FindingCode::IncompleteCoordinate,
        FindingCode::CoordinateWithoutVertex,
        FindingCode::OpenTraverse,
        FindingCode::ClosureUndetermined,
        FindingCode::ClosureMismatch,
        FindingCode::ClosurePrecisionExceeded,
        FindingCode::ClosureErrorExceeded,
        FindingCode::LegLengthOutlier,
        FindingCode::AzimuthMismatch,
        FindingCode::DistanceMismatch,
        FindingCode::InconsistentReferenceSystem,
        FindingCode::CoordinateOutOfRange,
        FindingCode::InsufficientCoordinatePrecision,
        FindingCode::DeclaredAreaMismatch,
        FindingCode::DeclaredPerimeterMismatch,
        FindingCode::PerimeterOutOfBounds,
        FindingCode::TooFewVertices,
        FindingCode::MissingConfrontation,
        FindingCode::MissingReferenceSystem,
        FindingCode::MissingVertexCoordinates,
        FindingCode::UnknownPrecisionClass,
        FindingCode::PreprocessorFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCode::DiscontinuousTraverse => "DISCONTINUOUS_TRAVERSE",
            FindingCode::DuplicateVertex => "DUPLICATE_VERTEX",
            FindingCode::MalformedLeg => "MALFORMED_LEG",
            FindingCode::IncompleteLeg => "INCOMPLETE_LEG",
            FindingCode::IncompleteCoordinate => "INCOMPLETE_COORDINATE",
            FindingCode::CoordinateWithoutVertex => "COORDINATE_WITHOUT_VERTEX",
            FindingCode::OpenTraverse => "OPEN_TRAVERSE",
            FindingCode::ClosureUndetermined => "CLOSURE_UNDETERMINED",
            FindingCode::ClosureMismatch => "CLOSURE_MISMATCH",
            FindingCode::ClosurePrecisionExceeded => "CLOSURE_PRECISION_EXCEEDED",
            FindingCode::ClosureErrorExceeded => "CLOSURE_ERROR_EXCEEDED",
            FindingCode::LegLengthOutlier => "LEG_LENGTH_OUTLIER",
            FindingCode::AzimuthMismatch => "AZIMUTH_MISMATCH",
            FindingCode::DistanceMismatch => "DISTANCE_MISMATCH",
            FindingCode::InconsistentReferenceSystem => "INCONSISTENT_REFERENCE_SYSTEM",
            FindingCode::CoordinateOutOfRange => "COORDINATE_OUT_OF_RANGE",
            FindingCode::InsufficientCoordinatePrecision => "INSUFFICIENT_COORDINATE_PRECISION",
            FindingCode::DeclaredAreaMismatch => "DECLARED_AREA_MISMATCH",
            FindingCode::DeclaredPerimeterMismatch => "DECLARED_PERIMETER_MISMATCH",
            FindingCode::PerimeterOutOfBounds => "PERIMETER_OUT_OF_BOUNDS",
            FindingCode::MissingField(field) => field.missing_code(),
            FindingCode::MalformedField(field) => field.malformed_code(),
            FindingCode::TooFewVertices => "TOO_FEW_VERTICES",
            FindingCode::MissingConfrontation => "MISSING_CONFRONTATION",
            FindingCode::MissingReferenceSystem => "MISSING_REFERENCE_SYSTEM",
            FindingCode::MissingVertexCoordinates => "MISSING_VERTEX_COORDINATES",
            FindingCode::UnknownPrecisionClass => "UNKNOWN_PRECISION_CLASS",
            FindingCode::PreprocessorFailed => "PREPROCESSOR_FAILED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::FIXED
            .iter()
            .copied()
            .find(|c| c.as_str() == code)
            .or_else(|| {
                FieldKey::ALL.iter().find_map(|field| {
                    if field.missing_code() == code {
                        Some(FindingCode::MissingField(*field))
                    } else if field.malformed_code() == code {
                        Some(FindingCode::MalformedField(*field))
                    } else {
                        None
                    }
                })
            })
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FindingCode> for String {
    fn from(code: FindingCode) -> Self {
        code.as_str().to_string()
    }
}

impl TryFrom<String> for FindingCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FindingCode::from_code(&value).ok_or_else(|| format!("unknown finding code: {}", value))
    }
}

/// What a finding refers to
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingLocation {
    /// Vertex at `index` in traverse order (the start of leg `index`)
    Vertex { index: usize, name: String },
    Leg {
        index: usize,
        from: String,
        to: String,
    },
    Field { field: FieldKey },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    pub code: FindingCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<FindingLocation>,
    pub measured_value: Option<f64>,
    pub tolerance_value: Option<f64>,
}

impl Finding {
    pub fn new(code: FindingCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            measured_value: None,
            tolerance_value: None,
        }
    }

    pub fn error(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warning(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    pub fn info(code: FindingCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    pub fn at(mut self, location: FindingLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_values(mut self, measured: f64, tolerance: f64) -> Self {
        self.measured_value = Some(measured);
        self.tolerance_value = Some(tolerance);
        self
    }

    /// Position in traverse order, `None` for document-level findings
    pub fn position(&self) -> Option<usize> {
        match &self.location {
            Some(FindingLocation::Vertex { index, .. }) | Some(FindingLocation::Leg { index, .. }) => {
                Some(*index)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    ApprovedWithWarnings,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Clockwise,
    CounterClockwise,
}

/// Scalar results of the geometry check
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraverseMetrics {
    /// Tolerance class the document was scored against
    pub precision_class: String,
    pub leg_count: usize,
    pub vertex_count: usize,
    /// Meters, over the largest contiguous run
    pub perimeter: f64,
    pub closure_error: Option<f64>,
    pub coordinate_closure_error: Option<f64>,
    /// N of the 1:N ratio; `None` when closure is zero or unknown
    pub relative_precision: Option<f64>,
    pub area_m2: Option<f64>,
    pub area_ha: Option<f64>,
    pub orientation: Option<Orientation>,
    /// Frame the area was computed in; `None` means integrated azimuth/distance
    pub area_frame: Option<CoordinateKind>,
}

/// Everything handed to the report collaborator for one document
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Verification {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub metrics: TraverseMetrics,
}

impl Verification {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn has_code(&self, code: FindingCode) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        let metrics = &self.metrics;

        output.push_str(&format!("Verdict: {:?}\n", self.verdict));
        output.push_str(&"=".repeat(60));
        output.push('\n');
        output.push_str(&format!("Precision class: {}\n", metrics.precision_class));
        output.push_str(&format!(
            "Legs: {}  Vertices: {}\n",
            metrics.leg_count, metrics.vertex_count
        ));
        output.push_str(&format!("Perimeter: {:.3} m\n", metrics.perimeter));
        if let Some(closure) = metrics.closure_error {
            output.push_str(&format!("Closure error: {:.4} m\n", closure));
        }
        if let Some(ratio) = metrics.relative_precision {
            output.push_str(&format!("Relative precision: 1:{:.0}\n", ratio));
        }
        if let Some(area) = metrics.area_ha {
            output.push_str(&format!("Area: {:.4} ha\n", area));
        }

        if !self.findings.is_empty() {
            output.push_str("\nFindings:\n");
            output.push_str(&"-".repeat(40));
            output.push('\n');
            for finding in &self.findings {
                let status = match finding.severity {
                    Severity::Error => "✗ ERROR",
                    Severity::Warning => "⚠ WARN",
                    Severity::Info => "- INFO",
                };
                output.push_str(&format!("{} [{}] {}\n", status, finding.code, finding.message));
                if let (Some(measured), Some(tolerance)) =
                    (finding.measured_value, finding.tolerance_value)
                {
                    output.push_str(&format!(
                        "    Measured: {}  Tolerance: {}\n",
                        measured, tolerance
                    ));
                }
            }
        }

        output
    }
}

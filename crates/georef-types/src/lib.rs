pub mod header;
pub mod survey;
pub mod types;

pub use header::{DocumentHeader, FieldKey};
pub use survey::{
    AbsoluteCoordinate, Axis, AzimuthReference, CoordinateKind, Leg, Token, TokenKind, Traverse,
    VertexRole,
};
pub use types::{
    Finding, FindingCode, FindingLocation, Orientation, Severity, TextPosition, TraverseMetrics,
    Verdict, Verification,
};

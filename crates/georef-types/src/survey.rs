//! Survey vocabulary: tokens, legs and traverses

use crate::types::TextPosition;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a vertex name is introduced in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexRole {
    /// "vértice X", "do vértice X", first code column of a table row
    Station,
    /// "até o vértice X", second code column of a table row
    Target,
}

/// Axis of a single coordinate value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Easting,
    Northing,
    Longitude,
    Latitude,
    Altitude,
}

impl Axis {
    pub fn kind(&self) -> Option<CoordinateKind> {
        match self {
            Axis::Easting | Axis::Northing => Some(CoordinateKind::Projected),
            Axis::Longitude | Axis::Latitude => Some(CoordinateKind::Geographic),
            Axis::Altitude => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum TokenKind {
    VertexName(VertexRole),
    Azimuth,
    Distance,
    Coordinate(Axis),
    OwnerName,
    ReferenceSystem,
    /// An azimuth or distance that was announced but could not be used
    MalformedLeg,
    Unknown,
}

impl TokenKind {
    /// Tokens that carry a planimetric measurement of the boundary; altitude
    /// does not count
    pub fn is_geometric(&self) -> bool {
        match self {
            TokenKind::Azimuth | TokenKind::Distance => true,
            TokenKind::Coordinate(axis) => *axis != Axis::Altitude,
            _ => false,
        }
    }
}

/// A classified lexical unit of a memorial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Span text; canonical upper-case label for vertex names
    pub text: String,
    /// Byte range in the normalized document text
    pub position: TextPosition,
    pub page: u32,
    pub value: Option<f64>,
    /// Decimal digits written for coordinates (seconds for DMS values)
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateKind {
    /// UTM-like easting/northing in meters
    Projected,
    /// Longitude/latitude in decimal degrees
    Geographic,
}

/// A vertex position stated directly by the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteCoordinate {
    pub kind: CoordinateKind,
    /// Easting (m) or longitude (degrees)
    pub x: f64,
    /// Northing (m) or latitude (degrees)
    pub y: f64,
    pub altitude: Option<f64>,
    /// Fewest decimal digits written among the two planimetric values
    pub decimals: u8,
    /// Reference system declared where the coordinate appeared
    pub reference: Option<String>,
}

/// Which north the azimuths of a document refer to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AzimuthReference {
    Geodetic,
    Grid,
    #[default]
    Unspecified,
}

/// Directed edge of the traverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub from_vertex: String,
    pub to_vertex: String,
    /// Decimal degrees in [0, 360)
    pub azimuth: Option<f64>,
    /// Meters, strictly positive
    pub distance: Option<f64>,
    /// Coordinate of `from_vertex`
    pub absolute_coordinate: Option<AbsoluteCoordinate>,
    /// Coordinate of `to_vertex` when the document restates it
    pub to_coordinate: Option<AbsoluteCoordinate>,
    pub confrontation: Option<String>,
    pub page: u32,
}

impl Leg {
    pub fn has_measurement(&self) -> bool {
        self.azimuth.is_some() && self.distance.is_some()
    }
}

/// Ordered legs describing a (nominally closed) boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traverse {
    pub legs: Vec<Leg>,
    pub reference_system: Option<String>,
    pub precision_class: Option<String>,
    pub azimuth_reference: AzimuthReference,
}

impl Traverse {
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Closed when the last leg returns to the first vertex
    pub fn is_closed(&self) -> bool {
        self.is_range_closed(0..self.legs.len())
    }

    pub fn is_range_closed(&self, range: Range<usize>) -> bool {
        match (self.legs.get(range.start), range.end.checked_sub(1)) {
            (Some(first), Some(last)) if last >= range.start => self
                .legs
                .get(last)
                .is_some_and(|leg| leg.to_vertex == first.from_vertex),
            _ => false,
        }
    }

    /// Indices `i` where leg `i` does not start at the end of leg `i - 1`
    pub fn breaks(&self) -> Vec<usize> {
        self.legs
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].to_vertex != pair[1].from_vertex)
            .map(|(i, _)| i + 1)
            .collect()
    }

    pub fn contiguous_runs(&self) -> Vec<Range<usize>> {
        if self.legs.is_empty() {
            return Vec::new();
        }
        let mut runs = Vec::new();
        let mut start = 0;
        for brk in self.breaks() {
            runs.push(start..brk);
            start = brk;
        }
        runs.push(start..self.legs.len());
        runs
    }

    /// Longest run of connected legs; the earliest wins a tie
    pub fn largest_contiguous_run(&self) -> Range<usize> {
        self.contiguous_runs()
            .into_iter()
            .fold(0..0, |best, run| if run.len() > best.len() { run } else { best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(from: &str, to: &str) -> Leg {
        Leg {
            from_vertex: from.to_string(),
            to_vertex: to.to_string(),
            azimuth: Some(0.0),
            distance: Some(1.0),
            absolute_coordinate: None,
            to_coordinate: None,
            confrontation: None,
            page: 1,
        }
    }

    #[test]
    fn test_altitude_is_not_geometric() {
        assert!(TokenKind::Azimuth.is_geometric());
        assert!(TokenKind::Coordinate(Axis::Latitude).is_geometric());
        assert!(!TokenKind::Coordinate(Axis::Altitude).is_geometric());
        assert!(!TokenKind::MalformedLeg.is_geometric());
    }

    #[test]
    fn test_closed_traverse() {
        let traverse = Traverse {
            legs: vec![leg("A", "B"), leg("B", "C"), leg("C", "A")],
            ..Default::default()
        };
        assert!(traverse.is_closed());
        assert!(traverse.breaks().is_empty());
        assert_eq!(traverse.largest_contiguous_run(), 0..3);
    }

    #[test]
    fn test_breaks_and_largest_run() {
        let traverse = Traverse {
            legs: vec![leg("A", "B"), leg("C", "D"), leg("D", "E"), leg("E", "C")],
            ..Default::default()
        };
        assert_eq!(traverse.breaks(), vec![1]);
        assert_eq!(traverse.contiguous_runs(), vec![0..1, 1..4]);
        assert_eq!(traverse.largest_contiguous_run(), 1..4);
        assert!(traverse.is_range_closed(1..4));
        assert!(!traverse.is_closed());
    }

    #[test]
    fn test_empty_traverse_is_open() {
        let traverse = Traverse::default();
        assert!(!traverse.is_closed());
        assert_eq!(traverse.largest_contiguous_run(), 0..0);
    }
}

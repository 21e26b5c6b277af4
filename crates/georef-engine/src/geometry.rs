//! Geometry validation
//!
//! Scores the largest contiguous run of a traverse against one tolerance
//! class: closure (from azimuth/distance legs and from stated coordinates),
//! relative precision, leg consistency, coordinate sanity and declared
//! area/perimeter. Area is always computed when the data allows, even if
//! closure fails.

use crate::extractors::numeric::parse_decimal;
use crate::geodesy::{
    azimuth_difference, azimuth_distance, leg_vector, signed_area, Planar, LENGTH_EPSILON,
};
use crate::tolerance::ToleranceClass;
use georef_types::{
    AbsoluteCoordinate, AzimuthReference, CoordinateKind, DocumentHeader, FieldKey, Finding,
    FindingCode, FindingLocation, Leg, Orientation, Traverse, TraverseMetrics,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref DECLARED_NUMBER: Regex = Regex::new(r"\d[\d.,]*\d|\d").unwrap();
    static ref SQUARE_METERS: Regex = Regex::new(r"(?i)m²|m2\b|metros\s+quadrados").unwrap();
}

/// Findings and metrics from the geometry check
#[derive(Debug, Clone)]
pub struct GeometryReport {
    pub findings: Vec<Finding>,
    pub metrics: TraverseMetrics,
}

/// Validate a traverse against a tolerance class
pub fn validate_geometry(
    traverse: &Traverse,
    class: &ToleranceClass,
    header: &DocumentHeader,
) -> GeometryReport {
    let run = traverse.largest_contiguous_run();
    let offset = run.start;
    let closed = traverse.is_range_closed(run.clone());
    let legs = &traverse.legs[run];

    let mut check = Check {
        legs,
        offset,
        class,
        findings: Vec::new(),
    };

    let frame = check.coordinate_frame(traverse);
    let vectors: Vec<Option<(f64, f64)>> = legs.iter().map(|leg| check.leg_delta(leg, frame.as_ref())).collect();
    let lengths: Vec<Option<f64>> = legs
        .iter()
        .zip(&vectors)
        .map(|(leg, vector)| leg.distance.or(vector.map(|(e, n)| e.hypot(n))))
        .collect();
    let perimeter: f64 = lengths.iter().flatten().sum();

    let vector_closure = vector_closure(legs);
    let coordinate_closure = check.coordinate_closure(frame.as_ref());
    let all_coordinates = !legs.is_empty() && legs.iter().all(|l| l.absolute_coordinate.is_some());
    let closure_error = vector_closure
        .or(coordinate_closure)
        .or(if closed && all_coordinates { Some(0.0) } else { None });

    if !closed {
        let (from, to) = match (legs.first(), legs.last()) {
            (Some(first), Some(last)) => (first.from_vertex.clone(), last.to_vertex.clone()),
            _ => (String::new(), String::new()),
        };
        check.findings.push(Finding::error(
            FindingCode::OpenTraverse,
            if legs.is_empty() {
                "No leg could be assembled from the document".to_string()
            } else {
                format!("Traverse starts at {} but ends at {}", from, to)
            },
        ));
    }

    let relative_precision = check.score_closure(closure_error, vector_closure, coordinate_closure, perimeter);
    check.leg_outliers(&lengths, perimeter);
    if let Some(frame) = &frame {
        check.leg_consistency(frame, traverse.azimuth_reference);
    }
    check.reference_consistency(traverse);
    check.coordinate_sanity(traverse);

    let (area, area_frame) = enclosed_area(legs, closed, &vectors, frame.as_ref());
    check.declared_values(header, area, perimeter);
    if let Some(max) = class.max_perimeter_m {
        if perimeter > max {
            check.findings.push(
                Finding::warning(
                    FindingCode::PerimeterOutOfBounds,
                    format!("Perimeter {:.2} m exceeds the class maximum of {:.2} m", perimeter, max),
                )
                .with_values(perimeter, max),
            );
        }
    }

    let metrics = TraverseMetrics {
        precision_class: class.label.clone(),
        leg_count: legs.len(),
        vertex_count: if closed { legs.len() } else { legs.len() + usize::from(!legs.is_empty()) },
        perimeter,
        closure_error,
        coordinate_closure_error: coordinate_closure,
        relative_precision,
        area_m2: area.map(f64::abs),
        area_ha: area.map(|a| a.abs() / 10_000.0),
        orientation: area.filter(|a| *a != 0.0).map(|a| {
            if a > 0.0 {
                Orientation::CounterClockwise
            } else {
                Orientation::Clockwise
            }
        }),
        area_frame,
    };
    debug!(
        class = %class.label,
        perimeter = metrics.perimeter,
        closure = ?metrics.closure_error,
        ratio = ?metrics.relative_precision,
        "Geometry checked"
    );

    GeometryReport {
        findings: check.findings,
        metrics,
    }
}

struct Check<'a> {
    legs: &'a [Leg],
    /// Index of `legs[0]` in the full traverse
    offset: usize,
    class: &'a ToleranceClass,
    findings: Vec<Finding>,
}

fn snap(length: f64) -> f64 {
    if length.abs() < LENGTH_EPSILON {
        0.0
    } else {
        length
    }
}

/// Magnitude of the sum of all leg vectors, when every leg is measured
fn vector_closure(legs: &[Leg]) -> Option<f64> {
    if legs.is_empty() || !legs.iter().all(Leg::has_measurement) {
        return None;
    }
    let (east, north) = legs
        .iter()
        .filter_map(|leg| Some(leg_vector(leg.azimuth?, leg.distance?)))
        .fold((0.0, 0.0), |acc, (e, n)| (acc.0 + e, acc.1 + n));
    Some(snap(east.hypot(north)))
}

/// Signed area and the frame it was computed in
fn enclosed_area(
    legs: &[Leg],
    closed: bool,
    vectors: &[Option<(f64, f64)>],
    frame: Option<&(CoordinateKind, Planar)>,
) -> (Option<f64>, Option<CoordinateKind>) {
    if legs.len() < 2 {
        return (None, None);
    }
    if let Some((kind, planar)) = frame {
        let coordinates: Option<Vec<&AbsoluteCoordinate>> = legs
            .iter()
            .map(|leg| leg.absolute_coordinate.as_ref().filter(|c| c.kind == *kind))
            .collect();
        if let Some(coordinates) = coordinates {
            let mut points: Vec<(f64, f64)> = coordinates.iter().map(|c| planar.point(c)).collect();
            if !closed {
                if let Some(last) = legs.last().and_then(|l| l.to_coordinate.as_ref()) {
                    points.push(planar.point(last));
                }
            }
            return (Some(signed_area(&points)), Some(*kind));
        }
    }

    // Integrate positions from an arbitrary origin
    let deltas: Option<Vec<(f64, f64)>> = vectors.iter().copied().collect();
    let Some(deltas) = deltas else {
        return (None, None);
    };
    let mut points = Vec::with_capacity(deltas.len());
    let mut position = (0.0, 0.0);
    for (e, n) in deltas {
        points.push(position);
        position = (position.0 + e, position.1 + n);
    }
    if !closed {
        points.push(position);
    }
    (Some(signed_area(&points)), None)
}

impl<'a> Check<'a> {
    fn leg_location(&self, idx: usize) -> FindingLocation {
        let leg = &self.legs[idx];
        FindingLocation::Leg {
            index: self.offset + idx,
            from: leg.from_vertex.clone(),
            to: leg.to_vertex.clone(),
        }
    }

    /// Dominant coordinate kind of the run and a metric plane for it
    fn coordinate_frame(&self, traverse: &Traverse) -> Option<(CoordinateKind, Planar)> {
        let coordinates: Vec<&AbsoluteCoordinate> = self
            .legs
            .iter()
            .flat_map(|leg| [leg.absolute_coordinate.as_ref(), leg.to_coordinate.as_ref()])
            .flatten()
            .collect();
        let kind = coordinates.first()?.kind;
        debug!(kind = ?kind, crs = ?traverse.reference_system, "Coordinate frame");
        Some((kind, Planar::for_coordinates(kind, coordinates.iter().copied())))
    }

    /// Planimetric displacement of a leg: stated measurements first, else
    /// the difference of its endpoint coordinates
    fn leg_delta(&self, leg: &Leg, frame: Option<&(CoordinateKind, Planar)>) -> Option<(f64, f64)> {
        if let (Some(az), Some(d)) = (leg.azimuth, leg.distance) {
            return Some(leg_vector(az, d));
        }
        let (kind, planar) = frame?;
        match (&leg.absolute_coordinate, &leg.to_coordinate) {
            (Some(from), Some(to)) if from.kind == *kind && to.kind == *kind => {
                let a = planar.point(from);
                let b = planar.point(to);
                Some((b.0 - a.0, b.1 - a.1))
            }
            _ => None,
        }
    }

    /// Distance between the first stated coordinate and the coordinate
    /// stated at the end of the run
    fn coordinate_closure(&self, frame: Option<&(CoordinateKind, Planar)>) -> Option<f64> {
        let (kind, planar) = frame?;
        let first = self.legs.first()?.absolute_coordinate.as_ref()?;
        let last = self.legs.last()?.to_coordinate.as_ref()?;
        if first.kind != *kind || last.kind != *kind {
            return None;
        }
        let a = planar.point(first);
        let b = planar.point(last);
        Some(snap((b.0 - a.0).hypot(b.1 - a.1)))
    }

    fn allowed_linear_closure(&self, perimeter: f64) -> f64 {
        let ratio_limit = perimeter / self.class.min_closure_ratio;
        match self.class.max_linear_closure_m {
            Some(cap) => cap.min(ratio_limit),
            None => ratio_limit,
        }
    }

    fn score_closure(
        &mut self,
        closure_error: Option<f64>,
        vector: Option<f64>,
        coordinate: Option<f64>,
        perimeter: f64,
    ) -> Option<f64> {
        let Some(closure) = closure_error else {
            self.findings.push(Finding::error(
                FindingCode::ClosureUndetermined,
                "Closure cannot be computed: legs lack azimuth/distance and coordinates",
            ));
            return None;
        };

        if let (Some(vector), Some(coordinate)) = (vector, coordinate) {
            let difference = (vector - coordinate).abs();
            let allowed = self.allowed_linear_closure(perimeter);
            if difference > allowed {
                self.findings.push(
                    Finding::error(
                        FindingCode::ClosureMismatch,
                        format!(
                            "Closure from azimuths and distances ({:.3} m) disagrees with closure from coordinates ({:.3} m)",
                            vector, coordinate
                        ),
                    )
                    .with_values(difference, allowed),
                );
            }
        }

        if let Some(cap) = self.class.max_linear_closure_m {
            if closure > cap {
                self.findings.push(
                    Finding::error(
                        FindingCode::ClosureErrorExceeded,
                        format!("Linear closure error {:.3} m exceeds {:.3} m", closure, cap),
                    )
                    .with_values(closure, cap),
                );
            }
        }

        if closure <= 0.0 {
            return None;
        }
        let ratio = perimeter / closure;
        let required = self.class.min_closure_ratio;
        if ratio < required {
            self.findings.push(
                Finding::error(
                    FindingCode::ClosurePrecisionExceeded,
                    format!(
                        "Relative precision 1:{:.0} is below the required 1:{:.0} for class {}",
                        ratio, required, self.class.label
                    ),
                )
                .with_values(ratio, required),
            );
        }
        Some(ratio)
    }

    fn leg_outliers(&mut self, lengths: &[Option<f64>], perimeter: f64) {
        if perimeter <= 0.0 || self.legs.len() < 3 {
            return;
        }
        let limit = self.class.outlier_leg_fraction * perimeter;
        for (idx, length) in lengths.iter().enumerate() {
            let Some(length) = *length else { continue };
            if length > limit {
                let location = self.leg_location(idx);
                self.findings.push(
                    Finding::warning(
                        FindingCode::LegLengthOutlier,
                        format!(
                            "Leg of {:.2} m is more than {:.0}% of the perimeter",
                            length,
                            self.class.outlier_leg_fraction * 100.0
                        ),
                    )
                    .at(location)
                    .with_values(length, limit),
                );
            }
        }
    }

    /// Stated azimuth/distance against the ones implied by the endpoint
    /// coordinates, when both are expressed against the same north
    fn leg_consistency(&mut self, frame: &(CoordinateKind, Planar), reference: AzimuthReference) {
        let (kind, planar) = frame;
        let compatible = matches!(
            (kind, reference),
            (_, AzimuthReference::Unspecified)
                | (CoordinateKind::Geographic, AzimuthReference::Geodetic)
                | (CoordinateKind::Projected, AzimuthReference::Grid)
        );
        if !compatible {
            debug!(kind = ?kind, reference = ?reference, "Skipping leg consistency: azimuth frame differs");
            return;
        }

        for idx in 0..self.legs.len() {
            let leg = &self.legs[idx];
            let (Some(az), Some(d), Some(from), Some(to)) = (
                leg.azimuth,
                leg.distance,
                leg.absolute_coordinate.as_ref(),
                leg.to_coordinate.as_ref(),
            ) else {
                continue;
            };
            if from.kind != *kind || to.kind != *kind {
                continue;
            }
            let (computed_az, computed_d) = azimuth_distance(planar.point(from), planar.point(to));

            let distance_gap = (computed_d - d).abs();
            if distance_gap > self.class.max_distance_discrepancy_m {
                let location = self.leg_location(idx);
                self.findings.push(
                    Finding::error(
                        FindingCode::DistanceMismatch,
                        format!(
                            "Stated distance {:.3} m differs from {:.3} m between the stated coordinates",
                            d, computed_d
                        ),
                    )
                    .at(location)
                    .with_values(distance_gap, self.class.max_distance_discrepancy_m),
                );
            }

            if computed_d > LENGTH_EPSILON {
                let arcsec = azimuth_difference(az, computed_az).abs() * 3600.0;
                if arcsec > self.class.max_azimuth_discrepancy_arcsec {
                    let location = self.leg_location(idx);
                    self.findings.push(
                        Finding::error(
                            FindingCode::AzimuthMismatch,
                            format!(
                                "Stated azimuth {:.6}° differs from {:.6}° between the stated coordinates",
                                az, computed_az
                            ),
                        )
                        .at(location)
                        .with_values(arcsec, self.class.max_azimuth_discrepancy_arcsec),
                    );
                }
            }
        }
    }

    /// Vertices of the run with their coordinates, in traverse order
    fn vertex_coordinates(&self) -> Vec<(usize, &'a str, &'a AbsoluteCoordinate)> {
        let legs: &'a [Leg] = self.legs;
        let mut out: Vec<(usize, &'a str, &'a AbsoluteCoordinate)> = legs
            .iter()
            .enumerate()
            .filter_map(|(idx, leg)| {
                leg.absolute_coordinate
                    .as_ref()
                    .map(|c| (self.offset + idx, leg.from_vertex.as_str(), c))
            })
            .collect();
        if let Some(last) = legs.last() {
            if let Some(c) = last.to_coordinate.as_ref() {
                out.push((self.offset + legs.len(), last.to_vertex.as_str(), c));
            }
        }
        out
    }

    fn reference_consistency(&mut self, traverse: &Traverse) {
        let declared = traverse.reference_system.as_deref();
        let vertices = self.vertex_coordinates();
        let Some((_, _, first)) = vertices.first() else {
            return;
        };
        let base_reference = first.reference.as_deref().or(declared);

        let conflict = vertices.iter().find(|(_, _, c)| {
            c.kind != first.kind
                || !references_compatible(base_reference, c.reference.as_deref().or(declared))
        });
        if let Some((index, name, c)) = conflict {
            self.findings.push(
                Finding::error(
                    FindingCode::InconsistentReferenceSystem,
                    format!(
                        "Vertex {} uses {:?} coordinates in {} while the traverse starts in {:?} {}",
                        name,
                        c.kind,
                        c.reference.as_deref().or(declared).unwrap_or("an undeclared system"),
                        first.kind,
                        base_reference.unwrap_or("an undeclared system"),
                    ),
                )
                .at(FindingLocation::Vertex {
                    index: *index,
                    name: name.to_string(),
                }),
            );
        }
    }

    fn coordinate_sanity(&mut self, traverse: &Traverse) {
        let utm = traverse
            .reference_system
            .as_deref()
            .is_some_and(|r| r.contains("UTM"));
        let mut imprecise = Vec::new();
        let mut fewest = u8::MAX;
        let mut required_for_fewest = 0;

        for (index, name, c) in self.vertex_coordinates() {
            let in_range = match c.kind {
                CoordinateKind::Geographic => c.x.abs() <= 180.0 && c.y.abs() <= 90.0,
                CoordinateKind::Projected => {
                    let utm = utm || c.reference.as_deref().is_some_and(|r| r.contains("UTM"));
                    let easting = if utm {
                        (100_000.0..=900_000.0).contains(&c.x)
                    } else {
                        (0.0..=1_000_000.0).contains(&c.x)
                    };
                    easting && (0.0..=10_000_000.0).contains(&c.y)
                }
            };
            if !in_range {
                self.findings.push(
                    Finding::error(
                        FindingCode::CoordinateOutOfRange,
                        format!("Coordinate ({}, {}) of vertex {} is out of range", c.x, c.y, name),
                    )
                    .at(FindingLocation::Vertex {
                        index,
                        name: name.to_string(),
                    }),
                );
            }

            let required = match c.kind {
                CoordinateKind::Projected => self.class.min_coordinate_decimals,
                CoordinateKind::Geographic => self.class.min_arcsecond_decimals,
            };
            if c.decimals < required {
                imprecise.push(name);
                if c.decimals < fewest {
                    fewest = c.decimals;
                    required_for_fewest = required;
                }
            }
        }

        if !imprecise.is_empty() {
            self.findings.push(
                Finding::warning(
                    FindingCode::InsufficientCoordinatePrecision,
                    format!(
                        "{} vertex coordinate(s) written with too few decimals: {}",
                        imprecise.len(),
                        imprecise.join(", ")
                    ),
                )
                .with_values(fewest as f64, required_for_fewest as f64),
            );
        }
    }

    fn declared_values(&mut self, header: &DocumentHeader, area: Option<f64>, perimeter: f64) {
        if let (Some(raw), Some(area)) = (header.get(FieldKey::DeclaredArea), area) {
            if let Some(declared_ha) = declared_area_ha(raw) {
                let computed_ha = area.abs() / 10_000.0;
                if declared_ha > 0.0 {
                    let discrepancy = (computed_ha - declared_ha).abs() / declared_ha;
                    if discrepancy > self.class.max_area_discrepancy {
                        self.findings.push(
                            Finding::warning(
                                FindingCode::DeclaredAreaMismatch,
                                format!(
                                    "Declared area {:.4} ha differs from computed {:.4} ha",
                                    declared_ha, computed_ha
                                ),
                            )
                            .at(FindingLocation::Field {
                                field: FieldKey::DeclaredArea,
                            })
                            .with_values(discrepancy, self.class.max_area_discrepancy),
                        );
                    }
                }
            }
        }

        if let Some(declared) = header
            .get(FieldKey::DeclaredPerimeter)
            .and_then(first_number)
            .filter(|p| *p > 0.0)
        {
            if perimeter > 0.0 {
                let discrepancy = (perimeter - declared).abs() / declared;
                if discrepancy > self.class.max_perimeter_discrepancy {
                    self.findings.push(
                        Finding::warning(
                            FindingCode::DeclaredPerimeterMismatch,
                            format!(
                                "Declared perimeter {:.2} m differs from computed {:.2} m",
                                declared, perimeter
                            ),
                        )
                        .at(FindingLocation::Field {
                            field: FieldKey::DeclaredPerimeter,
                        })
                        .with_values(discrepancy, self.class.max_perimeter_discrepancy),
                    );
                }
            }
        }
    }
}

/// Same datum, and same UTM zone when both name one
fn references_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return true;
    };
    let (datum_a, zone_a) = parts(a);
    let (datum_b, zone_b) = parts(b);
    let same = |x: Option<String>, y: Option<String>| match (x, y) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    };
    same(datum_a, datum_b) && same(zone_a, zone_b)
}

/// Datum and UTM zone of a canonical reference label
fn parts(reference: &str) -> (Option<String>, Option<String>) {
    let mut datum = None;
    let mut zone = None;
    for part in reference.split(" / ") {
        match part.strip_prefix("UTM ") {
            Some(z) => zone = Some(z.to_string()),
            None => datum = Some(part.to_string()),
        }
    }
    (datum, zone)
}

fn first_number(raw: &str) -> Option<f64> {
    DECLARED_NUMBER
        .find(raw)
        .and_then(|m| parse_decimal(m.as_str()))
}

/// Declared area in hectares; values in square meters are converted
fn declared_area_ha(raw: &str) -> Option<f64> {
    let value = first_number(raw)?;
    if SQUARE_METERS.is_match(raw) {
        Some(value / 10_000.0)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class(ratio: f64) -> ToleranceClass {
        ToleranceClass {
            label: "TEST".to_string(),
            aliases: Vec::new(),
            min_closure_ratio: ratio,
            max_linear_closure_m: None,
            max_azimuth_discrepancy_arcsec: 10.0,
            max_distance_discrepancy_m: 0.05,
            min_coordinate_decimals: 2,
            min_arcsecond_decimals: 3,
            max_area_discrepancy: 0.01,
            max_perimeter_discrepancy: 0.01,
            max_perimeter_m: None,
            outlier_leg_fraction: 0.5,
        }
    }

    fn leg(from: &str, to: &str, az: f64, d: f64) -> Leg {
        Leg {
            from_vertex: from.to_string(),
            to_vertex: to.to_string(),
            azimuth: Some(az),
            distance: Some(d),
            absolute_coordinate: None,
            to_coordinate: None,
            confrontation: None,
            page: 1,
        }
    }

    fn projected(x: f64, y: f64) -> AbsoluteCoordinate {
        AbsoluteCoordinate {
            kind: CoordinateKind::Projected,
            x,
            y,
            altitude: None,
            decimals: 2,
            reference: Some("SIRGAS2000 / UTM 22S".to_string()),
        }
    }

    fn square(side: f64) -> Traverse {
        Traverse {
            legs: vec![
                leg("V1", "V2", 0.0, side),
                leg("V2", "V3", 90.0, side),
                leg("V3", "V4", 180.0, side),
                leg("V4", "V1", 270.0, side),
            ],
            ..Default::default()
        }
    }

    fn codes(report: &GeometryReport) -> Vec<FindingCode> {
        report.findings.iter().map(|f| f.code).collect()
    }

    #[test]
    fn test_unit_square_area_and_closure() {
        let report = validate_geometry(&square(1.0), &class(2500.0), &DocumentHeader::default());
        assert_eq!(report.metrics.closure_error, Some(0.0));
        assert_eq!(report.metrics.relative_precision, None);
        assert!((report.metrics.area_m2.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(report.metrics.orientation, Some(Orientation::Clockwise));
        assert_eq!(report.metrics.area_frame, None);
        assert_eq!(report.metrics.perimeter, 4.0);
        assert_eq!(report.metrics.vertex_count, 4);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_open_traverse_area_includes_last_vertex() {
        let mut traverse = square(1.0);
        traverse.legs.pop();
        let report = validate_geometry(&traverse, &class(2500.0), &DocumentHeader::default());
        assert!(codes(&report).contains(&FindingCode::OpenTraverse));
        assert!((report.metrics.area_m2.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(report.metrics.vertex_count, 4);
    }

    #[test]
    fn test_relative_precision_below_class() {
        // 4000 m perimeter, 4 m misclosure: 1:1000 against 1:2500
        let mut traverse = square(1000.0);
        traverse.legs[3].distance = Some(996.0);
        let report = validate_geometry(&traverse, &class(2500.0), &DocumentHeader::default());
        let finding = report
            .findings
            .iter()
            .find(|f| f.code == FindingCode::ClosurePrecisionExceeded)
            .unwrap();
        assert!((finding.measured_value.unwrap() - 999.0).abs() < 1e-6);
        assert_eq!(finding.tolerance_value, Some(2500.0));
    }

    #[test]
    fn test_two_leg_return() {
        // 501 m out, 499 m back: 2 m misclosure on 1000 m
        let short = Traverse {
            legs: vec![leg("A1", "A2", 90.0, 501.0), leg("A2", "A1", 270.0, 499.0)],
            ..Default::default()
        };
        let report = validate_geometry(&short, &class(2500.0), &DocumentHeader::default());
        assert_eq!(report.metrics.perimeter, 1000.0);
        let ratio = report.metrics.relative_precision.unwrap();
        assert!((ratio - 500.0).abs() < 1e-6);
        assert_eq!(
            codes(&report),
            vec![FindingCode::ClosurePrecisionExceeded]
        );
    }

    #[test]
    fn test_closure_invariant_to_start_vertex() {
        let mut traverse = square(100.0);
        traverse.legs[0].distance = Some(100.07);
        traverse.legs[1].azimuth = Some(90.01);
        let base = validate_geometry(&traverse, &class(100.0), &DocumentHeader::default());
        for shift in 1..4 {
            let mut rotated = traverse.clone();
            rotated.legs.rotate_left(shift);
            let report = validate_geometry(&rotated, &class(100.0), &DocumentHeader::default());
            let a = base.metrics.closure_error.unwrap();
            let b = report.metrics.closure_error.unwrap();
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_open_traverse_and_undetermined_closure() {
        let traverse = Traverse {
            legs: vec![Leg {
                azimuth: None,
                ..leg("A1", "A2", 0.0, 10.0)
            }],
            ..Default::default()
        };
        let report = validate_geometry(&traverse, &class(1000.0), &DocumentHeader::default());
        assert_eq!(
            codes(&report),
            vec![FindingCode::OpenTraverse, FindingCode::ClosureUndetermined]
        );
        assert_eq!(report.metrics.closure_error, None);
    }

    #[test]
    fn test_coordinate_only_polygon_closes_by_construction() {
        let coords = [
            projected(345_000.0, 7_456_000.0),
            projected(345_100.0, 7_456_000.0),
            projected(345_100.0, 7_456_100.0),
            projected(345_000.0, 7_456_100.0),
        ];
        let names = ["V1", "V2", "V3", "V4"];
        let legs = (0..4)
            .map(|i| Leg {
                from_vertex: names[i].to_string(),
                to_vertex: names[(i + 1) % 4].to_string(),
                azimuth: None,
                distance: None,
                absolute_coordinate: Some(coords[i].clone()),
                to_coordinate: Some(coords[(i + 1) % 4].clone()),
                confrontation: None,
                page: 1,
            })
            .collect();
        let traverse = Traverse {
            legs,
            reference_system: Some("SIRGAS2000 / UTM 22S".to_string()),
            ..Default::default()
        };
        let report = validate_geometry(&traverse, &class(10000.0), &DocumentHeader::default());
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.metrics.closure_error, Some(0.0));
        assert!((report.metrics.area_m2.unwrap() - 10_000.0).abs() < 1e-6);
        assert_eq!(report.metrics.area_ha, Some(1.0));
        assert_eq!(report.metrics.orientation, Some(Orientation::CounterClockwise));
        assert_eq!(report.metrics.area_frame, Some(CoordinateKind::Projected));
        assert!((report.metrics.perimeter - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_leg_consistency_against_coordinates() {
        let mut first = leg("V1", "V2", 90.0, 100.0);
        first.absolute_coordinate = Some(projected(345_000.0, 7_456_000.0));
        first.to_coordinate = Some(projected(345_100.0, 7_456_000.0));
        let mut bad = first.clone();
        bad.distance = Some(100.5);
        bad.azimuth = Some(90.1);

        let traverse = Traverse {
            legs: vec![first, leg("V2", "V1", 270.0, 100.0)],
            ..Default::default()
        };
        let report = validate_geometry(&traverse, &class(1000.0), &DocumentHeader::default());
        assert!(!report.findings.iter().any(|f| matches!(
            f.code,
            FindingCode::AzimuthMismatch | FindingCode::DistanceMismatch
        )));

        let mut traverse = traverse;
        traverse.legs[0] = bad;
        let report = validate_geometry(&traverse, &class(1000.0), &DocumentHeader::default());
        let codes = codes(&report);
        assert!(codes.contains(&FindingCode::DistanceMismatch));
        assert!(codes.contains(&FindingCode::AzimuthMismatch));

        // Grid coordinates are not compared with geodetic azimuths
        traverse.azimuth_reference = AzimuthReference::Geodetic;
        let report = validate_geometry(&traverse, &class(1000.0), &DocumentHeader::default());
        assert!(!report.findings.iter().any(|f| f.code == FindingCode::AzimuthMismatch));
    }

    #[test]
    fn test_inconsistent_reference_and_out_of_range() {
        let mut first = leg("V1", "V2", 0.0, 10.0);
        first.absolute_coordinate = Some(projected(345_000.0, 7_456_000.0));
        let mut second = leg("V2", "V3", 90.0, 10.0);
        second.absolute_coordinate = Some(AbsoluteCoordinate {
            reference: Some("SAD69 / UTM 22S".to_string()),
            ..projected(345_000.0, 7_456_010.0)
        });
        let mut third = leg("V3", "V1", 225.0, 200f64.sqrt());
        third.absolute_coordinate = Some(projected(12.0, 7_456_010.0));
        let traverse = Traverse {
            legs: vec![first, second, third],
            ..Default::default()
        };
        let report = validate_geometry(&traverse, &class(1.0), &DocumentHeader::default());
        let codes = codes(&report);
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == FindingCode::InconsistentReferenceSystem)
                .count(),
            1
        );
        assert!(codes.contains(&FindingCode::CoordinateOutOfRange));
    }

    #[test]
    fn test_insufficient_precision_is_aggregated() {
        let mut legs = square(10.0).legs;
        for (i, l) in legs.iter_mut().enumerate() {
            l.absolute_coordinate = Some(AbsoluteCoordinate {
                decimals: 1,
                ..projected(345_000.0 + (i % 2) as f64, 7_456_000.0)
            });
        }
        let traverse = Traverse {
            legs,
            ..Default::default()
        };
        let report = validate_geometry(&traverse, &class(1.0), &DocumentHeader::default());
        let precision: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.code == FindingCode::InsufficientCoordinatePrecision)
            .collect();
        assert_eq!(precision.len(), 1);
        assert_eq!(precision[0].measured_value, Some(1.0));
        assert_eq!(precision[0].tolerance_value, Some(2.0));
    }

    #[test]
    fn test_leg_outlier_and_perimeter_bound() {
        let traverse = Traverse {
            legs: vec![
                leg("V1", "V2", 90.0, 300.0),
                leg("V2", "V3", 180.0, 40.0),
                leg("V3", "V1", 277.594_643, 302.654_919),
            ],
            ..Default::default()
        };
        let mut tight = class(1.0);
        tight.outlier_leg_fraction = 0.4;
        tight.max_perimeter_m = Some(500.0);
        let report = validate_geometry(&traverse, &tight, &DocumentHeader::default());
        let codes = codes(&report);
        assert_eq!(
            codes
                .iter()
                .filter(|c| **c == FindingCode::LegLengthOutlier)
                .count(),
            2
        );
        assert!(codes.contains(&FindingCode::PerimeterOutOfBounds));
    }

    #[test]
    fn test_declared_area_and_perimeter() {
        let mut header = DocumentHeader::default();
        header.insert(FieldKey::DeclaredArea, "1,5000 ha".to_string(), 1);
        header.insert(FieldKey::DeclaredPerimeter, "400,00 m".to_string(), 2);
        let report = validate_geometry(&square(100.0), &class(1.0), &header);
        assert_eq!(codes(&report), vec![FindingCode::DeclaredAreaMismatch]);

        let mut header = DocumentHeader::default();
        header.insert(FieldKey::DeclaredArea, "10.000,00 m²".to_string(), 1);
        header.insert(FieldKey::DeclaredPerimeter, "450 m".to_string(), 2);
        let report = validate_geometry(&square(100.0), &class(1.0), &header);
        assert_eq!(codes(&report), vec![FindingCode::DeclaredPerimeterMismatch]);
    }

    #[test]
    fn test_linear_closure_cap() {
        let mut traverse = square(100.0);
        traverse.legs[3].distance = Some(99.0);
        let mut capped = class(10.0);
        capped.max_linear_closure_m = Some(0.5);
        let report = validate_geometry(&traverse, &capped, &DocumentHeader::default());
        assert_eq!(codes(&report), vec![FindingCode::ClosureErrorExceeded]);
    }

    #[test]
    fn test_references_compatible() {
        assert!(references_compatible(Some("SIRGAS2000"), Some("SIRGAS2000 / UTM 22S")));
        assert!(references_compatible(None, Some("SAD69")));
        assert!(!references_compatible(Some("SIRGAS2000"), Some("SAD69")));
        assert!(!references_compatible(
            Some("SIRGAS2000 / UTM 22S"),
            Some("SIRGAS2000 / UTM 23S")
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn class() -> ToleranceClass {
        ToleranceClass {
            label: "P".to_string(),
            aliases: Vec::new(),
            min_closure_ratio: 1.0,
            max_linear_closure_m: None,
            max_azimuth_discrepancy_arcsec: 1.0,
            max_distance_discrepancy_m: 1.0,
            min_coordinate_decimals: 0,
            min_arcsecond_decimals: 0,
            max_area_discrepancy: 1.0,
            max_perimeter_discrepancy: 1.0,
            max_perimeter_m: None,
            outlier_leg_fraction: 1.0,
        }
    }

    proptest! {
        /// Property: rotating the start vertex leaves closure and area unchanged
        #[test]
        fn start_vertex_invariance(
            measurements in proptest::collection::vec((0.0f64..360.0, 1.0f64..1000.0), 3..10),
            shift in 0usize..10,
        ) {
            let n = measurements.len();
            let legs: Vec<Leg> = measurements
                .iter()
                .enumerate()
                .map(|(i, (az, d))| Leg {
                    from_vertex: format!("V{}", i),
                    to_vertex: format!("V{}", (i + 1) % n),
                    azimuth: Some(*az),
                    distance: Some(*d),
                    absolute_coordinate: None,
                    to_coordinate: None,
                    confrontation: None,
                    page: 1,
                })
                .collect();
            let traverse = Traverse { legs, ..Default::default() };
            let mut rotated = traverse.clone();
            rotated.legs.rotate_left(shift % n);

            let header = DocumentHeader::default();
            let a = validate_geometry(&traverse, &class(), &header).metrics;
            let b = validate_geometry(&rotated, &class(), &header).metrics;
            let (ca, cb) = (a.closure_error.unwrap(), b.closure_error.unwrap());
            prop_assert!((ca - cb).abs() < 1e-6);
            prop_assert!((a.perimeter - b.perimeter).abs() < 1e-6);
        }

        /// Property: validation is deterministic
        #[test]
        fn deterministic(measurements in proptest::collection::vec((0.0f64..360.0, 1.0f64..1000.0), 1..8)) {
            let legs: Vec<Leg> = measurements
                .iter()
                .enumerate()
                .map(|(i, (az, d))| Leg {
                    from_vertex: format!("V{}", i),
                    to_vertex: format!("V{}", i + 1),
                    azimuth: Some(*az),
                    distance: Some(*d),
                    absolute_coordinate: None,
                    to_coordinate: None,
                    confrontation: None,
                    page: 1,
                })
                .collect();
            let traverse = Traverse { legs, ..Default::default() };
            let header = DocumentHeader::default();
            let a = validate_geometry(&traverse, &class(), &header);
            let b = validate_geometry(&traverse, &class(), &header);
            prop_assert_eq!(a.findings, b.findings);
            prop_assert_eq!(a.metrics, b.metrics);
        }
    }
}

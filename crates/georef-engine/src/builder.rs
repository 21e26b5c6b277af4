//! Vertex sequence builder
//!
//! Walks the token stream as a small state machine: a vertex name opens or
//! continues a leg, measurements accumulate until the next vertex name, and
//! coordinates attach to the most recently named vertex. Connectivity defects
//! become findings; nothing here aborts.

use crate::extractors::{canonical_reference, merge_reference};
use georef_types::{
    AbsoluteCoordinate, Axis, AzimuthReference, CoordinateKind, DocumentHeader, FieldKey,
    Finding, FindingCode, FindingLocation, Leg, Token, TokenKind, Traverse, VertexRole,
};
use std::collections::HashMap;
use tracing::debug;

/// Traverse plus the findings raised while assembling it
#[derive(Debug, Clone)]
pub struct Assembly {
    pub traverse: Traverse,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default)]
struct PartialCoordinate {
    kind: Option<CoordinateKind>,
    x: Option<(f64, u8)>,
    y: Option<(f64, u8)>,
    altitude: Option<f64>,
    reference: Option<String>,
}

impl PartialCoordinate {
    fn set(&mut self, axis: Axis, value: f64, decimals: u8, reference: Option<&str>) {
        let Some(kind) = axis.kind() else {
            self.altitude = Some(value);
            return;
        };
        match self.kind {
            Some(current) if current == kind => {}
            // A second frame for the same vertex only replaces an incomplete first one
            Some(_) if self.is_complete() => return,
            _ => {
                self.kind = Some(kind);
                self.x = None;
                self.y = None;
                self.reference = reference.map(str::to_string);
            }
        }
        match axis {
            Axis::Easting | Axis::Longitude => self.x.get_or_insert((value, decimals)),
            _ => self.y.get_or_insert((value, decimals)),
        };
    }

    fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    fn is_partial(&self) -> bool {
        self.x.is_some() != self.y.is_some()
    }

    fn resolve(&self) -> Option<AbsoluteCoordinate> {
        match (self.kind, self.x, self.y) {
            (Some(kind), Some((x, dx)), Some((y, dy))) => Some(AbsoluteCoordinate {
                kind,
                x,
                y,
                altitude: self.altitude,
                decimals: dx.min(dy),
                reference: self.reference.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct VertexRecord {
    name: String,
    coordinate: PartialCoordinate,
    /// Reached through "até"/"ao" or a table target column
    arrived_explicitly: bool,
}

#[derive(Debug, Clone, Default)]
struct PendingLeg {
    azimuth: Option<f64>,
    distance: Option<f64>,
    confrontation: Option<String>,
    malformed: bool,
    page: Option<u32>,
}

impl PendingLeg {
    fn has_measurement(&self) -> bool {
        self.azimuth.is_some() || self.distance.is_some() || self.malformed
    }
}

#[derive(Debug, Clone)]
struct LegDraft {
    from: usize,
    to: usize,
    pending: PendingLeg,
    page: u32,
}

struct Builder {
    vertices: Vec<VertexRecord>,
    current: Option<usize>,
    pending: PendingLeg,
    legs: Vec<LegDraft>,
    reference: Option<String>,
    findings: Vec<Finding>,
}

/// Assemble the traverse described by a token stream
pub fn build_traverse(
    tokens: &[Token],
    header: &DocumentHeader,
    azimuth_reference: AzimuthReference,
) -> Assembly {
    let header_reference = header
        .get(FieldKey::ReferenceSystem)
        .filter(|value| !value.trim().is_empty())
        .map(|value| canonical_reference(value).unwrap_or_else(|| value.trim().to_uppercase()));

    let mut builder = Builder {
        vertices: Vec::new(),
        current: None,
        pending: PendingLeg::default(),
        legs: Vec::new(),
        reference: header_reference.clone(),
        findings: Vec::new(),
    };
    for token in tokens {
        builder.feed(token);
    }
    builder.finish(header_reference, header, azimuth_reference)
}

impl Builder {
    fn feed(&mut self, token: &Token) {
        match token.kind {
            TokenKind::VertexName(VertexRole::Station) => self.station(&token.text, token.page),
            TokenKind::VertexName(VertexRole::Target) => self.target(&token.text, token.page),
            TokenKind::Azimuth => {
                if self.pending.azimuth.is_none() {
                    self.pending.azimuth = token.value;
                    self.pending.page.get_or_insert(token.page);
                } else {
                    debug!(text = %token.text, "Ignoring second azimuth for the same leg");
                }
            }
            TokenKind::Distance => {
                if self.pending.distance.is_none() {
                    self.pending.distance = token.value;
                    self.pending.page.get_or_insert(token.page);
                } else {
                    debug!(text = %token.text, "Ignoring second distance for the same leg");
                }
            }
            TokenKind::MalformedLeg => self.malformed(token),
            TokenKind::Coordinate(axis) => self.coordinate(axis, token),
            TokenKind::OwnerName => {
                self.pending
                    .confrontation
                    .get_or_insert_with(|| token.text.clone());
            }
            TokenKind::ReferenceSystem => {
                self.reference = Some(merge_reference(self.reference.as_deref(), &token.text));
            }
            TokenKind::Unknown => {}
        }
    }

    fn start_vertex(&mut self, name: &str, arrived_explicitly: bool) -> usize {
        self.vertices.push(VertexRecord {
            name: name.to_string(),
            coordinate: PartialCoordinate::default(),
            arrived_explicitly,
        });
        let idx = self.vertices.len() - 1;
        self.current = Some(idx);
        idx
    }

    fn station(&mut self, name: &str, page: u32) {
        let Some(current) = self.current else {
            self.flush_orphan_measurements();
            self.start_vertex(name, false);
            return;
        };
        let record = &self.vertices[current];

        if record.name == name && !self.pending.has_measurement() {
            // Restated, e.g. "até o vértice B; do vértice B segue..."
            return;
        }
        if self.pending.has_measurement() {
            self.close_leg(current, name, false, page);
        } else if record.arrived_explicitly
            || (!self.legs.is_empty() && !record.coordinate.is_complete())
        {
            debug!(from = %record.name, to = name, "Vertex named without a connecting leg");
            self.start_vertex(name, false);
        } else if record.coordinate.is_complete() {
            self.close_leg(current, name, false, page);
        } else {
            // A prelude mention with no data, e.g. "Inicia-se no vértice A"
            // followed by a restatement under another label
            self.start_vertex(name, false);
        }
    }

    fn target(&mut self, name: &str, page: u32) {
        match self.current {
            Some(current) => self.close_leg(current, name, true, page),
            None => {
                self.flush_orphan_measurements();
                self.start_vertex(name, true);
            }
        }
    }

    fn close_leg(&mut self, from: usize, to_name: &str, explicit: bool, page: u32) {
        let to = self.start_vertex(to_name, explicit);
        let pending = std::mem::take(&mut self.pending);
        let page = pending.page.unwrap_or(page);
        self.legs.push(LegDraft {
            from,
            to,
            pending,
            page,
        });
    }

    /// Measurements seen before any vertex was named
    fn flush_orphan_measurements(&mut self) {
        if self.pending.azimuth.is_some() || self.pending.distance.is_some() {
            self.findings.push(Finding::warning(
                FindingCode::IncompleteLeg,
                "Azimuth or distance stated before any vertex was named",
            ));
        }
        self.pending = PendingLeg::default();
    }

    fn malformed(&mut self, token: &Token) {
        self.pending.malformed = true;
        self.pending.page.get_or_insert(token.page);
        let mut finding = Finding::error(
            FindingCode::MalformedLeg,
            format!(
                "Unreadable azimuth or distance '{}' on page {}",
                token.text, token.page
            ),
        );
        if let Some(current) = self.current {
            finding = finding.at(FindingLocation::Vertex {
                index: self.legs.len(),
                name: self.vertices[current].name.clone(),
            });
        }
        self.findings.push(finding);
    }

    fn coordinate(&mut self, axis: Axis, token: &Token) {
        let Some(value) = token.value else {
            return;
        };
        let decimals = token.decimals.unwrap_or(0);
        match self.current {
            Some(current) => {
                let reference = self.reference.clone();
                self.vertices[current]
                    .coordinate
                    .set(axis, value, decimals, reference.as_deref());
            }
            None => self.findings.push(Finding::info(
                FindingCode::CoordinateWithoutVertex,
                format!("Coordinate '{}' appears before any vertex name", token.text),
            )),
        }
    }

    fn finish(
        mut self,
        header_reference: Option<String>,
        header: &DocumentHeader,
        azimuth_reference: AzimuthReference,
    ) -> Assembly {
        if self.pending.azimuth.is_some() || self.pending.distance.is_some() {
            let mut finding = Finding::warning(
                FindingCode::IncompleteLeg,
                "Azimuth or distance never reaches a following vertex",
            );
            if let Some(current) = self.current {
                finding = finding.at(FindingLocation::Vertex {
                    index: self.legs.len(),
                    name: self.vertices[current].name.clone(),
                });
            }
            self.findings.push(finding);
        }

        // A target that repeats an earlier label without restating its
        // coordinates, e.g. the return to the first vertex, takes the
        // coordinates stated for that label
        let mut stated: HashMap<&str, AbsoluteCoordinate> = HashMap::new();
        for record in &self.vertices {
            if let Some(coordinate) = record.coordinate.resolve() {
                stated.entry(record.name.as_str()).or_insert(coordinate);
            }
        }
        let legs: Vec<Leg> = self
            .legs
            .iter()
            .map(|draft| {
                let to = &self.vertices[draft.to];
                Leg {
                    from_vertex: self.vertices[draft.from].name.clone(),
                    to_vertex: to.name.clone(),
                    azimuth: draft.pending.azimuth,
                    distance: draft.pending.distance,
                    absolute_coordinate: self.vertices[draft.from].coordinate.resolve(),
                    to_coordinate: to
                        .coordinate
                        .resolve()
                        .or_else(|| stated.get(to.name.as_str()).cloned()),
                    confrontation: draft.pending.confrontation.clone(),
                    page: draft.page,
                }
            })
            .collect();

        for (index, (leg, draft)) in legs.iter().zip(&self.legs).enumerate() {
            if !draft.pending.malformed && leg.azimuth.is_some() != leg.distance.is_some() {
                let missing = if leg.azimuth.is_none() { "azimuth" } else { "distance" };
                self.findings.push(
                    Finding::warning(
                        FindingCode::IncompleteLeg,
                        format!(
                            "Leg {} -> {} has no {}",
                            leg.from_vertex, leg.to_vertex, missing
                        ),
                    )
                    .at(FindingLocation::Leg {
                        index,
                        from: leg.from_vertex.clone(),
                        to: leg.to_vertex.clone(),
                    }),
                );
            }
        }

        for (index, record) in self.vertices.iter().enumerate() {
            if record.coordinate.is_partial() {
                let position = self
                    .legs
                    .iter()
                    .position(|d| d.from == index)
                    .or_else(|| self.legs.iter().position(|d| d.to == index).map(|p| p + 1))
                    .unwrap_or(0);
                self.findings.push(
                    Finding::warning(
                        FindingCode::IncompleteCoordinate,
                        format!("Vertex {} states only one planimetric coordinate", record.name),
                    )
                    .at(FindingLocation::Vertex {
                        index: position,
                        name: record.name.clone(),
                    }),
                );
            }
        }

        let traverse = Traverse {
            legs,
            reference_system: header_reference.or(self.reference.clone()),
            precision_class: header
                .get(FieldKey::PrecisionClass)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            azimuth_reference,
        };

        self.findings.extend(connectivity_findings(&traverse));
        debug!(
            legs = traverse.legs.len(),
            breaks = traverse.breaks().len(),
            closed = traverse.is_closed(),
            "Assembled traverse"
        );

        Assembly {
            traverse,
            findings: self.findings,
        }
    }
}

/// One `DISCONTINUOUS_TRAVERSE` per break and one `DUPLICATE_VERTEX` per
/// repeated label
fn connectivity_findings(traverse: &Traverse) -> Vec<Finding> {
    let mut findings = Vec::new();
    for brk in traverse.breaks() {
        let previous = &traverse.legs[brk - 1];
        let leg = &traverse.legs[brk];
        findings.push(
            Finding::error(
                FindingCode::DiscontinuousTraverse,
                format!(
                    "Leg {} starts at {} but the previous leg ends at {}",
                    brk + 1,
                    leg.from_vertex,
                    previous.to_vertex
                ),
            )
            .at(FindingLocation::Leg {
                index: brk,
                from: leg.from_vertex.clone(),
                to: leg.to_vertex.clone(),
            }),
        );
    }

    let mut sequence: Vec<&str> = traverse.legs.iter().map(|l| l.from_vertex.as_str()).collect();
    if let (Some(first), Some(last)) = (traverse.legs.first(), traverse.legs.last()) {
        if last.to_vertex != first.from_vertex {
            sequence.push(last.to_vertex.as_str());
        }
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, name) in sequence.iter().enumerate() {
        if let Some(first_index) = seen.get(name) {
            findings.push(
                Finding::warning(
                    FindingCode::DuplicateVertex,
                    format!(
                        "Vertex {} appears at positions {} and {}",
                        name,
                        first_index + 1,
                        index + 1
                    ),
                )
                .at(FindingLocation::Vertex {
                    index,
                    name: name.to_string(),
                }),
            );
        } else {
            seen.insert(name, index);
        }
    }
    findings
}

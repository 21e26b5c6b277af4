// Traverse-level requirements: vertex count, confrontations, reference
// system and vertex coordinates
use super::RuleSet;
use georef_types::{DocumentHeader, FieldKey, Finding, FindingCode, FindingLocation, Traverse};

/// Distinct vertices of a traverse; the closing return is not counted twice
pub fn vertex_count(traverse: &Traverse) -> usize {
    match traverse.legs.len() {
        0 => 0,
        n if traverse.is_closed() => n,
        n => n + 1,
    }
}

/// Validates the traverse against the structural rules of one class
pub fn check_structure(traverse: &Traverse, header: &DocumentHeader, rules: &RuleSet) -> Vec<Finding> {
    let mut findings = Vec::new();

    let vertices = vertex_count(traverse);
    if vertices < rules.min_vertex_count {
        findings.push(
            Finding::error(
                FindingCode::TooFewVertices,
                format!(
                    "Traverse has {} vertices, at least {} are required",
                    vertices, rules.min_vertex_count
                ),
            )
            .with_values(vertices as f64, rules.min_vertex_count as f64),
        );
    }

    if rules.require_confrontations {
        for (index, leg) in traverse.legs.iter().enumerate() {
            let named = leg
                .confrontation
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty());
            if !named {
                findings.push(
                    Finding::warning(
                        FindingCode::MissingConfrontation,
                        format!(
                            "No confronting owner stated for {} → {}",
                            leg.from_vertex, leg.to_vertex
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
    }

    if rules.require_reference_system
        && traverse.reference_system.is_none()
        && !header.contains(FieldKey::ReferenceSystem)
    {
        findings.push(Finding::error(
            FindingCode::MissingReferenceSystem,
            "No coordinate reference system is declared",
        ));
    }

    if rules.require_vertex_coordinates {
        for (index, name) in uncoordinated_vertices(traverse) {
            findings.push(
                Finding::error(
                    FindingCode::MissingVertexCoordinates,
                    format!("Vertex {} has no coordinates", name),
                )
                .at(FindingLocation::Vertex {
                    index,
                    name: name.to_string(),
                }),
            );
        }
    }

    findings
}

/// Vertices, by traverse position, whose coordinates were never stated
fn uncoordinated_vertices(traverse: &Traverse) -> Vec<(usize, &str)> {
    let mut missing = Vec::new();
    for (index, leg) in traverse.legs.iter().enumerate() {
        let restated = index
            .checked_sub(1)
            .and_then(|prev| traverse.legs[prev].to_coordinate.as_ref())
            .is_some();
        if leg.absolute_coordinate.is_none() && !restated {
            missing.push((index, leg.from_vertex.as_str()));
        }
    }
    if let Some(last) = traverse.legs.last() {
        if !traverse.is_closed() && last.to_coordinate.is_none() {
            missing.push((traverse.legs.len(), last.to_vertex.as_str()));
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_types::{AbsoluteCoordinate, CoordinateKind, Leg};
    use pretty_assertions::assert_eq;

    fn rules() -> RuleSet {
        RuleSet {
            mandatory_fields: Vec::new(),
            min_vertex_count: 3,
            require_confrontations: true,
            require_reference_system: true,
            require_vertex_coordinates: true,
        }
    }

    fn leg(from: &str, to: &str, owner: Option<&str>, coordinate: bool) -> Leg {
        Leg {
            from_vertex: from.to_string(),
            to_vertex: to.to_string(),
            azimuth: Some(0.0),
            distance: Some(1.0),
            absolute_coordinate: coordinate.then(|| AbsoluteCoordinate {
                kind: CoordinateKind::Projected,
                x: 500_000.0,
                y: 7_000_000.0,
                altitude: None,
                decimals: 2,
                reference: None,
            }),
            to_coordinate: None,
            confrontation: owner.map(str::to_string),
            page: 1,
        }
    }

    #[test]
    fn test_complete_triangle_passes() {
        let traverse = Traverse {
            legs: vec![
                leg("V1", "V2", Some("João"), true),
                leg("V2", "V3", Some("Estrada"), true),
                leg("V3", "V1", Some("Rio"), true),
            ],
            reference_system: Some("SIRGAS2000".to_string()),
            ..Default::default()
        };
        assert!(check_structure(&traverse, &DocumentHeader::default(), &rules()).is_empty());
        assert_eq!(vertex_count(&traverse), 3);
    }

    #[test]
    fn test_each_missing_item_reported_once() {
        let traverse = Traverse {
            legs: vec![leg("V1", "V2", Some("João"), true), leg("V2", "V1", None, false)],
            ..Default::default()
        };
        let findings = check_structure(&traverse, &DocumentHeader::default(), &rules());
        let codes: Vec<_> = findings.iter().map(|f| f.code).collect();
        assert_eq!(
            codes,
            vec![
                FindingCode::TooFewVertices,
                FindingCode::MissingConfrontation,
                FindingCode::MissingReferenceSystem,
                FindingCode::MissingVertexCoordinates,
            ]
        );
        assert_eq!(findings[0].measured_value, Some(2.0));
        assert_eq!(findings[1].position(), Some(1));
        assert_eq!(findings[3].position(), Some(1));
    }

    #[test]
    fn test_header_reference_satisfies_rule() {
        let traverse = Traverse {
            legs: vec![
                leg("V1", "V2", Some("A"), true),
                leg("V2", "V3", Some("B"), true),
                leg("V3", "V1", Some("C"), true),
            ],
            ..Default::default()
        };
        let mut header = DocumentHeader::default();
        header.insert(FieldKey::ReferenceSystem, "Sistema local".to_string(), 1);
        assert!(check_structure(&traverse, &header, &rules()).is_empty());
    }

    #[test]
    fn test_open_traverse_counts_last_vertex() {
        let traverse = Traverse {
            legs: vec![leg("V1", "V2", None, true), leg("V2", "V3", None, true)],
            ..Default::default()
        };
        assert_eq!(vertex_count(&traverse), 3);
        assert_eq!(uncoordinated_vertices(&traverse), vec![(2, "V3")]);
    }
}

use crate::core::models::frame::Frame;
use crate::core::utils::geometry::{angle_deg, centroid};
use crate::engine::error::AnalysisError;
use crate::engine::msa::AlignmentColumnMap;
use nalgebra::Point3;
use serde::Serialize;

/// Reference atom name used to anchor classification references.
const REFERENCE_ATOM_NAME: &str = "CA";

/// Angle at or above which a two-reference water counts as bridging.
const BRIDGING_THRESHOLD_DEG: f64 = 120.0;
/// Angle below which a two-reference water counts as pocket-buried.
const POCKET_THRESHOLD_DEG: f64 = 60.0;
/// Dipole angle at or below which a water donates toward the reference.
const DONOR_THRESHOLD_DEG: f64 = 60.0;
/// Dipole angle at or above which a water accepts away from the reference.
const ACCEPTOR_THRESHOLD_DEG: f64 = 120.0;

/// Functional orientation class of a water relative to the references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaterClassLabel {
    /// Sits between both references (wide reference–water–reference angle).
    Bridging,
    /// Off to the side of the reference axis.
    Lateral,
    /// Tucked toward both references (narrow angle).
    Pocket,
    /// Dipole pointing at the primary reference.
    DonorOriented,
    /// Dipole pointing away from the primary reference.
    AcceptorOriented,
    /// Not classifiable (single reference and no hydrogens).
    Unclassified,
}

/// Classification of one water in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterClassRecord {
    pub frame: usize,
    pub residue_id: isize,
    pub label: WaterClassLabel,
    /// Reference–water–reference angle, or the dipole angle in
    /// single-reference mode.
    pub angle_1: Option<f64>,
    /// Dipole angle when both a second reference and hydrogens are present.
    pub angle_2: Option<f64>,
}

/// Per-frame positions of the alignment-anchored reference residues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceAnchors {
    pub primary: Point3<f64>,
    pub secondary: Option<Point3<f64>>,
}

/// Resolves the configured reference columns to CA positions in a frame.
///
/// # Errors
///
/// [`AnalysisError::UnresolvedReference`] when a column has no mapped
/// residue in this structure; a selection error when the residue exists but
/// its CA atom does not resolve uniquely.
pub fn resolve_references(
    structure: &str,
    frame: &Frame,
    columns: &[usize],
    map: &AlignmentColumnMap,
) -> Result<ReferenceAnchors, AnalysisError> {
    let mut positions = Vec::with_capacity(2);
    for &column in columns.iter().take(2) {
        let residue_id =
            map.residue_at(structure, column)
                .ok_or_else(|| AnalysisError::UnresolvedReference {
                    structure: structure.to_string(),
                    column,
                })?;
        let reference = crate::core::utils::selection::AtomSelection::ResidueAtom {
            residue_id,
            atom_name: REFERENCE_ATOM_NAME.to_string(),
        }
        .resolve_one(frame)?;
        positions.push(reference.position);
    }

    match positions.as_slice() {
        [primary] => Ok(ReferenceAnchors {
            primary: *primary,
            secondary: None,
        }),
        [primary, secondary] => Ok(ReferenceAnchors {
            primary: *primary,
            secondary: Some(*secondary),
        }),
        _ => Err(AnalysisError::Internal(
            "water classification requires at least one reference column".to_string(),
        )),
    }
}

/// Classifies every water of a frame against the resolved references.
///
/// With two references the reference–water–reference angle decides the
/// class; with one reference the water dipole (oxygen toward the hydrogen
/// midpoint) against the water→reference direction decides it. A single
/// reference without modeled hydrogens yields `Unclassified` rather than a
/// guess.
pub fn classify_frame(frame: &Frame, anchors: &ReferenceAnchors) -> Vec<WaterClassRecord> {
    let atoms = frame.atoms();
    frame
        .waters()
        .iter()
        .map(|water| {
            let oxygen = &atoms[water.oxygen];
            let dipole_angle = dipole_angle(frame, water, &anchors.primary);

            let (label, angle_1, angle_2) = match anchors.secondary {
                Some(secondary) => {
                    let spread =
                        angle_deg(&anchors.primary, &oxygen.position, &secondary);
                    let label = if spread >= BRIDGING_THRESHOLD_DEG {
                        WaterClassLabel::Bridging
                    } else if spread < POCKET_THRESHOLD_DEG {
                        WaterClassLabel::Pocket
                    } else {
                        WaterClassLabel::Lateral
                    };
                    (label, Some(spread), dipole_angle)
                }
                None => match dipole_angle {
                    Some(beta) => {
                        let label = if beta <= DONOR_THRESHOLD_DEG {
                            WaterClassLabel::DonorOriented
                        } else if beta >= ACCEPTOR_THRESHOLD_DEG {
                            WaterClassLabel::AcceptorOriented
                        } else {
                            WaterClassLabel::Lateral
                        };
                        (label, Some(beta), None)
                    }
                    None => (WaterClassLabel::Unclassified, None, None),
                },
            };

            WaterClassRecord {
                frame: frame.index,
                residue_id: water.residue_id,
                label,
                angle_1,
                angle_2,
            }
        })
        .collect()
}

/// Angle between the water dipole and the oxygen→reference direction, when
/// hydrogens are modeled.
fn dipole_angle(
    frame: &Frame,
    water: &crate::core::models::frame::WaterMolecule,
    reference: &Point3<f64>,
) -> Option<f64> {
    if water.hydrogens.is_empty() {
        return None;
    }
    let atoms = frame.atoms();
    let oxygen = &atoms[water.oxygen];
    let hydrogen_positions: Vec<Point3<f64>> = water
        .hydrogens
        .iter()
        .map(|&i| atoms[i].position)
        .collect();
    let dipole_tip = centroid(&hydrogen_positions)?;
    Some(angle_deg(&dipole_tip, &oxygen.position, reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::engine::msa::{Alignment, ResidueSequence, build_column_map};
    use std::collections::BTreeMap;

    fn protein_ca(serial: usize, resid: isize, pos: [f64; 3]) -> Atom {
        Atom::new(
            serial,
            "CA",
            "C",
            resid,
            "GLY",
            'A',
            Point3::new(pos[0], pos[1], pos[2]),
        )
    }

    fn water(serial: usize, resid: isize, pos: [f64; 3]) -> Atom {
        Atom::new(
            serial,
            "O",
            "O",
            resid,
            "HOH",
            'W',
            Point3::new(pos[0], pos[1], pos[2]),
        )
    }

    fn column_map() -> AlignmentColumnMap {
        let sequences = BTreeMap::from([(
            "1abc".to_string(),
            ResidueSequence::new(vec![(10, 'G'), (11, 'G')]),
        )]);
        let alignment = Alignment::new(vec![("1abc".to_string(), "GG".to_string())]);
        build_column_map(&sequences, &alignment).unwrap()
    }

    #[test]
    fn water_between_references_is_bridging() {
        let frame = Frame::new(
            0,
            vec![
                protein_ca(1, 10, [-5.0, 0.0, 0.0]),
                protein_ca(2, 11, [5.0, 0.0, 0.0]),
                water(3, 100, [0.0, 0.5, 0.0]),
            ],
        );
        let map = column_map();
        let anchors = resolve_references("1abc", &frame, &[1, 2], &map).unwrap();
        let records = classify_frame(&frame, &anchors);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, WaterClassLabel::Bridging);
        assert!(records[0].angle_1.unwrap() > 160.0);
    }

    #[test]
    fn distant_lateral_water_is_pocket_classified() {
        // Both references seen under a narrow angle from far away.
        let frame = Frame::new(
            0,
            vec![
                protein_ca(1, 10, [-1.0, 0.0, 0.0]),
                protein_ca(2, 11, [1.0, 0.0, 0.0]),
                water(3, 100, [0.0, 30.0, 0.0]),
            ],
        );
        let map = column_map();
        let anchors = resolve_references("1abc", &frame, &[1, 2], &map).unwrap();
        let records = classify_frame(&frame, &anchors);
        assert_eq!(records[0].label, WaterClassLabel::Pocket);
    }

    #[test]
    fn single_reference_uses_dipole_orientation() {
        let frame = Frame::new(
            0,
            vec![
                protein_ca(1, 10, [5.0, 0.0, 0.0]),
                water(2, 100, [0.0, 0.0, 0.0]),
                Atom::new(3, "H1", "H", 100, "HOH", 'W', Point3::new(0.8, 0.5, 0.0)),
                Atom::new(4, "H2", "H", 100, "HOH", 'W', Point3::new(0.8, -0.5, 0.0)),
            ],
        );
        let map = column_map();
        let anchors = resolve_references("1abc", &frame, &[1], &map).unwrap();
        let records = classify_frame(&frame, &anchors);

        // Dipole points along +x, straight at the reference.
        assert_eq!(records[0].label, WaterClassLabel::DonorOriented);
        assert!(records[0].angle_1.unwrap() < 5.0);
    }

    #[test]
    fn single_reference_without_hydrogens_is_unclassified() {
        let frame = Frame::new(
            0,
            vec![
                protein_ca(1, 10, [5.0, 0.0, 0.0]),
                water(2, 100, [0.0, 0.0, 0.0]),
            ],
        );
        let map = column_map();
        let anchors = resolve_references("1abc", &frame, &[1], &map).unwrap();
        let records = classify_frame(&frame, &anchors);
        assert_eq!(records[0].label, WaterClassLabel::Unclassified);
        assert!(records[0].angle_1.is_none());
    }

    #[test]
    fn unmapped_column_is_an_unresolved_reference() {
        let frame = Frame::new(0, vec![protein_ca(1, 10, [0.0, 0.0, 0.0])]);
        let map = column_map();
        let err = resolve_references("1abc", &frame, &[9], &map).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UnresolvedReference { column: 9, .. }
        ));
    }
}

use crate::core::models::atom::Atom;
use crate::core::models::bond::{ConnectionKind, HydrogenBond};
use crate::core::models::frame::Frame;
use crate::core::utils::geometry::angle_deg;
use crate::engine::config::NetworkType;
use crate::engine::error::AnalysisError;
use crate::engine::neighbors;
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::debug;

/// Distance and angle thresholds for hydrogen-bond acceptance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HBondCriteria {
    /// Heavy-atom separation cutoff in Angstroms.
    pub max_distance: f64,
    /// Minimum donor–hydrogen–acceptor angle in degrees; `None` disables the
    /// angle test.
    pub angle_criteria: Option<f64>,
}

/// Detects the hydrogen bonds of one frame.
///
/// In distance-only mode (`include_hydrogens == false`) a bond is an
/// unordered heavy-atom pair within `max_distance`. In angle-aware mode each
/// orientation of a candidate pair is evaluated through the donor's attached
/// hydrogens and accepted bonds are directed donor → acceptor. Same-residue
/// pairs are never bonds. Water–protein pairs participate only when
/// `network_type` includes protein.
pub fn detect(
    frame: &Frame,
    network_type: NetworkType,
    include_hydrogens: bool,
    criteria: &HBondCriteria,
) -> Result<Vec<HydrogenBond>, AnalysisError> {
    let index = FrameIndex::build(frame, network_type);
    let mut bonds = Vec::new();

    detect_water_water(frame, &index, include_hydrogens, criteria, &mut bonds)?;
    if network_type.includes_protein() {
        detect_water_protein(frame, &index, include_hydrogens, criteria, &mut bonds)?;
    }

    debug!(
        frame = frame.index,
        bonds = bonds.len(),
        directed = include_hydrogens,
        "hydrogen-bond detection complete"
    );
    Ok(bonds)
}

/// Precomputed per-frame atom groups for bond detection.
struct FrameIndex {
    water_serials: Vec<usize>,
    water_positions: Vec<Point3<f64>>,
    /// Indices into `Frame::atoms` of each water's hydrogens, parallel to
    /// `water_serials`.
    water_hydrogens: Vec<Vec<usize>>,
    water_residues: Vec<(char, isize)>,

    protein_serials: Vec<usize>,
    protein_positions: Vec<Point3<f64>>,
    protein_residues: Vec<(char, isize)>,
    /// Hydrogens covalently attached to each polar protein heavy atom,
    /// keyed by the heavy atom's serial.
    protein_attached: HashMap<usize, Vec<usize>>,
}

impl FrameIndex {
    fn build(frame: &Frame, network_type: NetworkType) -> Self {
        let atoms = frame.atoms();

        let mut water_serials = Vec::new();
        let mut water_positions = Vec::new();
        let mut water_hydrogens = Vec::new();
        let mut water_residues = Vec::new();
        for water in frame.waters() {
            let oxygen = &atoms[water.oxygen];
            water_serials.push(oxygen.serial);
            water_positions.push(oxygen.position);
            water_hydrogens.push(water.hydrogens.clone());
            water_residues.push((water.chain_id, water.residue_id));
        }

        let mut protein_serials = Vec::new();
        let mut protein_positions = Vec::new();
        let mut protein_residues = Vec::new();
        let mut protein_attached = HashMap::new();
        if network_type.includes_protein() {
            for atom in frame.polar_protein_atoms() {
                protein_serials.push(atom.serial);
                protein_positions.push(atom.position);
                protein_residues.push((atom.chain_id, atom.residue_id));
            }
            for (h_index, hydrogen) in atoms.iter().enumerate() {
                if hydrogen.is_water() || !hydrogen.is_hydrogen() {
                    continue;
                }
                if let Some(parent) = nearest_heavy_in_residue(atoms, hydrogen) {
                    if parent.is_polar_heavy() {
                        protein_attached
                            .entry(parent.serial)
                            .or_insert_with(Vec::new)
                            .push(h_index);
                    }
                }
            }
        }

        Self {
            water_serials,
            water_positions,
            water_hydrogens,
            water_residues,
            protein_serials,
            protein_positions,
            protein_residues,
            protein_attached,
        }
    }
}

/// The covalent parent of a hydrogen: the nearest heavy atom within the same
/// residue.
fn nearest_heavy_in_residue<'a>(atoms: &'a [Atom], hydrogen: &Atom) -> Option<&'a Atom> {
    atoms
        .iter()
        .filter(|a| {
            !a.is_hydrogen()
                && a.chain_id == hydrogen.chain_id
                && a.residue_id == hydrogen.residue_id
        })
        .min_by(|a, b| {
            let da = (a.position - hydrogen.position).norm();
            let db = (b.position - hydrogen.position).norm();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn detect_water_water(
    frame: &Frame,
    index: &FrameIndex,
    include_hydrogens: bool,
    criteria: &HBondCriteria,
    bonds: &mut Vec<HydrogenBond>,
) -> Result<(), AnalysisError> {
    let pairs = neighbors::pairs_within(
        &index.water_serials,
        &index.water_positions,
        criteria.max_distance,
    )?;

    for pair in pairs {
        if index.water_residues[pair.i] == index.water_residues[pair.j] {
            continue;
        }
        if !include_hydrogens {
            bonds.push(undirected_bond(index, pair.i, pair.j, pair.distance));
            continue;
        }
        // Evaluate both orientations; each water can donate to the other.
        for (donor, acceptor) in [(pair.i, pair.j), (pair.j, pair.i)] {
            if let Some(bond) = directed_water_donor_bond(
                frame,
                index,
                donor,
                acceptor,
                pair.distance,
                criteria,
            ) {
                bonds.push(bond);
            }
        }
    }
    Ok(())
}

fn detect_water_protein(
    frame: &Frame,
    index: &FrameIndex,
    include_hydrogens: bool,
    criteria: &HBondCriteria,
    bonds: &mut Vec<HydrogenBond>,
) -> Result<(), AnalysisError> {
    let pairs = neighbors::pairs_between(
        &index.water_serials,
        &index.water_positions,
        &index.protein_serials,
        &index.protein_positions,
        criteria.max_distance,
    )?;

    let atoms = frame.atoms();
    for pair in pairs {
        if index.water_residues[pair.i] == index.protein_residues[pair.j] {
            continue;
        }
        let water_serial = index.water_serials[pair.i];
        let protein_serial = index.protein_serials[pair.j];
        let protein_atom = frame
            .atom_by_serial(protein_serial)
            .expect("indexed protein atom exists");

        if !include_hydrogens {
            bonds.push(HydrogenBond {
                donor: water_serial.min(protein_serial),
                acceptor: water_serial.max(protein_serial),
                hydrogen: None,
                distance: pair.distance,
                angle: None,
                directed: false,
                kind: ConnectionKind::WaterProtein,
                partner_role: Some(protein_atom.role),
                residues: residue_pair(index, pair.i, pair.j),
            });
            continue;
        }

        // Water as donor: its hydrogens point at the protein acceptor.
        let water_pos = index.water_positions[pair.i];
        for &h_index in &index.water_hydrogens[pair.i] {
            let h = &atoms[h_index];
            let angle = angle_deg(&water_pos, &h.position, &protein_atom.position);
            if criteria.angle_criteria.is_none_or(|min| angle >= min) {
                bonds.push(HydrogenBond {
                    donor: water_serial,
                    acceptor: protein_serial,
                    hydrogen: Some(h.serial),
                    distance: pair.distance,
                    angle: Some(angle),
                    directed: true,
                    kind: ConnectionKind::WaterProtein,
                    partner_role: Some(protein_atom.role),
                    residues: (
                        index.water_residues[pair.i].1,
                        index.protein_residues[pair.j].1,
                    ),
                });
                break;
            }
        }

        // Protein as donor: hydrogens attached to the polar heavy atom.
        if let Some(attached) = index.protein_attached.get(&protein_serial) {
            for &h_index in attached {
                let h = &atoms[h_index];
                let angle = angle_deg(&protein_atom.position, &h.position, &water_pos);
                if criteria.angle_criteria.is_none_or(|min| angle >= min) {
                    bonds.push(HydrogenBond {
                        donor: protein_serial,
                        acceptor: water_serial,
                        hydrogen: Some(h.serial),
                        distance: pair.distance,
                        angle: Some(angle),
                        directed: true,
                        kind: ConnectionKind::WaterProtein,
                        partner_role: Some(protein_atom.role),
                        residues: (
                            index.protein_residues[pair.j].1,
                            index.water_residues[pair.i].1,
                        ),
                    });
                    break;
                }
            }
        }
    }
    Ok(())
}

fn undirected_bond(index: &FrameIndex, i: usize, j: usize, distance: f64) -> HydrogenBond {
    let (lo, hi) = if index.water_serials[i] <= index.water_serials[j] {
        (i, j)
    } else {
        (j, i)
    };
    HydrogenBond {
        donor: index.water_serials[lo],
        acceptor: index.water_serials[hi],
        hydrogen: None,
        distance,
        angle: None,
        directed: false,
        kind: ConnectionKind::WaterWater,
        partner_role: None,
        residues: (index.water_residues[lo].1, index.water_residues[hi].1),
    }
}

/// Evaluates one water-donor orientation of a water–water pair, returning the
/// bond through the first hydrogen that satisfies the angle criterion.
fn directed_water_donor_bond(
    frame: &Frame,
    index: &FrameIndex,
    donor: usize,
    acceptor: usize,
    distance: f64,
    criteria: &HBondCriteria,
) -> Option<HydrogenBond> {
    let atoms = frame.atoms();
    let donor_pos = index.water_positions[donor];
    let acceptor_pos = index.water_positions[acceptor];

    for &h_index in &index.water_hydrogens[donor] {
        let h = &atoms[h_index];
        let angle = angle_deg(&donor_pos, &h.position, &acceptor_pos);
        if criteria.angle_criteria.is_none_or(|min| angle >= min) {
            return Some(HydrogenBond {
                donor: index.water_serials[donor],
                acceptor: index.water_serials[acceptor],
                hydrogen: Some(h.serial),
                distance,
                angle: Some(angle),
                directed: true,
                kind: ConnectionKind::WaterWater,
                partner_role: None,
                residues: (
                    index.water_residues[donor].1,
                    index.water_residues[acceptor].1,
                ),
            });
        }
    }
    None
}

fn residue_pair(index: &FrameIndex, water: usize, protein: usize) -> (isize, isize) {
    let water_serial = index.water_serials[water];
    let protein_serial = index.protein_serials[protein];
    if water_serial <= protein_serial {
        (
            index.water_residues[water].1,
            index.protein_residues[protein].1,
        )
    } else {
        (
            index.protein_residues[protein].1,
            index.water_residues[water].1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn water_oxygen(serial: usize, resid: isize, pos: [f64; 3]) -> Atom {
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

    fn water_hydrogen(serial: usize, resid: isize, pos: [f64; 3]) -> Atom {
        Atom::new(
            serial,
            "H1",
            "H",
            resid,
            "HOH",
            'W',
            Point3::new(pos[0], pos[1], pos[2]),
        )
    }

    fn criteria(max_distance: f64, angle: Option<f64>) -> HBondCriteria {
        HBondCriteria {
            max_distance,
            angle_criteria: angle,
        }
    }

    #[test]
    fn square_of_waters_produces_four_edges() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_oxygen(2, 2, [2.8, 0.0, 0.0]),
                water_oxygen(3, 3, [2.8, 2.8, 0.0]),
                water_oxygen(4, 4, [0.0, 2.8, 0.0]),
            ],
        );
        let bonds = detect(
            &frame,
            NetworkType::WaterWater,
            false,
            &criteria(3.0, None),
        )
        .unwrap();

        let mut pairs: Vec<(usize, usize)> = bonds.iter().map(|b| b.canonical_pair()).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 2), (1, 4), (2, 3), (3, 4)]);
        assert!(bonds.iter().all(|b| !b.directed && b.distance <= 3.0));
    }

    #[test]
    fn wide_angle_donor_is_accepted_and_directed() {
        // Donor at origin, hydrogen on the x-axis, acceptor placed for a
        // 150-degree donor-H-acceptor angle at 2.9 A heavy separation.
        let h_pos = [0.96, 0.0, 0.0];
        let angle = 150.0f64.to_radians();
        let reach = 2.9 - 0.96; // puts the heavy pair near 2.9 A
        let acceptor = [
            0.96 - reach * angle.cos(),
            reach * angle.sin(),
            0.0,
        ];
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_hydrogen(2, 1, h_pos),
                water_oxygen(3, 2, acceptor),
            ],
        );
        let bonds = detect(
            &frame,
            NetworkType::WaterWater,
            true,
            &criteria(3.0, Some(120.0)),
        )
        .unwrap();

        assert_eq!(bonds.len(), 1);
        let bond = &bonds[0];
        assert!(bond.directed);
        assert_eq!(bond.donor, 1);
        assert_eq!(bond.acceptor, 3);
        assert_eq!(bond.hydrogen, Some(2));
        assert!((bond.angle.unwrap() - 150.0).abs() < 1.0);
    }

    #[test]
    fn narrow_angle_donor_is_rejected() {
        let h_pos = [0.96, 0.0, 0.0];
        let angle = 100.0f64.to_radians();
        let reach = 2.9 - 0.96;
        let acceptor = [
            0.96 - reach * angle.cos(),
            reach * angle.sin(),
            0.0,
        ];
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_hydrogen(2, 1, h_pos),
                water_oxygen(3, 2, acceptor),
            ],
        );
        let bonds = detect(
            &frame,
            NetworkType::WaterWater,
            true,
            &criteria(3.0, Some(120.0)),
        )
        .unwrap();
        assert!(bonds.is_empty());
    }

    #[test]
    fn water_protein_bonds_require_protein_network_type() {
        let atoms = vec![
            water_oxygen(1, 100, [0.0, 0.0, 0.0]),
            Atom::new(2, "N", "N", 10, "GLY", 'A', Point3::new(2.9, 0.0, 0.0)),
        ];
        let frame = Frame::new(0, atoms);

        let without = detect(
            &frame,
            NetworkType::WaterWater,
            false,
            &criteria(3.0, None),
        )
        .unwrap();
        assert!(without.is_empty());

        let with = detect(
            &frame,
            NetworkType::WaterProtein,
            false,
            &criteria(3.0, None),
        )
        .unwrap();
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].kind, ConnectionKind::WaterProtein);
        assert_eq!(with[0].partner_role, Some(crate::core::models::atom::AtomRole::Backbone));
    }

    #[test]
    fn multiple_hydrogens_accept_on_first_satisfying_one() {
        // First hydrogen points away from the acceptor (bad angle), the
        // second points toward it (good angle).
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_hydrogen(2, 1, [-0.7, 0.7, 0.0]),
                Atom::new(3, "H2", "H", 1, "HOH", 'W', Point3::new(0.9, 0.2, 0.0)),
                water_oxygen(4, 2, [2.8, 0.6, 0.0]),
            ],
        );
        let bonds = detect(
            &frame,
            NetworkType::WaterWater,
            true,
            &criteria(3.0, Some(120.0)),
        )
        .unwrap();

        let donor_bonds: Vec<_> = bonds.iter().filter(|b| b.donor == 1).collect();
        assert_eq!(donor_bonds.len(), 1);
        assert_eq!(donor_bonds[0].hydrogen, Some(3));
    }

    #[test]
    fn same_residue_pairs_are_excluded() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_oxygen(2, 1, [2.0, 0.0, 0.0]),
            ],
        );
        // Both oxygens claim residue 1; the pair must not become a bond.
        let bonds = detect(
            &frame,
            NetworkType::WaterWater,
            false,
            &criteria(3.0, None),
        )
        .unwrap();
        assert!(bonds.is_empty());
    }
}

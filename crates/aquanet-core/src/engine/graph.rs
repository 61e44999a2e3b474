use crate::core::models::bond::HydrogenBond;
use crate::core::models::frame::Frame;
use crate::core::models::graph::{NetworkEdge, NetworkGraph, NetworkNode, NodeCategory};
use crate::engine::config::{ActiveSiteConfig, NetworkType};
use crate::engine::error::AnalysisError;
use nalgebra::Point3;
use std::collections::{BTreeMap, HashSet};

/// The active-site sphere resolved against one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSiteScope {
    pub center: Point3<f64>,
    pub radius: f64,
    /// Drop out-of-sphere nodes entirely instead of only tagging them.
    pub restrict: bool,
}

/// Resolves the configured active-site reference atom in a frame.
///
/// # Errors
///
/// Propagates the selection failure when the reference does not resolve to
/// exactly one atom; the workflow treats this as structural on the first
/// frame.
pub fn resolve_scope(
    frame: &Frame,
    config: Option<&ActiveSiteConfig>,
) -> Result<Option<ActiveSiteScope>, AnalysisError> {
    match config {
        None => Ok(None),
        Some(site) => {
            let reference = site.reference.resolve_one(frame)?;
            Ok(Some(ActiveSiteScope {
                center: reference.position,
                radius: site.radius,
                restrict: site.restrict_to_site,
            }))
        }
    }
}

/// Builds the network graph of one frame from its accepted bonds.
///
/// A pure reduction: every in-scope candidate atom becomes a node (water
/// oxygens always, polar protein atoms when the network includes protein),
/// then each bond is merged into a weighted edge. Waters that never bond
/// stay as isolated nodes and count as singleton components downstream.
/// Node insertion follows ascending atom serial, so iteration order — and
/// with it every downstream metric — is reproducible.
pub fn build(
    frame: &Frame,
    bonds: &[HydrogenBond],
    network_type: NetworkType,
    directed: bool,
    scope: Option<&ActiveSiteScope>,
    msa_columns: Option<&BTreeMap<isize, usize>>,
) -> NetworkGraph {
    let mut graph = NetworkGraph::new(directed);

    let oxygen_indices: HashSet<usize> = frame.waters().iter().map(|w| w.oxygen).collect();

    for (index, atom) in frame.atoms().iter().enumerate() {
        let category = if atom.is_water() {
            if !oxygen_indices.contains(&index) {
                continue;
            }
            NodeCategory::Water
        } else if network_type.includes_protein() && atom.is_polar_heavy() {
            NodeCategory::Protein
        } else {
            continue;
        };

        let in_site = scope.map(|s| (atom.position - s.center).norm() <= s.radius);
        if scope.is_some_and(|s| s.restrict) && in_site == Some(false) {
            continue;
        }

        let msa_column = match category {
            NodeCategory::Protein => {
                msa_columns.and_then(|columns| columns.get(&atom.residue_id).copied())
            }
            NodeCategory::Water => None,
        };

        graph.add_node(NetworkNode {
            serial: atom.serial,
            residue_id: atom.residue_id,
            category,
            position: atom.position,
            msa_column,
            in_active_site: in_site,
        });
    }

    for bond in bonds {
        let (Some(donor_node), Some(acceptor_node)) =
            (graph.node(bond.donor), graph.node(bond.acceptor))
        else {
            // An endpoint fell outside the restricted scope.
            continue;
        };
        let in_site = match (donor_node.in_active_site, acceptor_node.in_active_site) {
            (Some(a), Some(b)) => Some(a || b),
            _ => None,
        };
        graph.merge_edge(
            bond.donor,
            bond.acceptor,
            NetworkEdge {
                kind: bond.kind,
                weight: 1,
                distance: bond.distance,
                in_active_site: in_site,
                partner_role: bond.partner_role,
            },
        );
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::bond::ConnectionKind;
    use crate::core::utils::selection::AtomSelection;
    use crate::engine::hbond::{self, HBondCriteria};
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

    fn detect_and_build(frame: &Frame, scope: Option<&ActiveSiteScope>) -> NetworkGraph {
        let bonds = hbond::detect(
            frame,
            NetworkType::WaterWater,
            false,
            &HBondCriteria {
                max_distance: 3.0,
                angle_criteria: None,
            },
        )
        .unwrap();
        build(
            frame,
            &bonds,
            NetworkType::WaterWater,
            false,
            scope,
            None,
        )
    }

    #[test]
    fn isolated_waters_become_nodes_without_edges() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_oxygen(2, 2, [2.8, 0.0, 0.0]),
                water_oxygen(3, 3, [50.0, 0.0, 0.0]),
            ],
        );
        let graph = detect_and_build(&frame, None);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.degree(3), 0);
    }

    #[test]
    fn restricted_scope_drops_far_nodes_and_their_edges() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_oxygen(2, 2, [2.8, 0.0, 0.0]),
                water_oxygen(3, 3, [5.0, 0.0, 0.0]),
            ],
        );
        let scope = ActiveSiteScope {
            center: Point3::origin(),
            radius: 4.0,
            restrict: true,
        };
        let graph = detect_and_build(&frame, Some(&scope));
        assert_eq!(graph.node_count(), 2);
        assert!(graph.node(3).is_none());
        // The 2-3 bond lost an endpoint; only 1-2 remains.
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.has_edge(1, 2));
    }

    #[test]
    fn unrestricted_scope_tags_edges_by_site_membership() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 1, [0.0, 0.0, 0.0]),
                water_oxygen(2, 2, [2.8, 0.0, 0.0]),
                water_oxygen(3, 3, [10.0, 0.0, 0.0]),
                water_oxygen(4, 4, [12.8, 0.0, 0.0]),
            ],
        );
        let scope = ActiveSiteScope {
            center: Point3::origin(),
            radius: 4.0,
            restrict: false,
        };
        let graph = detect_and_build(&frame, Some(&scope));
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);

        let statuses: Vec<(usize, usize, Option<bool>)> = graph
            .edges()
            .map(|(a, b, e)| (a, b, e.in_active_site))
            .collect();
        assert!(statuses.contains(&(1, 2, Some(true))));
        assert!(statuses.contains(&(3, 4, Some(false))));
    }

    #[test]
    fn scope_resolution_fails_on_ambiguous_reference() {
        let frame = Frame::new(
            0,
            vec![
                Atom::new(1, "CA", "C", 7, "GLY", 'A', Point3::origin()),
                Atom::new(2, "CA", "C", 7, "GLY", 'B', Point3::origin()),
            ],
        );
        let config = ActiveSiteConfig {
            reference: AtomSelection::ResidueAtom {
                residue_id: 7,
                atom_name: "CA".to_string(),
            },
            radius: 8.0,
            restrict_to_site: false,
        };
        let err = resolve_scope(&frame, Some(&config)).unwrap_err();
        assert!(matches!(err, AnalysisError::SelectionResolution { .. }));
    }

    #[test]
    fn water_protein_edges_carry_partner_tags() {
        let frame = Frame::new(
            0,
            vec![
                water_oxygen(1, 100, [0.0, 0.0, 0.0]),
                Atom::new(2, "OG", "O", 10, "SER", 'A', Point3::new(2.7, 0.0, 0.0)),
            ],
        );
        let bonds = hbond::detect(
            &frame,
            NetworkType::WaterProtein,
            false,
            &HBondCriteria {
                max_distance: 3.0,
                angle_criteria: None,
            },
        )
        .unwrap();
        let graph = build(
            &frame,
            &bonds,
            NetworkType::WaterProtein,
            false,
            None,
            None,
        );
        let (_, _, edge) = graph.edges().next().unwrap();
        assert_eq!(edge.kind, ConnectionKind::WaterProtein);
        assert_eq!(
            edge.partner_role,
            Some(crate::core::models::atom::AtomRole::Sidechain)
        );
    }
}

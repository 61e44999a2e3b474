use super::atom::AtomRole;
use super::bond::ConnectionKind;
use nalgebra::Point3;
use petgraph::Directed;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::BTreeMap;

/// Whether a node represents a water molecule or a protein atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeCategory {
    Water,
    Protein,
}

/// A node of the hydrogen-bond network.
///
/// Water molecules are aggregated onto their oxygen: the node serial is the
/// oxygen's atom serial even when hydrogens are modeled explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    /// Atom serial of the represented heavy atom.
    pub serial: usize,
    /// Residue sequence number the node belongs to.
    pub residue_id: isize,
    /// Water or protein.
    pub category: NodeCategory,
    /// Position of the heavy atom in Angstroms.
    pub position: Point3<f64>,
    /// Alignment column of the node's residue, when MSA indexing is active.
    pub msa_column: Option<usize>,
    /// Whether the node lies inside the active-site sphere; `None` when no
    /// active site is configured.
    pub in_active_site: Option<bool>,
}

/// An edge of the network: one or more collapsed hydrogen bonds between a
/// node pair.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    /// Partner classes of the underlying bonds.
    pub kind: ConnectionKind,
    /// Number of raw bonds collapsed into this edge.
    pub weight: u32,
    /// Shortest heavy-atom separation among the collapsed bonds.
    pub distance: f64,
    /// Whether either endpoint lies inside the active-site sphere; `None`
    /// when no active site is configured.
    pub in_active_site: Option<bool>,
    /// Backbone/side-chain tag of the protein partner for water–protein
    /// edges.
    pub partner_role: Option<AtomRole>,
}

/// The hydrogen-bond network of one frame.
///
/// Nodes are keyed by atom serial. Iteration over nodes and edges is stable:
/// nodes in ascending serial order, edges in insertion order, which the
/// builder keeps sorted. Undirected networks store each edge once, in
/// canonical (low serial → high serial) orientation.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    graph: Graph<NetworkNode, NetworkEdge, Directed>,
    by_serial: BTreeMap<usize, NodeIndex>,
    directed: bool,
}

impl NetworkGraph {
    /// Creates an empty network.
    ///
    /// `directed` selects donor → acceptor edge semantics; undirected
    /// networks canonicalize edge orientation.
    pub fn new(directed: bool) -> Self {
        Self {
            graph: Graph::new(),
            by_serial: BTreeMap::new(),
            directed,
        }
    }

    /// Whether edges carry donor → acceptor direction.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Inserts a node, or returns the existing one with the same serial.
    pub fn add_node(&mut self, node: NetworkNode) -> NodeIndex {
        match self.by_serial.get(&node.serial) {
            Some(&idx) => idx,
            None => {
                let serial = node.serial;
                let idx = self.graph.add_node(node);
                self.by_serial.insert(serial, idx);
                idx
            }
        }
    }

    /// Inserts a bond between two existing nodes, collapsing duplicates.
    ///
    /// A second bond between the same pair (same orientation for directed
    /// networks) increments the edge weight and keeps the shortest distance
    /// instead of creating a parallel edge. Self-loops are ignored.
    pub fn merge_edge(&mut self, a: usize, b: usize, edge: NetworkEdge) {
        if a == b {
            return;
        }
        let (from, to) = if self.directed || a < b { (a, b) } else { (b, a) };
        let (Some(&from_idx), Some(&to_idx)) = (self.by_serial.get(&from), self.by_serial.get(&to))
        else {
            return;
        };

        let existing = if self.directed {
            self.graph.find_edge(from_idx, to_idx)
        } else {
            self.graph.find_edge_undirected(from_idx, to_idx).map(|(e, _)| e)
        };

        match existing {
            Some(edge_idx) => {
                let merged = &mut self.graph[edge_idx];
                merged.weight += edge.weight;
                if edge.distance < merged.distance {
                    merged.distance = edge.distance;
                }
                if edge.in_active_site == Some(true) {
                    merged.in_active_site = Some(true);
                }
            }
            None => {
                self.graph.add_edge(from_idx, to_idx, edge);
            }
        }
    }

    /// Looks up a node by atom serial.
    pub fn node(&self, serial: usize) -> Option<&NetworkNode> {
        self.by_serial.get(&serial).map(|&idx| &self.graph[idx])
    }

    /// Node serials in ascending order.
    pub fn serials(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_serial.keys().copied()
    }

    /// Nodes in ascending serial order.
    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.by_serial.values().map(|&idx| &self.graph[idx])
    }

    /// All edges as (source serial, target serial, edge) triples, in
    /// insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &NetworkEdge)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].serial,
                self.graph[e.target()].serial,
                e.weight(),
            )
        })
    }

    /// Distinct neighbor serials of a node, ignoring edge direction, in
    /// ascending order.
    pub fn neighbors(&self, serial: usize) -> Vec<usize> {
        let Some(&idx) = self.by_serial.get(&serial) else {
            return Vec::new();
        };
        let mut out: Vec<usize> = self
            .graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n].serial)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Number of distinct neighbors, ignoring edge direction.
    pub fn degree(&self, serial: usize) -> usize {
        self.neighbors(serial).len()
    }

    /// Returns `true` if an edge connects the pair in either orientation.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        match (self.by_serial.get(&a), self.by_serial.get(&b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge_undirected(ia, ib).is_some(),
            _ => false,
        }
    }

    /// Restricts the network to nodes within `radius` of `center`.
    ///
    /// Nodes beyond the radius are dropped together with their incident
    /// edges. Applying the same restriction twice is a no-op.
    pub fn retain_within(&self, center: &Point3<f64>, radius: f64) -> NetworkGraph {
        self.filtered(|node| (node.position - center).norm() <= radius)
    }

    /// Extracts the sub-network whose edges match the given active-site
    /// status, keeping only the endpoint nodes of retained edges.
    pub fn edge_subgraph_by_site(&self, active_site: bool) -> NetworkGraph {
        let mut keep = std::collections::BTreeSet::new();
        let mut out = NetworkGraph::new(self.directed);
        for (a, b, edge) in self.edges() {
            if edge.in_active_site == Some(active_site) {
                keep.insert(a);
                keep.insert(b);
            }
        }
        for serial in &keep {
            out.add_node(self.node(*serial).expect("endpoint node exists").clone());
        }
        for (a, b, edge) in self.edges() {
            if edge.in_active_site == Some(active_site) {
                out.merge_edge(a, b, edge.clone());
            }
        }
        out
    }

    fn filtered<F: Fn(&NetworkNode) -> bool>(&self, keep: F) -> NetworkGraph {
        let mut out = NetworkGraph::new(self.directed);
        for node in self.nodes() {
            if keep(node) {
                out.add_node(node.clone());
            }
        }
        for (a, b, edge) in self.edges() {
            if out.node(a).is_some() && out.node(b).is_some() {
                out.merge_edge(a, b, edge.clone());
            }
        }
        out
    }
}

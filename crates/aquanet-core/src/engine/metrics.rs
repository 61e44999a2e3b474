use crate::core::models::graph::NetworkGraph;
use crate::engine::config::{AnalysisSelection, MetricSet};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// The graph descriptors of one frame.
///
/// Fields are `None` when the corresponding metric was toggled off. An empty
/// graph yields zero/empty values rather than failing, so trajectory series
/// stay aligned even across frames with no in-scope atoms.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphMetricsResult {
    pub node_count: usize,
    pub edge_count: usize,
    /// Edges over possible edges, in [0, 1].
    pub density: Option<f64>,
    /// Connected-component sizes, largest first. Isolated nodes count as
    /// singleton components.
    pub component_sizes: Option<Vec<usize>>,
    /// Number of distinct bonded pairs.
    pub total_interactions: Option<u64>,
    /// Bond count per residue, deduplicated per residue pair.
    pub per_residue_interactions: Option<BTreeMap<isize, u32>>,
    /// Mean shortest-path hop count over the largest connected component.
    pub characteristic_path_length: Option<f64>,
    /// Shannon entropy (base 2) of the degree distribution.
    pub graph_entropy: Option<f64>,
    /// Mean local clustering coefficient over nodes with degree >= 2.
    pub clustering_coefficient: Option<f64>,
}

/// Computes the requested metrics for one frame's network.
///
/// Pure function of the graph: no external state is read and the graph is
/// not modified. The `selection` scope first narrows the graph to edges
/// matching the active-site status (mirroring edge-subgraph semantics), with
/// `All` operating on the full network including isolated nodes.
pub fn compute(
    graph: &NetworkGraph,
    set: &MetricSet,
    selection: AnalysisSelection,
) -> GraphMetricsResult {
    let scoped;
    let graph = match selection {
        AnalysisSelection::All => graph,
        AnalysisSelection::ActiveSite => {
            scoped = graph.edge_subgraph_by_site(true);
            &scoped
        }
        AnalysisSelection::NotActiveSite => {
            scoped = graph.edge_subgraph_by_site(false);
            &scoped
        }
    };

    let components = components(graph);

    GraphMetricsResult {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        density: set.density.then(|| density(graph)),
        component_sizes: set.connected_components.then(|| {
            let mut sizes: Vec<usize> = components.iter().map(|c| c.len()).collect();
            sizes.sort_unstable_by(|a, b| b.cmp(a));
            sizes
        }),
        total_interactions: set
            .interaction_counts
            .then(|| graph.edge_count() as u64),
        per_residue_interactions: set
            .per_residue_interactions
            .then(|| per_residue_interactions(graph)),
        characteristic_path_length: set
            .characteristic_path_length
            .then(|| characteristic_path_length(graph, &components)),
        graph_entropy: set.graph_entropy.then(|| degree_entropy(graph)),
        clustering_coefficient: set
            .clustering_coefficient
            .then(|| mean_clustering_coefficient(graph)),
    }
}

/// Ratio of edges to possible edges; 0.0 for graphs with fewer than two
/// nodes.
fn density(graph: &NetworkGraph) -> f64 {
    let n = graph.node_count() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let possible = if graph.is_directed() {
        n * (n - 1.0)
    } else {
        n * (n - 1.0) / 2.0
    };
    graph.edge_count() as f64 / possible
}

/// Connected components as serial lists, in ascending order of their
/// smallest member. Edge direction is ignored (weak connectivity).
fn components(graph: &NetworkGraph) -> Vec<Vec<usize>> {
    let serials: Vec<usize> = graph.serials().collect();
    let index_of: HashMap<usize, usize> = serials
        .iter()
        .enumerate()
        .map(|(i, &s)| (s, i))
        .collect();

    let mut union_find = petgraph::unionfind::UnionFind::new(serials.len());
    for (a, b, _) in graph.edges() {
        union_find.union(index_of[&a], index_of[&b]);
    }

    let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &serial) in serials.iter().enumerate() {
        grouped.entry(union_find.find(i)).or_default().push(serial);
    }

    let mut out: Vec<Vec<usize>> = grouped.into_values().collect();
    out.sort_by_key(|c| c[0]);
    out
}

/// Bond counts per residue, with multiple edges between the same residue
/// pair counted once.
fn per_residue_interactions(graph: &NetworkGraph) -> BTreeMap<isize, u32> {
    let mut residue_pairs: BTreeSet<(isize, isize)> = BTreeSet::new();
    for (a, b, _) in graph.edges() {
        let ra = graph.node(a).expect("edge endpoint exists").residue_id;
        let rb = graph.node(b).expect("edge endpoint exists").residue_id;
        if ra == rb {
            continue;
        }
        residue_pairs.insert((ra.min(rb), ra.max(rb)));
    }

    let mut counts: BTreeMap<isize, u32> = BTreeMap::new();
    for (ra, rb) in residue_pairs {
        *counts.entry(ra).or_insert(0) += 1;
        *counts.entry(rb).or_insert(0) += 1;
    }
    counts
}

/// Mean shortest-path hop count within the largest component.
///
/// Disconnected graphs never contribute infinite distances: only
/// within-component paths are measured, keeping the value finite and
/// comparable across frames. Graphs with at most one node (or no edges)
/// report 0.0. Direction is ignored so the value stays defined for directed
/// networks.
fn characteristic_path_length(graph: &NetworkGraph, components: &[Vec<usize>]) -> f64 {
    let Some(largest) = components.iter().max_by_key(|c| c.len()) else {
        return 0.0;
    };
    let n = largest.len();
    if n < 2 {
        return 0.0;
    }

    let member: BTreeSet<usize> = largest.iter().copied().collect();
    let mut total_hops: u64 = 0;

    for &start in largest {
        let mut distance: HashMap<usize, u64> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let d = distance[&current];
            for next in graph.neighbors(current) {
                if member.contains(&next) && !distance.contains_key(&next) {
                    distance.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        total_hops += distance.values().sum::<u64>();
    }

    total_hops as f64 / (n as f64 * (n as f64 - 1.0))
}

/// Shannon entropy (base 2) of the degree distribution.
fn degree_entropy(graph: &NetworkGraph) -> f64 {
    let n = graph.node_count();
    if n == 0 {
        return 0.0;
    }

    let mut frequency: BTreeMap<usize, usize> = BTreeMap::new();
    for serial in graph.serials() {
        *frequency.entry(graph.degree(serial)).or_insert(0) += 1;
    }

    frequency
        .values()
        .map(|&count| {
            let p = count as f64 / n as f64;
            -p * p.log2()
        })
        .sum()
}

/// Mean local clustering coefficient over nodes with degree >= 2.
///
/// Lower-degree nodes are excluded from the mean rather than counted as
/// zeros; a graph with no eligible nodes reports 0.0.
fn mean_clustering_coefficient(graph: &NetworkGraph) -> f64 {
    let mut total = 0.0;
    let mut eligible = 0usize;

    for serial in graph.serials() {
        let neighbors = graph.neighbors(serial);
        let k = neighbors.len();
        if k < 2 {
            continue;
        }
        let links = neighbors
            .iter()
            .tuple_combinations()
            .filter(|&(&u, &w)| graph.has_edge(u, w))
            .count();
        total += 2.0 * links as f64 / (k as f64 * (k as f64 - 1.0));
        eligible += 1;
    }

    if eligible == 0 {
        0.0
    } else {
        total / eligible as f64
    }
}

use crate::engine::config::{ClusteringConfig, ClusteringMethod, Epsilon};
use crate::engine::error::AnalysisError;
use crate::engine::neighbors::kth_nearest_distances;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use tracing::{debug, info};

/// A water oxygen position collected across the run for conserved-site
/// clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterCoordinateSample {
    /// Id of the structure the sample came from.
    pub structure: String,
    /// Frame index within that structure.
    pub frame: usize,
    /// Residue id of the water.
    pub residue_id: isize,
    pub position: Point3<f64>,
}

/// One conserved water site: a dense group of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: usize,
    pub centroid: Point3<f64>,
    /// Indices into the input sample slice, ascending.
    pub members: Vec<usize>,
}

/// The outcome of the clustering stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSet {
    pub clusters: Vec<Cluster>,
    /// Sample indices not assigned to any cluster.
    pub noise: Vec<usize>,
}

/// Partitions the collected water positions into conserved sites.
///
/// All three methods are deterministic given the input order and fixed
/// parameters. `Epsilon::Auto` derives the neighborhood radius from the
/// median k-distance of the data instead of treating a sentinel literally.
///
/// # Errors
///
/// [`AnalysisError::ClusteringParameter`] for invalid parameter
/// combinations (min_samples < 2, non-positive fixed eps, or data too
/// degenerate to derive an automatic radius).
pub fn cluster_samples(
    samples: &[WaterCoordinateSample],
    config: &ClusteringConfig,
) -> Result<ClusterSet, AnalysisError> {
    if config.min_samples < 2 {
        return Err(AnalysisError::ClusteringParameter(
            "min_samples must be at least 2".to_string(),
        ));
    }
    if let Epsilon::Fixed(eps) = config.eps {
        if !(eps.is_finite() && eps > 0.0) {
            return Err(AnalysisError::ClusteringParameter(
                "fixed eps must be a positive, finite distance".to_string(),
            ));
        }
    }

    let positions: Vec<Point3<f64>> = samples.iter().map(|s| s.position).collect();
    if positions.len() < config.min_samples {
        return Ok(ClusterSet {
            clusters: Vec::new(),
            noise: (0..positions.len()).collect(),
        });
    }

    let labels = match config.method {
        ClusteringMethod::Dbscan => {
            let eps = resolve_eps(&positions, config)?;
            debug!(eps, "running DBSCAN");
            dbscan(&positions, eps, config.min_samples)
        }
        ClusteringMethod::Optics => {
            let eps = resolve_eps(&positions, config)?;
            debug!(eps, "running OPTICS");
            optics(&positions, eps, config.min_samples)
        }
        ClusteringMethod::Hdbscan => {
            debug!("running HDBSCAN");
            hdbscan(&positions, config.min_samples)
        }
    };

    let set = collect_clusters(&positions, &labels, config.min_samples);
    info!(
        samples = samples.len(),
        clusters = set.clusters.len(),
        noise = set.noise.len(),
        "clustering complete"
    );
    Ok(set)
}

/// The resolved neighborhood radius: fixed, or the median k-distance of the
/// data (k = min_samples) when automatic.
fn resolve_eps(positions: &[Point3<f64>], config: &ClusteringConfig) -> Result<f64, AnalysisError> {
    match config.eps {
        Epsilon::Fixed(eps) => Ok(eps),
        Epsilon::Auto => {
            let mut distances = kth_nearest_distances(positions, config.min_samples);
            distances.retain(|d| *d > 0.0);
            if distances.is_empty() {
                return Err(AnalysisError::ClusteringParameter(
                    "cannot derive an automatic eps from fully coincident samples".to_string(),
                ));
            }
            distances.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
            Ok(distances[distances.len() / 2])
        }
    }
}

const NOISE: usize = usize::MAX;
const UNVISITED: usize = usize::MAX - 1;

/// Sorted neighborhood lists (self included) within `eps`.
fn neighborhoods(positions: &[Point3<f64>], eps: f64) -> Vec<Vec<usize>> {
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in positions.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    positions
        .iter()
        .map(|p| {
            let mut found: Vec<usize> = tree
                .within_unsorted::<SquaredEuclidean>(&[p.x, p.y, p.z], eps * eps)
                .into_iter()
                .map(|n| n.item as usize)
                .collect();
            found.sort_unstable();
            found
        })
        .collect()
}

/// Classic DBSCAN with deterministic index-order seeding.
fn dbscan(positions: &[Point3<f64>], eps: f64, min_samples: usize) -> Vec<usize> {
    let neighbors = neighborhoods(positions, eps);
    let mut labels = vec![UNVISITED; positions.len()];
    let mut cluster = 0usize;

    for seed in 0..positions.len() {
        if labels[seed] != UNVISITED {
            continue;
        }
        if neighbors[seed].len() < min_samples {
            labels[seed] = NOISE;
            continue;
        }

        labels[seed] = cluster;
        let mut queue: Vec<usize> = neighbors[seed].clone();
        let mut head = 0;
        while head < queue.len() {
            let point = queue[head];
            head += 1;
            if labels[point] == NOISE {
                labels[point] = cluster; // border point reclaimed
            }
            if labels[point] != UNVISITED {
                continue;
            }
            labels[point] = cluster;
            if neighbors[point].len() >= min_samples {
                queue.extend(neighbors[point].iter().copied());
            }
        }
        cluster += 1;
    }
    labels
}

/// OPTICS ordering with DBSCAN-equivalent cluster extraction at `eps`.
///
/// The reachability ordering is computed with `eps` as the generating
/// radius; the extraction threshold equals it, so the flat clustering
/// matches DBSCAN while retaining OPTICS' density-ordered traversal (and
/// with it, its determinism properties under fixed input order).
fn optics(positions: &[Point3<f64>], eps: f64, min_samples: usize) -> Vec<usize> {
    let n = positions.len();
    let neighbors = neighborhoods(positions, eps);
    let core_distance: Vec<Option<f64>> = (0..n)
        .map(|i| {
            if neighbors[i].len() < min_samples {
                return None;
            }
            let mut dists: Vec<f64> = neighbors[i]
                .iter()
                .map(|&j| (positions[i] - positions[j]).norm())
                .collect();
            dists.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
            Some(dists[min_samples - 1])
        })
        .collect();

    let mut processed = vec![false; n];
    let mut reachability = vec![f64::INFINITY; n];
    let mut order: Vec<usize> = Vec::with_capacity(n);

    for start in 0..n {
        if processed[start] {
            continue;
        }
        processed[start] = true;
        order.push(start);

        // Seed list ordered by (reachability, index) for determinism.
        let mut seeds: Vec<usize> = Vec::new();
        update_seeds(
            start,
            positions,
            &neighbors,
            &core_distance,
            &processed,
            &mut reachability,
            &mut seeds,
        );

        while let Some(pos) = seeds
            .iter()
            .enumerate()
            .min_by(|&(_, &a), &(_, &b)| {
                reachability[a]
                    .partial_cmp(&reachability[b])
                    .unwrap()
                    .then(a.cmp(&b))
            })
            .map(|(pos, _)| pos)
        {
            let current = seeds.swap_remove(pos);
            if processed[current] {
                continue;
            }
            processed[current] = true;
            order.push(current);
            update_seeds(
                current,
                positions,
                &neighbors,
                &core_distance,
                &processed,
                &mut reachability,
                &mut seeds,
            );
        }
    }

    // ExtractDBSCAN: walk the ordering and cut at the reachability
    // threshold.
    let mut labels = vec![NOISE; n];
    let mut cluster = 0usize;
    let mut open = false;
    for &point in &order {
        if reachability[point] > eps {
            if core_distance[point].is_some_and(|cd| cd <= eps) {
                if open {
                    cluster += 1;
                }
                labels[point] = cluster;
                open = true;
            }
            // Non-core with unreachable predecessor stays noise.
        } else if open {
            labels[point] = cluster;
        }
    }
    labels
}

fn update_seeds(
    center: usize,
    positions: &[Point3<f64>],
    neighbors: &[Vec<usize>],
    core_distance: &[Option<f64>],
    processed: &[bool],
    reachability: &mut [f64],
    seeds: &mut Vec<usize>,
) {
    let Some(core) = core_distance[center] else {
        return;
    };
    for &next in &neighbors[center] {
        if processed[next] {
            continue;
        }
        let reach = core.max((positions[center] - positions[next]).norm());
        if reach < reachability[next] {
            reachability[next] = reach;
            if !seeds.contains(&next) {
                seeds.push(next);
            }
        }
    }
}

/// HDBSCAN: single-linkage over mutual reachability distances, condensed
/// with `min_cluster_size = min_samples`, clusters selected by excess of
/// mass.
fn hdbscan(positions: &[Point3<f64>], min_samples: usize) -> Vec<usize> {
    let n = positions.len();
    let core = kth_nearest_distances(positions, min_samples - 1);

    // Prim MST over the implicit complete mutual-reachability graph.
    let mutual = |a: usize, b: usize| -> f64 {
        (positions[a] - positions[b])
            .norm()
            .max(core[a])
            .max(core[b])
    };
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut parent = vec![0usize; n];
    best[0] = 0.0;
    let mut edges: Vec<(f64, usize, usize)> = Vec::with_capacity(n.saturating_sub(1));
    for _ in 0..n {
        let next = (0..n)
            .filter(|&i| !in_tree[i])
            .min_by(|&a, &b| best[a].partial_cmp(&best[b]).unwrap().then(a.cmp(&b)))
            .expect("an out-of-tree vertex remains");
        in_tree[next] = true;
        if best[next].is_finite() && next != 0 {
            edges.push((best[next], parent[next], next));
        }
        for other in 0..n {
            if !in_tree[other] {
                let weight = mutual(next, other);
                if weight < best[other] {
                    best[other] = weight;
                    parent[other] = next;
                }
            }
        }
    }
    edges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    // Single-linkage dendrogram: leaves 0..n, merge nodes n..2n-1.
    let total_nodes = 2 * n - 1;
    let mut merge_children: Vec<Option<(usize, usize)>> = vec![None; total_nodes];
    let mut merge_distance = vec![0.0f64; total_nodes];
    let mut size = vec![1usize; total_nodes];
    let mut root_of: Vec<usize> = (0..n).collect();
    let mut union_find = petgraph::unionfind::UnionFind::<usize>::new(n);
    let mut next_node = n;
    for &(distance, a, b) in &edges {
        let ra = union_find.find(a);
        let rb = union_find.find(b);
        let (na, nb) = (root_of[ra], root_of[rb]);
        union_find.union(a, b);
        let merged_root = union_find.find(a);
        merge_children[next_node] = Some((na, nb));
        merge_distance[next_node] = distance;
        size[next_node] = size[na] + size[nb];
        root_of[merged_root] = next_node;
        next_node += 1;
    }

    if n < 2 || merge_children[total_nodes - 1].is_none() {
        return vec![NOISE; n];
    }

    condense_and_select(
        n,
        total_nodes - 1,
        &merge_children,
        &merge_distance,
        &size,
        min_samples,
    )
}

/// Condenses the dendrogram and selects stable clusters.
///
/// Each condensed cluster records its birth lambda (1/distance at which it
/// split off) and the lambdas at which member points fall out. Stability is
/// the summed lambda excess of its points; a parent keeps its children when
/// their combined stability exceeds its own.
fn condense_and_select(
    n: usize,
    root: usize,
    children: &[Option<(usize, usize)>],
    distance: &[f64],
    size: &[usize],
    min_cluster_size: usize,
) -> Vec<usize> {
    const ROOT_CLUSTER: usize = 0;

    // Per condensed cluster: birth lambda, accumulated stability, child
    // cluster ids, and the points that fall out of it.
    let mut births: Vec<f64> = vec![0.0];
    let mut stability: Vec<f64> = vec![0.0];
    let mut kids: Vec<Vec<usize>> = vec![Vec::new()];
    let mut points: Vec<Vec<usize>> = vec![Vec::new()];

    // Walk the dendrogram top-down, tracking which condensed cluster each
    // dendrogram node currently feeds.
    // Lambdas are capped so coincident samples (zero merge distance) stay
    // finite in the stability sums.
    const LAMBDA_CAP: f64 = 1e12;

    let mut stack: Vec<(usize, usize)> = vec![(root, ROOT_CLUSTER)];
    while let Some((node, cluster)) = stack.pop() {
        let lambda = if distance[node] > 0.0 {
            (1.0 / distance[node]).min(LAMBDA_CAP)
        } else {
            LAMBDA_CAP
        };
        let Some((left, right)) = children[node] else {
            // A leaf reached directly: it falls out of its cluster here.
            stability[cluster] += lambda - births[cluster];
            points[cluster].push(node);
            continue;
        };

        let left_big = size[left] >= min_cluster_size;
        let right_big = size[right] >= min_cluster_size;

        if left_big && right_big {
            // A true split: both sides become new condensed clusters.
            for &child in &[left, right] {
                let id = births.len();
                births.push(lambda);
                stability.push(0.0);
                kids.push(Vec::new());
                points.push(Vec::new());
                kids[cluster].push(id);
                stack.push((child, id));
            }
        } else {
            // The smaller side falls out of the current cluster; the larger
            // side (if any) continues it.
            for &child in &[left, right] {
                if size[child] >= min_cluster_size {
                    stack.push((child, cluster));
                } else {
                    for leaf in collect_leaves(child, children) {
                        stability[cluster] += lambda - births[cluster];
                        points[cluster].push(leaf);
                    }
                }
            }
        }
    }

    // Excess-of-mass selection, children before parents.
    let cluster_count = births.len();
    let mut selected = vec![false; cluster_count];
    let mut subtree_stability = stability.clone();
    for id in (0..cluster_count).rev() {
        if kids[id].is_empty() {
            selected[id] = id != ROOT_CLUSTER;
            continue;
        }
        let children_total: f64 = kids[id].iter().map(|&c| subtree_stability[c]).sum();
        if id != ROOT_CLUSTER && stability[id] > children_total {
            selected[id] = true;
            deselect_descendants(id, &kids, &mut selected);
        } else {
            subtree_stability[id] = children_total;
        }
    }

    let mut labels = vec![NOISE; n];
    let mut next_label = 0usize;
    for id in 0..cluster_count {
        if !selected[id] {
            continue;
        }
        let mut members: Vec<usize> = Vec::new();
        gather_points(id, &kids, &points, &mut members);
        if members.len() < min_cluster_size {
            continue;
        }
        for point in members {
            labels[point] = next_label;
        }
        next_label += 1;
    }
    labels
}

fn collect_leaves(node: usize, children: &[Option<(usize, usize)>]) -> Vec<usize> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match children[current] {
            Some((l, r)) => {
                stack.push(l);
                stack.push(r);
            }
            None => leaves.push(current),
        }
    }
    leaves
}

fn deselect_descendants(id: usize, kids: &[Vec<usize>], selected: &mut [bool]) {
    let mut stack: Vec<usize> = kids[id].clone();
    while let Some(current) = stack.pop() {
        selected[current] = false;
        stack.extend(kids[current].iter().copied());
    }
}

fn gather_points(
    id: usize,
    kids: &[Vec<usize>],
    points: &[Vec<usize>],
    out: &mut Vec<usize>,
) {
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        out.extend(points[current].iter().copied());
        stack.extend(kids[current].iter().copied());
    }
}

/// Converts label assignments into the final cluster set, discarding
/// sub-threshold groups as noise.
fn collect_clusters(
    positions: &[Point3<f64>],
    labels: &[usize],
    min_samples: usize,
) -> ClusterSet {
    let mut grouped: std::collections::BTreeMap<usize, Vec<usize>> =
        std::collections::BTreeMap::new();
    let mut noise = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label == NOISE || label == UNVISITED {
            noise.push(i);
        } else {
            grouped.entry(label).or_default().push(i);
        }
    }

    let mut clusters = Vec::new();
    let mut ordered: Vec<Vec<usize>> = grouped.into_values().collect();
    ordered.sort_by_key(|members| members[0]);
    for members in ordered {
        if members.len() < min_samples {
            noise.extend(members);
            continue;
        }
        let sum = members
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, &i| {
                acc + positions[i].coords
            });
        clusters.push(Cluster {
            id: clusters.len(),
            centroid: Point3::from(sum / members.len() as f64),
            members,
        });
    }
    noise.sort_unstable();
    ClusterSet { clusters, noise }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: [f64; 3]) -> WaterCoordinateSample {
        WaterCoordinateSample {
            structure: "1abc".to_string(),
            frame: 0,
            residue_id: 1,
            position: Point3::new(position[0], position[1], position[2]),
        }
    }

    /// Two tight blobs far apart, plus one remote outlier.
    fn two_blobs() -> Vec<WaterCoordinateSample> {
        let mut samples = Vec::new();
        for i in 0..5 {
            samples.push(sample([i as f64 * 0.3, 0.0, 0.0]));
        }
        for i in 0..5 {
            samples.push(sample([20.0 + i as f64 * 0.3, 0.0, 0.0]));
        }
        samples.push(sample([100.0, 100.0, 100.0]));
        samples
    }

    fn config(method: ClusteringMethod, eps: Epsilon) -> ClusteringConfig {
        ClusteringConfig {
            method,
            min_samples: 3,
            eps,
        }
    }

    #[test]
    fn dbscan_separates_blobs_and_noise() {
        let samples = two_blobs();
        let set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Dbscan, Epsilon::Fixed(1.0)),
        )
        .unwrap();

        assert_eq!(set.clusters.len(), 2);
        assert_eq!(set.clusters[0].members, vec![0, 1, 2, 3, 4]);
        assert_eq!(set.clusters[1].members, vec![5, 6, 7, 8, 9]);
        assert_eq!(set.noise, vec![10]);
        assert!((set.clusters[0].centroid.x - 0.6).abs() < 1e-9);
    }

    #[test]
    fn optics_matches_dbscan_partition() {
        let samples = two_blobs();
        let dbscan_set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Dbscan, Epsilon::Fixed(1.0)),
        )
        .unwrap();
        let optics_set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Optics, Epsilon::Fixed(1.0)),
        )
        .unwrap();

        assert_eq!(dbscan_set.clusters.len(), optics_set.clusters.len());
        for (a, b) in dbscan_set.clusters.iter().zip(&optics_set.clusters) {
            assert_eq!(a.members, b.members);
        }
        assert_eq!(dbscan_set.noise, optics_set.noise);
    }

    #[test]
    fn hdbscan_separates_blobs_and_noise() {
        let samples = two_blobs();
        let set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Hdbscan, Epsilon::Auto),
        )
        .unwrap();

        assert_eq!(set.clusters.len(), 2);
        assert_eq!(set.clusters[0].members, vec![0, 1, 2, 3, 4]);
        assert_eq!(set.clusters[1].members, vec![5, 6, 7, 8, 9]);
        assert!(set.noise.contains(&10));
    }

    #[test]
    fn auto_eps_resolves_blobs_without_a_radius() {
        let samples = two_blobs();
        let set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Dbscan, Epsilon::Auto),
        )
        .unwrap();
        assert_eq!(set.clusters.len(), 2);
    }

    #[test]
    fn clustering_is_deterministic() {
        let samples = two_blobs();
        for method in [
            ClusteringMethod::Dbscan,
            ClusteringMethod::Optics,
            ClusteringMethod::Hdbscan,
        ] {
            let first = cluster_samples(&samples, &config(method, Epsilon::Fixed(1.0))).unwrap();
            let second = cluster_samples(&samples, &config(method, Epsilon::Fixed(1.0))).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let samples = two_blobs();
        let err = cluster_samples(
            &samples,
            &ClusteringConfig {
                method: ClusteringMethod::Dbscan,
                min_samples: 1,
                eps: Epsilon::Fixed(1.0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ClusteringParameter(_)));

        let err = cluster_samples(
            &samples,
            &config(ClusteringMethod::Dbscan, Epsilon::Fixed(-2.0)),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ClusteringParameter(_)));
    }

    #[test]
    fn too_few_samples_become_noise() {
        let samples: Vec<_> = (0..2).map(|i| sample([i as f64, 0.0, 0.0])).collect();
        let set = cluster_samples(
            &samples,
            &config(ClusteringMethod::Dbscan, Epsilon::Fixed(1.0)),
        )
        .unwrap();
        assert!(set.clusters.is_empty());
        assert_eq!(set.noise, vec![0, 1]);
    }
}

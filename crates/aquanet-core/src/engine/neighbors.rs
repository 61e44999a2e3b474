use crate::core::utils::geometry::COINCIDENCE_EPSILON;
use crate::engine::error::AnalysisError;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Below this many atoms a quadratic scan beats building a spatial index.
const BRUTE_FORCE_THRESHOLD: usize = 128;

/// A candidate pair within the cutoff radius.
///
/// Indices refer into the position slices handed to the search functions;
/// callers translate them back to atom serials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPair {
    pub i: usize,
    pub j: usize,
    /// Euclidean separation in Angstroms.
    pub distance: f64,
}

/// Finds all unordered pairs (i, j), i < j, with separation ≤ `cutoff`.
///
/// Uses a k-d tree for realistic frame sizes and a quadratic scan for small
/// active-site-restricted selections. `ids` carries the atom serials used
/// for error reporting and must parallel `positions`.
///
/// # Errors
///
/// [`AnalysisError::InvalidGeometry`] if two distinct atoms coincide at zero
/// separation.
pub fn pairs_within(
    ids: &[usize],
    positions: &[Point3<f64>],
    cutoff: f64,
) -> Result<Vec<NeighborPair>, AnalysisError> {
    debug_assert_eq!(ids.len(), positions.len());

    let mut pairs = Vec::new();
    if positions.len() <= BRUTE_FORCE_THRESHOLD {
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let distance = (positions[i] - positions[j]).norm();
                if distance <= cutoff {
                    pairs.push(checked_pair(ids, i, j, distance)?);
                }
            }
        }
        return Ok(pairs);
    }

    let tree = build_tree(positions);
    for (i, position) in positions.iter().enumerate() {
        for found in
            tree.within_unsorted::<SquaredEuclidean>(&point_key(position), cutoff * cutoff)
        {
            let j = found.item as usize;
            if j > i {
                pairs.push(checked_pair(ids, i, j, found.distance.sqrt())?);
            }
        }
    }
    pairs.sort_unstable_by_key(|p| (p.i, p.j));
    Ok(pairs)
}

/// Finds all pairs (i, j) with `a[i]` within `cutoff` of `b[j]`.
///
/// The two sets are disjoint atom groups (e.g., water hydrogens against
/// protein acceptors); pairs are reported once with `i` indexing into `a`
/// and `j` into `b`.
///
/// # Errors
///
/// [`AnalysisError::InvalidGeometry`] if an atom of `a` coincides with an
/// atom of `b` at zero separation.
pub fn pairs_between(
    ids_a: &[usize],
    a: &[Point3<f64>],
    ids_b: &[usize],
    b: &[Point3<f64>],
    cutoff: f64,
) -> Result<Vec<NeighborPair>, AnalysisError> {
    debug_assert_eq!(ids_a.len(), a.len());
    debug_assert_eq!(ids_b.len(), b.len());

    let mut pairs = Vec::new();
    if a.len().saturating_mul(b.len()) <= BRUTE_FORCE_THRESHOLD * BRUTE_FORCE_THRESHOLD {
        for (i, pa) in a.iter().enumerate() {
            for (j, pb) in b.iter().enumerate() {
                let distance = (pa - pb).norm();
                if distance <= cutoff {
                    pairs.push(checked_cross_pair(ids_a, ids_b, i, j, distance)?);
                }
            }
        }
        return Ok(pairs);
    }

    let tree = build_tree(b);
    for (i, pa) in a.iter().enumerate() {
        for found in tree.within_unsorted::<SquaredEuclidean>(&point_key(pa), cutoff * cutoff) {
            let j = found.item as usize;
            pairs.push(checked_cross_pair(ids_a, ids_b, i, j, found.distance.sqrt())?);
        }
    }
    pairs.sort_unstable_by_key(|p| (p.i, p.j));
    Ok(pairs)
}

/// Distance from each point to its k-th nearest other point.
///
/// Supports the k-distance heuristic for automatic clustering radii and
/// HDBSCAN core distances. Points with fewer than `k` neighbors report the
/// distance to their farthest one; a single-point set reports 0.
pub(crate) fn kth_nearest_distances(points: &[Point3<f64>], k: usize) -> Vec<f64> {
    if points.len() < 2 || k == 0 {
        return vec![0.0; points.len()];
    }

    let tree = build_tree(points);
    points
        .iter()
        .map(|p| {
            // +1 because the query point itself comes back at distance 0.
            let found = tree.nearest_n::<SquaredEuclidean>(&point_key(p), k + 1);
            found
                .last()
                .map(|n| n.distance.sqrt())
                .unwrap_or(0.0)
        })
        .collect()
}

fn build_tree(positions: &[Point3<f64>]) -> KdTree<f64, 3> {
    let mut tree = KdTree::new();
    for (i, p) in positions.iter().enumerate() {
        tree.add(&point_key(p), i as u64);
    }
    tree
}

fn point_key(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn checked_pair(
    ids: &[usize],
    i: usize,
    j: usize,
    distance: f64,
) -> Result<NeighborPair, AnalysisError> {
    if distance < COINCIDENCE_EPSILON {
        return Err(AnalysisError::InvalidGeometry {
            serial_a: ids[i],
            serial_b: ids[j],
        });
    }
    Ok(NeighborPair { i, j, distance })
}

fn checked_cross_pair(
    ids_a: &[usize],
    ids_b: &[usize],
    i: usize,
    j: usize,
    distance: f64,
) -> Result<NeighborPair, AnalysisError> {
    if distance < COINCIDENCE_EPSILON {
        return Err(AnalysisError::InvalidGeometry {
            serial_a: ids_a[i],
            serial_b: ids_b[j],
        });
    }
    Ok(NeighborPair { i, j, distance })
}

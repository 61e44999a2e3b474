use crate::engine::metrics::GraphMetricsResult;
use crate::engine::msa::AlignmentColumnMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Distribution summary of one scalar metric across frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Number of frames that contributed a value.
    pub samples: usize,
}

impl ScalarSummary {
    /// Builds a summary from the values present across frames.
    ///
    /// Returns `None` when no frame contributed (metric disabled or all
    /// frames skipped). The standard deviation is the population form.
    fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            samples: values.len(),
        })
    }
}

/// Ensemble statistics for one structure across its frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnsembleSummary {
    /// Frames that contributed to the summary.
    pub frames: usize,
    pub density: Option<ScalarSummary>,
    pub characteristic_path_length: Option<ScalarSummary>,
    pub graph_entropy: Option<ScalarSummary>,
    pub clustering_coefficient: Option<ScalarSummary>,
    /// Per-frame connected-component counts.
    pub component_count: Option<ScalarSummary>,
    /// Distinct bonded pairs summed over all frames.
    pub total_interactions: u64,
    /// Per-residue bond counts summed over all frames.
    pub per_residue_totals: BTreeMap<isize, u64>,
}

/// Combines per-frame metric records into one ensemble summary.
///
/// The caller hands frames in trajectory order; the summary itself is
/// order-insensitive, but time-series consumers rely on the input ordering
/// being original frame order.
pub fn summarize(results: &[GraphMetricsResult]) -> EnsembleSummary {
    let mut per_residue_totals: BTreeMap<isize, u64> = BTreeMap::new();
    for result in results {
        if let Some(counts) = &result.per_residue_interactions {
            for (&residue, &count) in counts {
                *per_residue_totals.entry(residue).or_insert(0) += count as u64;
            }
        }
    }

    EnsembleSummary {
        frames: results.len(),
        density: ScalarSummary::from_values(results.iter().filter_map(|r| r.density)),
        characteristic_path_length: ScalarSummary::from_values(
            results.iter().filter_map(|r| r.characteristic_path_length),
        ),
        graph_entropy: ScalarSummary::from_values(
            results.iter().filter_map(|r| r.graph_entropy),
        ),
        clustering_coefficient: ScalarSummary::from_values(
            results.iter().filter_map(|r| r.clustering_coefficient),
        ),
        component_count: ScalarSummary::from_values(
            results
                .iter()
                .filter_map(|r| r.component_sizes.as_ref().map(|c| c.len() as f64)),
        ),
        total_interactions: results
            .iter()
            .filter_map(|r| r.total_interactions)
            .sum(),
        per_residue_totals,
    }
}

/// Re-keys per-residue totals from residue ids to alignment columns and
/// merges them across structures.
///
/// Residues without a mapped column (waters, unaligned tails) are dropped:
/// only alignment-comparable sites appear in the cross-structure view.
pub fn merge_by_column(
    per_structure: &[(String, BTreeMap<isize, u64>)],
    map: &AlignmentColumnMap,
) -> BTreeMap<usize, u64> {
    let mut merged: BTreeMap<usize, u64> = BTreeMap::new();
    for (structure, totals) in per_structure {
        for (&residue, &count) in totals {
            if let Some(column) = map.column_of(structure, residue) {
                *merged.entry(column).or_insert(0) += count;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::msa::{Alignment, ResidueSequence, build_column_map};

    const TOLERANCE: f64 = 1e-9;

    fn result(density: f64, components: usize) -> GraphMetricsResult {
        GraphMetricsResult {
            node_count: 4,
            edge_count: 2,
            density: Some(density),
            component_sizes: Some(vec![2; components]),
            total_interactions: Some(2),
            per_residue_interactions: Some(BTreeMap::from([(10, 1), (20, 1)])),
            characteristic_path_length: Some(1.0),
            graph_entropy: Some(0.5),
            clustering_coefficient: Some(0.0),
        }
    }

    #[test]
    fn summary_has_expected_mean_and_spread() {
        let frames = vec![result(0.2, 1), result(0.4, 3)];
        let summary = summarize(&frames);

        assert_eq!(summary.frames, 2);
        let density = summary.density.unwrap();
        assert!((density.mean - 0.3).abs() < TOLERANCE);
        assert!((density.std_dev - 0.1).abs() < TOLERANCE);
        assert!((density.min - 0.2).abs() < TOLERANCE);
        assert!((density.max - 0.4).abs() < TOLERANCE);
        assert_eq!(summary.total_interactions, 4);
        assert_eq!(summary.per_residue_totals.get(&10), Some(&2));
        assert_eq!(
            summary.component_count.unwrap().mean,
            2.0
        );
    }

    #[test]
    fn empty_input_produces_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.frames, 0);
        assert!(summary.density.is_none());
        assert_eq!(summary.total_interactions, 0);
        assert!(summary.per_residue_totals.is_empty());
    }

    #[test]
    fn residues_aligned_to_one_column_merge_under_one_key() {
        // Structure A residue 70 and structure B residue 85 both align to
        // the second column.
        let sequences = BTreeMap::from([
            (
                "A".to_string(),
                ResidueSequence::new(vec![(69, 'G'), (70, 'A')]),
            ),
            (
                "B".to_string(),
                ResidueSequence::new(vec![(85, 'A')]),
            ),
        ]);
        let alignment = Alignment::new(vec![
            ("A".to_string(), "GA".to_string()),
            ("B".to_string(), "-A".to_string()),
        ]);
        let map = build_column_map(&sequences, &alignment).unwrap();

        let per_structure = vec![
            ("A".to_string(), BTreeMap::from([(70, 5u64)])),
            ("B".to_string(), BTreeMap::from([(85, 3u64)])),
        ];
        let merged = merge_by_column(&per_structure, &map);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(&2), Some(&8));
    }
}

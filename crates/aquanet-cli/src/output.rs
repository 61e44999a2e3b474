use crate::error::Result;
use aquanet::workflows::analyze::AnalysisOutcome;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes all result tables of a run into `dir`, returning the files
/// created. Tables with nothing to report are not created.
pub fn write_all(outcome: &AnalysisOutcome, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    written.push(write_metrics(outcome, dir)?);
    written.push(write_residue_interactions(outcome, dir)?);

    if let Some(path) = write_clusters(outcome, dir)? {
        written.push(path);
    }
    if let Some(path) = write_classifications(outcome, dir)? {
        written.push(path);
    }
    if let Some(path) = write_column_interactions(outcome, dir)? {
        written.push(path);
    }
    if let Some(path) = write_skipped(outcome, dir)? {
        written.push(path);
    }

    info!(files = written.len(), "result tables written");
    Ok(written)
}

fn opt_float(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

fn write_metrics(outcome: &AnalysisOutcome, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("metrics.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "structure",
        "frame",
        "nodes",
        "edges",
        "density",
        "components",
        "total_interactions",
        "characteristic_path_length",
        "graph_entropy",
        "clustering_coefficient",
    ])?;

    for report in &outcome.structures {
        for record in &report.frames {
            let m = &record.metrics;
            writer.write_record([
                report.id.clone(),
                record.frame.to_string(),
                m.node_count.to_string(),
                m.edge_count.to_string(),
                opt_float(m.density),
                m.component_sizes
                    .as_ref()
                    .map(|c| c.len().to_string())
                    .unwrap_or_default(),
                m.total_interactions
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
                opt_float(m.characteristic_path_length),
                opt_float(m.graph_entropy),
                opt_float(m.clustering_coefficient),
            ])?;
        }
    }
    writer.flush()?;
    Ok(path)
}

fn write_residue_interactions(outcome: &AnalysisOutcome, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("residue_interactions.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["structure", "residue", "total_bonds"])?;
    for report in &outcome.structures {
        for (residue, count) in &report.summary.per_residue_totals {
            writer.write_record([
                report.id.clone(),
                residue.to_string(),
                count.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(path)
}

fn write_clusters(outcome: &AnalysisOutcome, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(clusters) = &outcome.clusters else {
        return Ok(None);
    };
    let path = dir.join("clusters.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "cluster",
        "centroid_x",
        "centroid_y",
        "centroid_z",
        "members",
    ])?;
    for cluster in &clusters.clusters {
        writer.write_record([
            cluster.id.to_string(),
            format!("{:.3}", cluster.centroid.x),
            format!("{:.3}", cluster.centroid.y),
            format!("{:.3}", cluster.centroid.z),
            cluster.members.len().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(Some(path))
}

fn write_classifications(outcome: &AnalysisOutcome, dir: &Path) -> Result<Option<PathBuf>> {
    if outcome
        .structures
        .iter()
        .all(|r| r.classifications.is_empty())
    {
        return Ok(None);
    }
    let path = dir.join("classification.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "structure",
        "frame",
        "residue",
        "class",
        "angle_1",
        "angle_2",
    ])?;
    for report in &outcome.structures {
        for record in &report.classifications {
            writer.write_record([
                report.id.clone(),
                record.frame.to_string(),
                record.residue_id.to_string(),
                format!("{:?}", record.label),
                opt_float(record.angle_1),
                opt_float(record.angle_2),
            ])?;
        }
    }
    writer.flush()?;
    Ok(Some(path))
}

fn write_column_interactions(outcome: &AnalysisOutcome, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(columns) = &outcome.column_interactions else {
        return Ok(None);
    };
    let path = dir.join("column_interactions.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["alignment_column", "total_bonds"])?;
    for (column, count) in columns {
        writer.write_record([column.to_string(), count.to_string()])?;
    }
    writer.flush()?;
    Ok(Some(path))
}

fn write_skipped(outcome: &AnalysisOutcome, dir: &Path) -> Result<Option<PathBuf>> {
    if outcome
        .structures
        .iter()
        .all(|r| r.skipped.is_empty() && r.error.is_none())
    {
        return Ok(None);
    }
    let path = dir.join("skipped.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["structure", "frame", "reason"])?;
    for report in &outcome.structures {
        if let Some(error) = &report.error {
            writer.write_record([report.id.clone(), "all".to_string(), error.clone()])?;
        }
        for skipped in &report.skipped {
            writer.write_record([
                report.id.clone(),
                skipped.frame.to_string(),
                skipped.reason.clone(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquanet::engine::metrics::GraphMetricsResult;
    use aquanet::workflows::analyze::{FrameRecord, StructureReport};

    #[test]
    fn metrics_table_is_written_per_frame() {
        let outcome = AnalysisOutcome {
            structures: vec![StructureReport {
                id: "1abc".to_string(),
                frames: vec![FrameRecord {
                    frame: 0,
                    metrics: GraphMetricsResult {
                        node_count: 4,
                        edge_count: 4,
                        density: Some(4.0 / 6.0),
                        ..GraphMetricsResult::default()
                    },
                }],
                ..StructureReport::default()
            }],
            ..AnalysisOutcome::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let files = write_all(&outcome, dir.path()).unwrap();
        assert!(files.iter().any(|f| f.ends_with("metrics.csv")));

        let content = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert!(content.contains("1abc,0,4,4,0.666667"));
        // No clusters, classification, or skips were present.
        assert!(!dir.path().join("clusters.csv").exists());
        assert!(!dir.path().join("skipped.csv").exists());
    }
}

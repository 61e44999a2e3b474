use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The `[network]` section of the configuration file.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct NetworkSection {
    pub max_distance: Option<f64>,
    pub angle_criteria: Option<f64>,
    pub include_hydrogens: Option<bool>,
    pub network_type: Option<String>,
    /// Extra residue name to recognize as water, on top of the built-in
    /// vocabulary (HOH/WAT/SOL/H2O).
    pub water_name: Option<String>,
}

/// The `[active-site]` section.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ActiveSiteSection {
    /// Selection resolving to exactly one atom, e.g. "resid 70 and name CA".
    pub reference: String,
    pub radius: Option<f64>,
    /// Restrict the network to the sphere instead of only tagging edges.
    pub restrict: Option<bool>,
}

/// Neighborhood radius: the string "auto", or a fixed distance. The value
/// 0.0 is accepted as a legacy spelling of "auto".
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EpsField {
    Keyword(String),
    Fixed(f64),
}

/// The `[clustering]` section.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClusteringSection {
    pub method: String,
    pub min_samples: Option<usize>,
    pub eps: Option<EpsField>,
}

/// The `[analysis]` section.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AnalysisSection {
    /// "all", "active-site", or "not-active-site".
    pub selection: Option<String>,
    /// Metric names to compute; absent means all.
    pub metrics: Option<Vec<String>>,
}

/// The `[msa]` section.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct MsaSection {
    /// Aligned FASTA produced by an external alignment tool.
    pub alignment_file: Option<PathBuf>,
    pub classify_waters: Option<bool>,
    /// 1-indexed alignment columns anchoring the classification references.
    pub water_reference_columns: Option<Vec<usize>>,
}

/// The `[run]` section.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RunSection {
    pub workers: Option<usize>,
}

/// The full TOML configuration file.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub network: NetworkSection,
    pub active_site: Option<ActiveSiteSection>,
    pub clustering: Option<ClusteringSection>,
    #[serde(default)]
    pub analysis: AnalysisSection,
    pub msa: Option<MsaSection>,
    #[serde(default)]
    pub run: RunSection,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration file from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_round_trips_from_toml() {
        let text = r#"
            [network]
            max-distance = 3.0
            angle-criteria = 150.0
            include-hydrogens = true
            network-type = "water-protein"

            [active-site]
            reference = "resid 70 and name CA"
            radius = 8.0
            restrict = true

            [clustering]
            method = "hdbscan"
            min-samples = 10
            eps = "auto"

            [analysis]
            selection = "active-site"
            metrics = ["density", "graph-entropy"]

            [msa]
            alignment-file = "alignment.fasta"
            classify-waters = true
            water-reference-columns = [40, 185]

            [run]
            workers = 8
        "#;
        let config: FileConfig = toml::from_str(text).unwrap();
        assert_eq!(config.network.max_distance, Some(3.0));
        assert_eq!(config.network.include_hydrogens, Some(true));
        assert_eq!(config.active_site.as_ref().unwrap().radius, Some(8.0));
        assert_eq!(
            config.clustering.as_ref().unwrap().eps,
            Some(EpsField::Keyword("auto".to_string()))
        );
        assert_eq!(config.run.workers, Some(8));
    }

    #[test]
    fn numeric_eps_parses_as_fixed() {
        let text = r#"
            [clustering]
            method = "dbscan"
            eps = 0.8
        "#;
        let config: FileConfig = toml::from_str(text).unwrap();
        assert_eq!(
            config.clustering.unwrap().eps,
            Some(EpsField::Fixed(0.8))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = r#"
            [network]
            max-distance = 3.0
            typo-key = 1
        "#;
        assert!(toml::from_str::<FileConfig>(text).is_err());
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.network.max_distance.is_none());
        assert!(config.active_site.is_none());
        assert!(config.clustering.is_none());
    }
}

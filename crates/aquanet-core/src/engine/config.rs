use crate::core::utils::selection::AtomSelection;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Which atom classes participate as network nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    /// Only water molecules form the network.
    WaterWater,
    /// Waters plus polar protein atoms form the network.
    #[default]
    WaterProtein,
}

impl NetworkType {
    /// Returns `true` if protein atoms participate as nodes.
    pub fn includes_protein(&self) -> bool {
        matches!(self, NetworkType::WaterProtein)
    }
}

impl FromStr for NetworkType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "water-water" | "water_water" => Ok(NetworkType::WaterWater),
            "water-protein" | "water_protein" => Ok(NetworkType::WaterProtein),
            _ => Err(()),
        }
    }
}

/// Which edges the metric computations consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisSelection {
    /// The whole network.
    #[default]
    All,
    /// Only edges touching the active site.
    ActiveSite,
    /// Only edges outside the active site.
    NotActiveSite,
}

impl FromStr for AnalysisSelection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(AnalysisSelection::All),
            "active-site" | "active_site" => Ok(AnalysisSelection::ActiveSite),
            "not-active-site" | "not_active_site" => Ok(AnalysisSelection::NotActiveSite),
            _ => Err(()),
        }
    }
}

/// The density-based algorithm used for conserved-water-site clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringMethod {
    Dbscan,
    Hdbscan,
    Optics,
}

impl FromStr for ClusteringMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dbscan" => Ok(ClusteringMethod::Dbscan),
            "hdbscan" => Ok(ClusteringMethod::Hdbscan),
            "optics" => Ok(ClusteringMethod::Optics),
            _ => Err(()),
        }
    }
}

/// Neighborhood radius for density-based clustering.
///
/// `Auto` derives the radius from the data via a k-distance heuristic
/// instead of overloading a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Epsilon {
    #[default]
    Auto,
    Fixed(f64),
}

/// Scopes the analysis to a sphere around a reference atom.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSiteConfig {
    /// Selection that must resolve to exactly one reference atom per frame.
    pub reference: AtomSelection,
    /// Sphere radius in Angstroms.
    pub radius: f64,
    /// When `true`, nodes beyond the radius are excluded before graph
    /// construction; when `false`, the full network is built and edges are
    /// only tagged by site membership.
    pub restrict_to_site: bool,
}

/// Parameters for the conserved-water-site clustering stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    pub method: ClusteringMethod,
    /// Minimum number of samples for a dense region.
    pub min_samples: usize,
    pub eps: Epsilon,
}

/// Parameters for cross-structure alignment indexing and water
/// classification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MsaConfig {
    /// Alignment columns anchoring the water-classification references
    /// (at most two are used).
    pub water_reference_columns: Vec<usize>,
    /// Whether to classify water orientations against the references.
    pub classify_waters: bool,
}

/// Which graph metrics to compute per frame. Defaults to all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSet {
    pub density: bool,
    pub connected_components: bool,
    pub interaction_counts: bool,
    pub per_residue_interactions: bool,
    pub characteristic_path_length: bool,
    pub graph_entropy: bool,
    pub clustering_coefficient: bool,
}

impl MetricSet {
    pub fn all() -> Self {
        Self {
            density: true,
            connected_components: true,
            interaction_counts: true,
            per_residue_interactions: true,
            characteristic_path_length: true,
            graph_entropy: true,
            clustering_coefficient: true,
        }
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Complete configuration of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Hydrogen-bond heavy-atom distance cutoff in Angstroms.
    pub max_distance: f64,
    /// Minimum donor–hydrogen–acceptor angle in degrees; `None` disables
    /// angle filtering.
    pub angle_criteria: Option<f64>,
    /// Model hydrogens explicitly and build a directed network.
    pub include_hydrogens: bool,
    pub network_type: NetworkType,
    /// Edge scope for metric computation.
    pub selection: AnalysisSelection,
    pub metrics: MetricSet,
    pub active_site: Option<ActiveSiteConfig>,
    pub clustering: Option<ClusteringConfig>,
    pub msa: Option<MsaConfig>,
    /// Upper bound on concurrent frame workers.
    pub num_workers: usize,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    max_distance: Option<f64>,
    angle_criteria: Option<f64>,
    include_hydrogens: bool,
    network_type: Option<NetworkType>,
    selection: Option<AnalysisSelection>,
    metrics: Option<MetricSet>,
    active_site: Option<ActiveSiteConfig>,
    clustering: Option<ClusteringConfig>,
    msa: Option<MsaConfig>,
    num_workers: Option<usize>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_distance(mut self, angstroms: f64) -> Self {
        self.max_distance = Some(angstroms);
        self
    }
    pub fn angle_criteria(mut self, degrees: f64) -> Self {
        self.angle_criteria = Some(degrees);
        self
    }
    pub fn include_hydrogens(mut self, include: bool) -> Self {
        self.include_hydrogens = include;
        self
    }
    pub fn network_type(mut self, network_type: NetworkType) -> Self {
        self.network_type = Some(network_type);
        self
    }
    pub fn selection(mut self, selection: AnalysisSelection) -> Self {
        self.selection = Some(selection);
        self
    }
    pub fn metrics(mut self, metrics: MetricSet) -> Self {
        self.metrics = Some(metrics);
        self
    }
    pub fn active_site(mut self, active_site: ActiveSiteConfig) -> Self {
        self.active_site = Some(active_site);
        self
    }
    pub fn clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = Some(clustering);
        self
    }
    pub fn msa(mut self, msa: MsaConfig) -> Self {
        self.msa = Some(msa);
        self
    }
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = Some(workers);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let max_distance = self
            .max_distance
            .ok_or(ConfigError::MissingParameter("max_distance"))?;
        if !(max_distance > 0.0) {
            return Err(ConfigError::InvalidParameter(
                "max_distance must be positive",
            ));
        }

        if self.angle_criteria.is_some() && !self.include_hydrogens {
            return Err(ConfigError::InvalidParameter(
                "angle_criteria requires include_hydrogens",
            ));
        }
        if let Some(degrees) = self.angle_criteria {
            if !(0.0..=180.0).contains(&degrees) {
                return Err(ConfigError::InvalidParameter(
                    "angle_criteria must be within [0, 180] degrees",
                ));
            }
        }

        let selection = self.selection.unwrap_or_default();
        if selection != AnalysisSelection::All && self.active_site.is_none() {
            return Err(ConfigError::InvalidParameter(
                "active-site analysis selection requires an active_site config",
            ));
        }
        if let Some(site) = &self.active_site {
            if !(site.radius > 0.0) {
                return Err(ConfigError::InvalidParameter(
                    "active_site radius must be positive",
                ));
            }
        }

        if let Some(msa) = &self.msa {
            if msa.classify_waters && msa.water_reference_columns.is_empty() {
                return Err(ConfigError::InvalidParameter(
                    "water classification requires at least one reference column",
                ));
            }
        }

        let num_workers = self.num_workers.unwrap_or(1);
        if num_workers == 0 {
            return Err(ConfigError::InvalidParameter(
                "num_workers must be at least 1",
            ));
        }

        Ok(AnalysisConfig {
            max_distance,
            angle_criteria: self.angle_criteria,
            include_hydrogens: self.include_hydrogens,
            network_type: self.network_type.unwrap_or_default(),
            selection,
            metrics: self.metrics.unwrap_or_default(),
            active_site: self.active_site,
            clustering: self.clustering,
            msa: self.msa,
            num_workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_build_fills_defaults() {
        let config = AnalysisConfigBuilder::new()
            .max_distance(3.3)
            .build()
            .unwrap();
        assert_eq!(config.network_type, NetworkType::WaterProtein);
        assert_eq!(config.selection, AnalysisSelection::All);
        assert_eq!(config.num_workers, 1);
        assert!(config.metrics.density);
        assert!(!config.include_hydrogens);
    }

    #[test]
    fn missing_max_distance_is_reported() {
        let err = AnalysisConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("max_distance"));
    }

    #[test]
    fn angle_criteria_without_hydrogens_is_rejected() {
        let err = AnalysisConfigBuilder::new()
            .max_distance(3.0)
            .angle_criteria(120.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter(_)));
    }

    #[test]
    fn site_scoped_selection_requires_active_site() {
        let err = AnalysisConfigBuilder::new()
            .max_distance(3.0)
            .selection(AnalysisSelection::ActiveSite)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter(_)));
    }

    #[test]
    fn enums_parse_from_config_strings() {
        assert_eq!(
            "water-water".parse::<NetworkType>(),
            Ok(NetworkType::WaterWater)
        );
        assert_eq!(
            "hdbscan".parse::<ClusteringMethod>(),
            Ok(ClusteringMethod::Hdbscan)
        );
        assert_eq!(
            "not_active_site".parse::<AnalysisSelection>(),
            Ok(AnalysisSelection::NotActiveSite)
        );
        assert!("kmeans".parse::<ClusteringMethod>().is_err());
    }
}

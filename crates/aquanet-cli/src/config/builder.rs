use super::defaults;
use super::file::{EpsField, FileConfig};
use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use aquanet::core::utils::selection::AtomSelection;
use aquanet::engine::config::{
    ActiveSiteConfig, AnalysisConfig, AnalysisConfigBuilder, AnalysisSelection, ClusteringConfig,
    ClusteringMethod, Epsilon, MetricSet, MsaConfig, NetworkType,
};
use std::path::PathBuf;
use tracing::info;

/// The merged, validated configuration of one run.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub analysis: AnalysisConfig,
    /// Alignment file to load when MSA indexing is active.
    pub alignment_file: Option<PathBuf>,
    /// Extra water residue name recognized by the PDB reader.
    pub water_name: Option<String>,
}

/// Merges the configuration file with CLI overrides into the core config.
///
/// CLI arguments win over file values, which win over built-in defaults.
pub fn build_analysis_config(
    file: &FileConfig,
    args: &AnalyzeArgs,
    threads: Option<usize>,
) -> Result<ResolvedConfig> {
    let mut builder = AnalysisConfigBuilder::new().max_distance(
        args.max_distance
            .or(file.network.max_distance)
            .unwrap_or(defaults::DEFAULT_MAX_DISTANCE),
    );

    if let Some(angle) = args.angle_criteria.or(file.network.angle_criteria) {
        builder = builder.angle_criteria(angle);
    }

    let include_hydrogens =
        args.include_hydrogens || file.network.include_hydrogens.unwrap_or(false);
    builder = builder.include_hydrogens(include_hydrogens);

    if let Some(raw) = args
        .network_type
        .as_deref()
        .or(file.network.network_type.as_deref())
    {
        let network_type: NetworkType = raw
            .parse()
            .map_err(|_| CliError::Argument(format!("unknown network type '{raw}'")))?;
        builder = builder.network_type(network_type);
    }

    if let Some(raw) = file.analysis.selection.as_deref() {
        let selection: AnalysisSelection = raw
            .parse()
            .map_err(|_| CliError::Argument(format!("unknown analysis selection '{raw}'")))?;
        builder = builder.selection(selection);
    }

    if let Some(names) = &file.analysis.metrics {
        builder = builder.metrics(parse_metric_set(names)?);
    }

    if let Some(site) = &file.active_site {
        let reference: AtomSelection = site
            .reference
            .parse()
            .map_err(|_| CliError::Argument(format!("invalid selection '{}'", site.reference)))?;
        builder = builder.active_site(ActiveSiteConfig {
            reference,
            radius: site.radius.unwrap_or(defaults::DEFAULT_ACTIVE_SITE_RADIUS),
            restrict_to_site: site.restrict.unwrap_or(false),
        });
    }

    if let Some(clustering) = &file.clustering {
        let method: ClusteringMethod = clustering
            .method
            .parse()
            .map_err(|_| {
                CliError::Argument(format!("unknown clustering method '{}'", clustering.method))
            })?;
        builder = builder.clustering(ClusteringConfig {
            method,
            min_samples: clustering
                .min_samples
                .unwrap_or(defaults::DEFAULT_MIN_CLUSTER_SAMPLES),
            eps: parse_eps(clustering.eps.as_ref())?,
        });
    }

    let mut alignment_file = None;
    if let Some(msa) = &file.msa {
        alignment_file = args.alignment.clone().or(msa.alignment_file.clone());
        builder = builder.msa(MsaConfig {
            water_reference_columns: msa.water_reference_columns.clone().unwrap_or_default(),
            classify_waters: msa.classify_waters.unwrap_or(false),
        });
    }

    builder = builder.num_workers(
        threads
            .or(file.run.workers)
            .unwrap_or(defaults::DEFAULT_WORKERS),
    );

    let analysis = builder.build()?;
    info!(
        max_distance = analysis.max_distance,
        include_hydrogens = analysis.include_hydrogens,
        workers = analysis.num_workers,
        "configuration resolved"
    );

    Ok(ResolvedConfig {
        analysis,
        alignment_file,
        water_name: file.network.water_name.clone(),
    })
}

fn parse_eps(eps: Option<&EpsField>) -> Result<Epsilon> {
    match eps {
        None => Ok(Epsilon::Auto),
        Some(EpsField::Keyword(word)) if word.eq_ignore_ascii_case("auto") => Ok(Epsilon::Auto),
        Some(EpsField::Keyword(word)) => Err(CliError::Argument(format!(
            "eps must be a distance or \"auto\", got '{word}'"
        ))),
        // 0.0 is the legacy spelling of "auto".
        Some(EpsField::Fixed(value)) if *value == 0.0 => Ok(Epsilon::Auto),
        Some(EpsField::Fixed(value)) => Ok(Epsilon::Fixed(*value)),
    }
}

fn parse_metric_set(names: &[String]) -> Result<MetricSet> {
    let mut set = MetricSet {
        density: false,
        connected_components: false,
        interaction_counts: false,
        per_residue_interactions: false,
        characteristic_path_length: false,
        graph_entropy: false,
        clustering_coefficient: false,
    };
    for name in names {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "density" => set.density = true,
            "connected-components" => set.connected_components = true,
            "interaction-counts" => set.interaction_counts = true,
            "per-residue-interactions" => set.per_residue_interactions = true,
            "characteristic-path-length" => set.characteristic_path_length = true,
            "graph-entropy" => set.graph_entropy = true,
            "clustering-coefficient" => set.clustering_coefficient = true,
            other => {
                return Err(CliError::Argument(format!("unknown metric '{other}'")));
            }
        }
    }
    Ok(set)
}

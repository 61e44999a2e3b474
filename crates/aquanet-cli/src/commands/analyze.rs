use crate::cli::AnalyzeArgs;
use crate::config::{FileConfig, build_analysis_config};
use crate::error::{CliError, Result};
use crate::io::{fasta, pdb::PdbTrajectory};
use crate::output;
use crate::utils::progress::CliProgressHandler;
use aquanet::engine::progress::ProgressReporter;
use aquanet::workflows::analyze::{self, CancelToken, StructureInput};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: &AnalyzeArgs, threads: Option<usize>) -> Result<()> {
    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let resolved = build_analysis_config(&file_config, args, threads)?;

    let mut trajectories = Vec::with_capacity(args.input.len());
    for path in &args.input {
        info!("Loading structure from {:?}", path);
        let trajectory = PdbTrajectory::load(path, resolved.water_name.as_deref()).map_err(
            |e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            },
        )?;
        trajectories.push((structure_id(path), trajectory));
    }
    let structures: Vec<StructureInput<PdbTrajectory>> = trajectories
        .iter()
        .map(|(id, trajectory)| StructureInput {
            id: id.clone(),
            source: trajectory,
        })
        .collect();

    let alignment = match &resolved.alignment_file {
        Some(path) => {
            info!("Loading alignment from {:?}", path);
            Some(fasta::load_alignment(path)?)
        }
        None => None,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let cancel = CancelToken::new();

    println!("Starting water-network analysis...");
    info!("Invoking the core analysis workflow...");
    let outcome = analyze::run(
        &structures,
        alignment.as_ref(),
        &resolved.analysis,
        &reporter,
        &cancel,
    )?;

    let files = output::write_all(&outcome, &args.output_dir)?;

    let analyzed: usize = outcome
        .structures
        .iter()
        .filter(|r| r.error.is_none())
        .count();
    let skipped_frames: usize = outcome.structures.iter().map(|r| r.skipped.len()).sum();

    println!(
        "✓ Analyzed {} structure(s); {} result table(s) written to: {}",
        analyzed,
        files.len(),
        args.output_dir.display()
    );
    if let Some(clusters) = &outcome.clusters {
        println!(
            "  {} conserved water site(s), {} noise sample(s)",
            clusters.clusters.len(),
            clusters.noise.len()
        );
    }
    for report in &outcome.structures {
        if let Some(error) = &report.error {
            warn!(structure = %report.id, %error, "structure excluded from results");
            println!("  Warning: structure {} excluded: {}", report.id, error);
        }
    }
    if skipped_frames > 0 {
        println!(
            "  {} frame(s) skipped; see {}",
            skipped_frames,
            args.output_dir.join("skipped.csv").display()
        );
    }

    Ok(())
}

/// A structure's id is its file stem, matching the ids used in the
/// alignment file.
fn structure_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

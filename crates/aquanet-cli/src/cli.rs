use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The AquaNet Developers",
    version,
    about = "AquaNet CLI - Analyze hydrogen-bond-mediated water networks in protein structures and trajectories.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of parallel frame workers, overriding the config file.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build per-frame hydrogen-bond networks and compute their graph
    /// metrics, conserved water sites, and cross-structure statistics.
    Analyze(AnalyzeArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    // --- Core Arguments ---
    /// Input structure file(s) in PDB format; multi-model files are treated
    /// as trajectories, and several files as independent structures.
    #[arg(short, long, required = true, value_name = "PATH", num_args(1..))]
    pub input: Vec<PathBuf>,

    /// Path to the main configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for the CSV result files.
    #[arg(short, long, value_name = "PATH", default_value = "aquanet-results")]
    pub output_dir: PathBuf,

    // --- Network Overrides ---
    /// Override the hydrogen-bond distance cutoff (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub max_distance: Option<f64>,

    /// Override the minimum donor-H-acceptor angle (degrees).
    #[arg(long, value_name = "FLOAT")]
    pub angle_criteria: Option<f64>,

    /// Model hydrogens explicitly and build a directed network.
    #[arg(long)]
    pub include_hydrogens: bool,

    /// Override the network type ('water-water' or 'water-protein').
    #[arg(long, value_name = "TYPE")]
    pub network_type: Option<String>,

    // --- MSA Overrides ---
    /// Override the aligned-FASTA alignment file for MSA indexing.
    #[arg(long, value_name = "PATH")]
    pub alignment: Option<PathBuf>,
}

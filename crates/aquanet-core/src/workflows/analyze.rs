use crate::core::models::frame::{Frame, FrameSource};
use crate::engine::aggregate::{self, EnsembleSummary};
use crate::engine::classify::{self, WaterClassRecord};
use crate::engine::cluster::{self, ClusterSet, WaterCoordinateSample};
use crate::engine::config::AnalysisConfig;
use crate::engine::error::AnalysisError;
use crate::engine::graph::{self, ActiveSiteScope};
use crate::engine::hbond::{self, HBondCriteria};
use crate::engine::metrics::{self, GraphMetricsResult};
use crate::engine::msa::{Alignment, AlignmentColumnMap, ResidueSequence, build_column_map};
use crate::engine::progress::{Progress, ProgressReporter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One structure to analyze: an id and its frame supplier.
pub struct StructureInput<'a, S: FrameSource> {
    /// Stable identifier, also the key into the alignment.
    pub id: String,
    pub source: &'a S,
}

/// Cooperative cancellation flag checked between frame units.
///
/// Cancelling never corrupts partial results: frames completed before the
/// flag was observed stay in the output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A frame excluded from aggregation, with the reason why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFrame {
    pub frame: usize,
    pub reason: String,
}

/// Metrics of one successfully processed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame: usize,
    pub metrics: GraphMetricsResult,
}

/// Everything produced for one structure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructureReport {
    pub id: String,
    /// Per-frame records, in original frame order.
    pub frames: Vec<FrameRecord>,
    pub summary: EnsembleSummary,
    pub classifications: Vec<WaterClassRecord>,
    /// Frames excluded from aggregation, part of the run manifest.
    pub skipped: Vec<SkippedFrame>,
    /// Set when the whole structure was excluded (alignment or reference
    /// failure); other structures are unaffected.
    pub error: Option<String>,
}

/// The complete result of an analysis run.
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    pub structures: Vec<StructureReport>,
    /// Conserved water sites, when clustering was configured.
    pub clusters: Option<ClusterSet>,
    /// The samples the clusters index into.
    pub samples: Vec<WaterCoordinateSample>,
    /// The shared alignment map, when MSA indexing was active.
    pub column_map: Option<AlignmentColumnMap>,
    /// Cross-structure per-residue interactions, re-keyed by alignment
    /// column.
    pub column_interactions: Option<BTreeMap<usize, u64>>,
}

/// Runs the full analysis over one or more structures.
///
/// Per frame, the detection pipeline (neighbor search → bond evaluation →
/// graph construction → metrics) is a pure function of the frame and the
/// configuration, so frames are fanned out over `num_workers` threads and
/// reassembled in original frame order before aggregation. Clustering and
/// the cross-structure merge run after all per-frame data is collected.
///
/// # Errors
///
/// Structural failures abort the run: an active-site reference that does
/// not resolve on the first frame, an unreadable first frame, or invalid
/// clustering parameters. Alignment and classification failures are
/// confined to the affected structure and recorded in its report.
#[instrument(skip_all, name = "analysis_workflow")]
pub fn run<S: FrameSource + Sync>(
    structures: &[StructureInput<S>],
    alignment: Option<&Alignment>,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
    cancel: &CancelToken,
) -> Result<AnalysisOutcome, AnalysisError> {
    let mut outcome = AnalysisOutcome::default();

    // === Phase 0: alignment indexing (optional, validated up front) ===
    let mut structure_errors: BTreeMap<String, String> = BTreeMap::new();
    if config.msa.is_some() {
        if let Some(alignment) = alignment {
            reporter.report(Progress::PhaseStart {
                name: "Alignment indexing",
            });
            outcome.column_map = Some(index_structures(
                structures,
                alignment,
                &mut structure_errors,
            ));
            reporter.report(Progress::PhaseFinish);
        } else {
            warn!("MSA indexing requested but no alignment supplied; continuing without it");
        }
    }

    // === Phase 1: per-structure frame pipelines ===
    for input in structures {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(reason) = structure_errors.get(&input.id) {
            warn!(structure = %input.id, %reason, "structure excluded");
            outcome.structures.push(StructureReport {
                id: input.id.clone(),
                error: Some(reason.clone()),
                ..StructureReport::default()
            });
            continue;
        }

        let report = analyze_structure(
            input,
            config,
            outcome.column_map.as_ref(),
            reporter,
            cancel,
            &mut outcome.samples,
        )?;
        outcome.structures.push(report);
    }

    // === Phase 2: barrier stage - conserved-site clustering ===
    if let Some(clustering) = &config.clustering {
        if !outcome.samples.is_empty() && !cancel.is_cancelled() {
            reporter.report(Progress::PhaseStart { name: "Clustering" });
            outcome.clusters = Some(cluster::cluster_samples(&outcome.samples, clustering)?);
            reporter.report(Progress::PhaseFinish);
        }
    }

    // === Phase 3: cross-structure merge by alignment column ===
    if let Some(map) = &outcome.column_map {
        let per_structure: Vec<(String, BTreeMap<isize, u64>)> = outcome
            .structures
            .iter()
            .map(|report| (report.id.clone(), report.summary.per_residue_totals.clone()))
            .collect();
        outcome.column_interactions = Some(aggregate::merge_by_column(&per_structure, map));
    }

    info!(
        structures = outcome.structures.len(),
        samples = outcome.samples.len(),
        "analysis complete"
    );
    Ok(outcome)
}

/// Builds the column map structure by structure, so one bad alignment row
/// only excludes its own structure.
fn index_structures<S: FrameSource>(
    structures: &[StructureInput<S>],
    alignment: &Alignment,
    errors: &mut BTreeMap<String, String>,
) -> AlignmentColumnMap {
    let mut combined = AlignmentColumnMap::default();
    for input in structures {
        let frame = match input.source.frame(0) {
            Ok(frame) => frame,
            Err(err) => {
                errors.insert(input.id.clone(), err.to_string());
                continue;
            }
        };
        let sequences = BTreeMap::from([(input.id.clone(), ResidueSequence::from_frame(&frame))]);
        match build_column_map(&sequences, alignment) {
            Ok(map) => combined.absorb(map),
            Err(err) => {
                errors.insert(input.id.clone(), err.to_string());
            }
        }
    }
    combined
}

enum FrameOutcome {
    Done(Box<FrameData>),
    Skipped(SkippedFrame),
    Cancelled,
}

struct FrameData {
    index: usize,
    metrics: GraphMetricsResult,
    classifications: Vec<WaterClassRecord>,
    samples: Vec<WaterCoordinateSample>,
}

fn analyze_structure<S: FrameSource + Sync>(
    input: &StructureInput<S>,
    config: &AnalysisConfig,
    column_map: Option<&AlignmentColumnMap>,
    reporter: &ProgressReporter,
    cancel: &CancelToken,
    samples: &mut Vec<WaterCoordinateSample>,
) -> Result<StructureReport, AnalysisError> {
    let frame_count = input.source.len();
    info!(structure = %input.id, frames = frame_count, "analyzing structure");
    reporter.report(Progress::StatusUpdate {
        text: format!("Structure {}", input.id),
    });

    if frame_count == 0 {
        warn!(structure = %input.id, "source supplied no frames");
        return Ok(StructureReport {
            id: input.id.clone(),
            ..StructureReport::default()
        });
    }

    // Structural pre-checks on the first frame: a reference that cannot be
    // resolved at all would leave every frame unscoped, so it aborts the
    // run rather than silently skipping everything.
    let first_frame = input.source.frame(0)?;
    graph::resolve_scope(&first_frame, config.active_site.as_ref())?;

    let classify_columns: Option<&[usize]> = match &config.msa {
        Some(msa) if msa.classify_waters => Some(&msa.water_reference_columns),
        _ => None,
    };
    if let (Some(columns), Some(map)) = (classify_columns, column_map) {
        // Unmapped reference columns are frame-independent: fail the
        // structure now instead of once per frame.
        if let Err(err) = classify::resolve_references(&input.id, &first_frame, columns, map) {
            return Ok(StructureReport {
                id: input.id.clone(),
                error: Some(err.to_string()),
                ..StructureReport::default()
            });
        }
    }

    reporter.report(Progress::TaskStart {
        total_steps: frame_count as u64,
    });

    let process = |frame_index: usize| -> FrameOutcome {
        if cancel.is_cancelled() {
            return FrameOutcome::Cancelled;
        }
        let outcome = process_frame(input, frame_index, config, column_map, classify_columns);
        reporter.report(Progress::TaskIncrement);
        outcome
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<FrameOutcome> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .build()
            .map_err(|e| AnalysisError::Internal(format!("worker pool: {e}")))?;
        // Indexed parallel collect keeps original frame order.
        pool.install(|| (0..frame_count).into_par_iter().map(process).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<FrameOutcome> = (0..frame_count).map(process).collect();

    reporter.report(Progress::TaskFinish);

    let mut report = StructureReport {
        id: input.id.clone(),
        ..StructureReport::default()
    };
    let mut metrics_in_order = Vec::new();
    for outcome in outcomes {
        match outcome {
            FrameOutcome::Done(data) => {
                metrics_in_order.push(data.metrics.clone());
                report.frames.push(FrameRecord {
                    frame: data.index,
                    metrics: data.metrics,
                });
                report.classifications.extend(data.classifications);
                samples.extend(data.samples);
            }
            FrameOutcome::Skipped(skipped) => {
                warn!(
                    structure = %input.id,
                    frame = skipped.frame,
                    reason = %skipped.reason,
                    "frame skipped"
                );
                report.skipped.push(skipped);
            }
            FrameOutcome::Cancelled => {}
        }
    }

    report.summary = aggregate::summarize(&metrics_in_order);
    Ok(report)
}

/// The per-frame pipeline: fetch → scope → detect → build → measure.
///
/// Pure function of the frame and configuration; geometric failures abort
/// only this frame's contribution.
fn process_frame<S: FrameSource>(
    input: &StructureInput<S>,
    frame_index: usize,
    config: &AnalysisConfig,
    column_map: Option<&AlignmentColumnMap>,
    classify_columns: Option<&[usize]>,
) -> FrameOutcome {
    let skip = |frame: usize, reason: String| {
        FrameOutcome::Skipped(SkippedFrame { frame, reason })
    };

    let frame = match input.source.frame(frame_index) {
        Ok(frame) => frame,
        Err(err) => return skip(frame_index, err.to_string()),
    };

    let scope = match graph::resolve_scope(&frame, config.active_site.as_ref()) {
        Ok(scope) => scope,
        Err(err) => return skip(frame_index, err.to_string()),
    };

    let criteria = HBondCriteria {
        max_distance: config.max_distance,
        angle_criteria: config.angle_criteria,
    };
    let bonds = match hbond::detect(
        &frame,
        config.network_type,
        config.include_hydrogens,
        &criteria,
    ) {
        Ok(bonds) => bonds,
        Err(err) => return skip(frame_index, err.to_string()),
    };

    let residue_columns = column_map.map(|map| structure_columns(map, &input.id, &frame));
    let network = graph::build(
        &frame,
        &bonds,
        config.network_type,
        config.include_hydrogens,
        scope.as_ref(),
        residue_columns.as_ref(),
    );

    let metrics = metrics::compute(&network, &config.metrics, config.selection);

    let classifications = match (classify_columns, column_map) {
        (Some(columns), Some(map)) => {
            match classify::resolve_references(&input.id, &frame, columns, map) {
                Ok(anchors) => classify::classify_frame(&frame, &anchors),
                Err(err) => return skip(frame_index, err.to_string()),
            }
        }
        _ => Vec::new(),
    };

    let samples = if config.clustering.is_some() {
        harvest_samples(&input.id, &frame, scope.as_ref())
    } else {
        Vec::new()
    };

    FrameOutcome::Done(Box::new(FrameData {
        index: frame_index,
        metrics,
        classifications,
        samples,
    }))
}

/// Residue → column lookup for one structure.
fn structure_columns(
    map: &AlignmentColumnMap,
    structure: &str,
    frame: &Frame,
) -> BTreeMap<isize, usize> {
    let mut columns = BTreeMap::new();
    for atom in frame.atoms() {
        if atom.is_water() {
            continue;
        }
        if let Some(column) = map.column_of(structure, atom.residue_id) {
            columns.insert(atom.residue_id, column);
        }
    }
    columns
}

/// Water oxygen positions of a frame, honoring a restricting active-site
/// scope.
fn harvest_samples(
    structure: &str,
    frame: &Frame,
    scope: Option<&ActiveSiteScope>,
) -> Vec<WaterCoordinateSample> {
    let atoms = frame.atoms();
    frame
        .waters()
        .iter()
        .filter_map(|water| {
            let oxygen = &atoms[water.oxygen];
            if let Some(scope) = scope {
                if scope.restrict && (oxygen.position - scope.center).norm() > scope.radius {
                    return None;
                }
            }
            Some(WaterCoordinateSample {
                structure: structure.to_string(),
                frame: frame.index,
                residue_id: water.residue_id,
                position: oxygen.position,
            })
        })
        .collect()
}

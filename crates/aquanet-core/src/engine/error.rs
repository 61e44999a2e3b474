use crate::core::models::frame::FrameAccessError;
use crate::core::utils::selection::SelectionError;
use thiserror::Error;

/// Errors produced by the analysis engine.
///
/// Per-frame geometric failures are recoverable: the workflow skips the
/// offending frame and records it in the run manifest. Selection failures on
/// the first frame, alignment mismatches, and parameter errors are
/// structural and abort the affected scope (the run, or one structure's
/// contribution).
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("degenerate geometry: atoms {serial_a} and {serial_b} coincide at zero separation")]
    InvalidGeometry { serial_a: usize, serial_b: usize },

    #[error("selection failed: {source}")]
    SelectionResolution {
        #[from]
        source: SelectionError,
    },

    #[error("alignment mismatch for structure '{structure}': {detail}")]
    AlignmentMismatch { structure: String, detail: String },

    #[error("reference column {column} has no mapped residue in structure '{structure}'")]
    UnresolvedReference { structure: String, column: usize },

    #[error("invalid clustering parameters: {0}")]
    ClusteringParameter(String),

    #[error("frame source failure: {source}")]
    FrameSource {
        #[from]
        source: FrameAccessError,
    },

    #[error("internal logic error: {0}")]
    Internal(String),
}

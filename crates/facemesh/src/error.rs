use thiserror::Error;

/// Structural faults in the static tables or in a frame's point data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("expected {expected} landmarks, got {actual}")]
    PointCount { expected: usize, actual: usize },
    #[error("{table} index {index} is out of range (must be below {bound})")]
    IndexOutOfRange {
        table: String,
        index: u32,
        bound: usize,
    },
    #[error("triangulation length {0} is not a multiple of 3")]
    TriangulationLength(usize),
    #[error("unknown annotation group: {0}")]
    UnknownAnnotationGroup(String),
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    #[error("feature declared twice: {0}")]
    DuplicateFeature(String),
    #[error("no surfaces for face: {0}")]
    UnknownFace(String),
}

/// Failures of the frame source feeding the detector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture source lost: {0}")]
    SourceLost(String),
}

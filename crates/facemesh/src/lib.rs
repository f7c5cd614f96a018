//! Geometry core for face-landmark rendering.
//!
//! A detector produces 468 landmarks per face per frame. This crate maps them
//! onto a fixed triangulation, splits that into per-feature sub-meshes through
//! the annotation index, and keeps one persistent [`Surface`] per
//! `(face, feature)` that is rewritten in place every frame.

pub use crate::accessory::{bounding_box, bounding_box_center, Accessory};
pub use crate::adapter::{AdapterConfig, BoundingBox, PointAdapter};
pub use crate::annotation_index::{AccessoryPoints, AnnotationIndex, FeatureTriangleSet, SKIN};
pub use crate::annotations::AnnotationGroups;
pub use crate::engine::{FaceUpdate, MeshEngine};
pub use crate::error::{CaptureError, MeshError};
pub use crate::feature::{AccessoryDef, Color, FeatureCatalog, FeatureDef, Region};
pub use crate::frame_loop::{CaptureState, DetectedFace, DetectionResult, FrameLoop, FrameLoopConfig, FrameOutcome};
pub use crate::points::PointBuffer;
pub use crate::surface::{FaceId, Surface, SurfaceId, SurfaceKey, SurfaceRegistry, Weld};
pub use crate::triangulation::Triangulation;

mod accessory;
mod adapter;
mod annotation_index;
mod annotations;
mod engine;
mod error;
mod feature;
mod frame_loop;
mod points;
mod surface;
mod triangulation;

/// Number of landmarks in every point buffer.
pub const LANDMARK_COUNT: usize = 468;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::{AdapterConfig, BoundingBox, PointAdapter};
use crate::engine::MeshEngine;
use crate::error::{CaptureError, MeshError};
use crate::points::PointBuffer;
use crate::surface::FaceId;

/// One face as reported by the detector, still in detector coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub scaled_mesh: Vec<[f32; 3]>,
    pub bounding_box: Option<BoundingBox>,
}

impl DetectedFace {
    pub fn new(scaled_mesh: Vec<[f32; 3]>) -> Self {
        Self {
            scaled_mesh,
            bounding_box: None,
        }
    }
}

/// Everything the detector can hand over for one frame.
pub type DetectionResult = Result<Vec<DetectedFace>, CaptureError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    AwaitingCapture,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Updated { faces: usize },
    Empty,
    ReacquireCapture,
    Rejected(MeshError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameLoopConfig {
    pub max_faces: NonZeroUsize,
    pub adapter: AdapterConfig,
    /// Rescale every face so its detector box spans this many units.
    pub fit_bounding_box: Option<f32>,
    /// Release a face after this many non-empty frames without it.
    pub release_after: Option<u32>,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            max_faces: NonZeroUsize::MIN,
            adapter: AdapterConfig::default(),
            fit_bounding_box: None,
            release_after: None,
        }
    }
}

/// Sequential driver feeding detector results into the engine.
#[derive(Debug)]
pub struct FrameLoop {
    config: FrameLoopConfig,
    adapter: PointAdapter,
    engine: MeshEngine,
    state: CaptureState,
    missing: BTreeMap<FaceId, u32>,
}

impl FrameLoop {
    pub fn new(config: FrameLoopConfig, engine: MeshEngine) -> Self {
        Self {
            adapter: PointAdapter::new(config.adapter.clone()),
            config,
            engine,
            state: CaptureState::AwaitingCapture,
            missing: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &FrameLoopConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn engine(&self) -> &MeshEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MeshEngine {
        &mut self.engine
    }

    /// The capture source has (re)started delivering frames.
    pub fn capture_ready(&mut self) {
        self.set_state(CaptureState::Running);
    }

    pub fn process(&mut self, result: DetectionResult) -> FrameOutcome {
        let faces = match result {
            Ok(faces) => faces,
            Err(err) => {
                warn!(%err, "detector failed, reacquiring capture source");
                self.set_state(CaptureState::AwaitingCapture);
                return FrameOutcome::ReacquireCapture;
            }
        };

        if faces.is_empty() {
            return FrameOutcome::Empty;
        }

        let faces = &faces[..faces.len().min(self.config.max_faces.get())];
        let buffers = match faces
            .iter()
            .map(|face| self.adapter_for(face).adapt(&face.scaled_mesh))
            .collect::<Result<Vec<PointBuffer>, MeshError>>()
        {
            Ok(buffers) => buffers,
            Err(err) => {
                warn!(%err, "skipping malformed frame");
                return FrameOutcome::Rejected(err);
            }
        };

        self.set_state(CaptureState::Running);
        for (n, points) in buffers.iter().enumerate() {
            self.engine.update_face(&FaceId::nth(n), points);
        }
        self.release_missing(buffers.len());

        FrameOutcome::Updated {
            faces: buffers.len(),
        }
    }

    fn adapter_for(&self, face: &DetectedFace) -> PointAdapter {
        match (self.config.fit_bounding_box, &face.bounding_box) {
            (Some(target), Some(bbox)) => {
                PointAdapter::new(self.config.adapter.clone().fit_bounding_box(bbox, target))
            }
            _ => self.adapter.clone(),
        }
    }

    fn release_missing(&mut self, present: usize) {
        let Some(limit) = self.config.release_after else {
            return;
        };

        for face in self.engine.registry().faces() {
            let seen = (0..present).any(|n| FaceId::nth(n) == face);
            if seen {
                self.missing.remove(&face);
                continue;
            }
            let count = self.missing.entry(face.clone()).or_default();
            *count += 1;
            if *count >= limit {
                self.missing.remove(&face);
                self.engine.release_face(&face);
            }
        }
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "capture state changed");
            self.state = state;
        }
    }
}

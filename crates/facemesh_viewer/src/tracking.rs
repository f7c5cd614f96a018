use bevy::math::Vec2;
use bevy::prelude::Resource;
use facemesh::{BoundingBox, CaptureError, DetectedFace, DetectionResult};
use facemesh_api::{Face, SetFacesRequest};

/// Detector results waiting for the next frame. Only the newest result is
/// kept; anything it replaces is counted and dropped.
#[derive(Debug, Default, Resource)]
pub struct FrameInbox {
    pending: Option<DetectionResult>,
    ready: bool,
    superseded: u64,
}

impl FrameInbox {
    pub fn push_faces(&mut self, request: SetFacesRequest) {
        let faces = request.faces.into_iter().map(detected_face).collect();
        self.push(Ok(faces));
    }

    pub fn push_lost(&mut self, reason: String) {
        self.ready = false;
        self.push(Err(CaptureError::SourceLost(reason)));
    }

    pub fn push_ready(&mut self) {
        self.ready = true;
        if matches!(self.pending, Some(Err(_))) {
            self.pending = None;
        }
    }

    /// Takes the capture-ready flag and the newest detection result.
    pub fn take(&mut self) -> (bool, Option<DetectionResult>) {
        (std::mem::take(&mut self.ready), self.pending.take())
    }

    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    fn push(&mut self, result: DetectionResult) {
        if self.pending.replace(result).is_some() {
            self.superseded += 1;
        }
    }
}

fn detected_face(face: Face) -> DetectedFace {
    DetectedFace {
        scaled_mesh: face.scaled_mesh,
        bounding_box: face.bounding_box.map(|bbox| BoundingBox {
            top_left: Vec2::from(bbox.top_left),
            bottom_right: Vec2::from(bbox.bottom_right),
        }),
    }
}

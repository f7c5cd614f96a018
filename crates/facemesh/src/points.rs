use glam::Vec3;

use crate::error::MeshError;
use crate::LANDMARK_COUNT;

/// One frame's landmarks in render space. Always [`LANDMARK_COUNT`] long.
#[derive(Debug, Clone, PartialEq)]
pub struct PointBuffer {
    points: Vec<Vec3>,
}

impl PointBuffer {
    pub fn new(points: Vec<Vec3>) -> Result<Self, MeshError> {
        if points.len() != LANDMARK_COUNT {
            return Err(MeshError::PointCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn from_raw(raw: &[[f32; 3]]) -> Result<Self, MeshError> {
        Self::new(raw.iter().copied().map(Vec3::from).collect())
    }

    /// Every landmark at the same position.
    #[cfg(test)]
    pub(crate) fn filled(point: Vec3) -> Self {
        Self {
            points: vec![point; LANDMARK_COUNT],
        }
    }

    #[cfg(test)]
    pub(crate) fn with_point(mut self, index: u32, point: Vec3) -> Self {
        if let Some(slot) = self.points.get_mut(index as usize) {
            *slot = point;
        }
        self
    }

    /// Indices are validated against the table bounds at startup, so lookups
    /// from the triangulation or annotation index are always in range.
    #[inline]
    pub fn get(&self, index: u32) -> Vec3 {
        self.points[index as usize]
    }

    pub fn as_slice(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

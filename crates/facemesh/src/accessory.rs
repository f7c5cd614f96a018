use glam::Vec3;

use crate::feature::Color;
use crate::surface::{SurfaceId, SurfaceKey};

/// A point decoration such as a pupil disc. Created once, then only moved.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessory {
    id: SurfaceId,
    key: SurfaceKey,
    color: Color,
    position: Vec3,
    dirty: bool,
}

impl Accessory {
    pub(crate) fn new(id: SurfaceId, key: SurfaceKey, color: Color) -> Self {
        Self {
            id,
            key,
            color,
            position: Vec3::ZERO,
            dirty: false,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn key(&self) -> &SurfaceKey {
        &self.key
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn move_to(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }
}

/// Axis-aligned `(min, max)` corners of `points`.
pub fn bounding_box(points: impl IntoIterator<Item = Vec3>) -> Option<(Vec3, Vec3)> {
    let mut points = points.into_iter();
    let first = points.next()?;
    Some(points.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
}

/// Midpoint of the axis-aligned bounding box of `points`.
pub fn bounding_box_center(points: impl IntoIterator<Item = Vec3>) -> Option<Vec3> {
    bounding_box(points).map(|(min, max)| (min + max) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_of_square() {
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
        ];
        assert_eq!(bounding_box_center(points), Some(Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_center_ignores_point_density() {
        // The mean would be pulled towards the cluster; the box midpoint is not.
        let points = [
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(4.0, -2.0, 6.0),
        ];
        assert_eq!(bounding_box_center(points), Some(Vec3::new(2.0, -1.0, 3.0)));
    }

    #[test]
    fn test_bounding_box_corners() {
        let points = [Vec3::new(1.0, -2.0, 0.5), Vec3::new(-1.0, 3.0, 0.0)];
        assert_eq!(
            bounding_box(points),
            Some((Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 3.0, 0.5)))
        );
    }

    #[test]
    fn test_center_of_nothing() {
        assert_eq!(bounding_box_center(Vec::new()), None);
    }
}

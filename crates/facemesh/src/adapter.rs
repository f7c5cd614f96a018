use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::MeshError;
use crate::points::PointBuffer;

/// Face rectangle reported by the detector, in detector pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub top_left: Vec2,
    pub bottom_right: Vec2,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f32 {
        self.bottom_right.y - self.top_left.y
    }
}

/// Per-axis remap from detector coordinates into render space.
///
/// Mirroring happens first (`x' = frame_width - x`), then scale, then offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    pub flip_x: bool,
    pub flip_y: bool,
    pub frame_width: f32,
    pub frame_height: f32,
    pub scale: f32,
    pub offset: Vec3,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            flip_x: false,
            flip_y: true,
            frame_width: 500.0,
            frame_height: 500.0,
            scale: 1.0,
            offset: Vec3::ZERO,
        }
    }
}

impl AdapterConfig {
    /// Scales so the detector's face box spans `target_width` units.
    pub fn fit_bounding_box(mut self, bbox: &BoundingBox, target_width: f32) -> Self {
        let width = bbox.width();
        if width > f32::EPSILON {
            self.scale = target_width / width;
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PointAdapter {
    config: AdapterConfig,
}

impl PointAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn remap(&self, point: Vec3) -> Vec3 {
        let config = &self.config;
        let mut p = point;
        if config.flip_x {
            p.x = config.frame_width - p.x;
        }
        if config.flip_y {
            p.y = config.frame_height - p.y;
        }
        p * config.scale + config.offset
    }

    pub fn adapt(&self, raw: &[[f32; 3]]) -> Result<PointBuffer, MeshError> {
        PointBuffer::new(raw.iter().map(|p| self.remap(Vec3::from(*p))).collect())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;
    use crate::LANDMARK_COUNT;

    fn adapter(flip_x: bool, flip_y: bool, scale: f32) -> PointAdapter {
        PointAdapter::new(AdapterConfig {
            flip_x,
            flip_y,
            frame_width: 400.0,
            frame_height: 300.0,
            scale,
            offset: Vec3::ZERO,
        })
    }

    #[rstest]
    #[case(false, false, 1.0, Vec3::new(10.0, 20.0, 5.0))]
    #[case(true, false, 1.0, Vec3::new(390.0, 20.0, 5.0))]
    #[case(false, true, 1.0, Vec3::new(10.0, 280.0, 5.0))]
    #[case(true, true, 0.5, Vec3::new(195.0, 140.0, 2.5))]
    fn test_remap(
        #[case] flip_x: bool,
        #[case] flip_y: bool,
        #[case] scale: f32,
        #[case] expected: Vec3,
    ) {
        let p = adapter(flip_x, flip_y, scale).remap(Vec3::new(10.0, 20.0, 5.0));
        assert_relative_eq!(p.x, expected.x);
        assert_relative_eq!(p.y, expected.y);
        assert_relative_eq!(p.z, expected.z);
    }

    #[test]
    fn test_adapt_preserves_length_and_order() {
        let raw: Vec<[f32; 3]> = (0..LANDMARK_COUNT).map(|i| [i as f32, 0.0, 0.0]).collect();
        let buffer = adapter(true, false, 1.0).adapt(&raw).unwrap();
        assert_eq!(buffer.len(), LANDMARK_COUNT);
        for (i, p) in buffer.as_slice().iter().enumerate() {
            assert_relative_eq!(p.x, 400.0 - i as f32);
        }
    }

    #[test]
    fn test_adapt_rejects_short_buffer() {
        let raw = vec![[0.0; 3]; 10];
        assert!(matches!(
            PointAdapter::default().adapt(&raw),
            Err(MeshError::PointCount { actual: 10, .. })
        ));
    }

    #[test]
    fn test_offset_applies_after_scale() {
        let adapter = PointAdapter::new(AdapterConfig {
            flip_y: false,
            scale: 2.0,
            offset: Vec3::new(1.0, 1.0, 1.0),
            ..AdapterConfig::default()
        });
        assert_eq!(adapter.remap(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(3.0, 5.0, 7.0));
    }

    #[test]
    fn test_fit_bounding_box() {
        let bbox = BoundingBox {
            top_left: Vec2::new(100.0, 100.0),
            bottom_right: Vec2::new(300.0, 350.0),
        };
        assert_relative_eq!(bbox.height(), 250.0);
        let config = AdapterConfig::default().fit_bounding_box(&bbox, 1.0);
        assert_relative_eq!(config.scale, 0.005);
    }

    #[test]
    fn test_fit_degenerate_bounding_box_keeps_scale() {
        let bbox = BoundingBox {
            top_left: Vec2::new(10.0, 10.0),
            bottom_right: Vec2::new(10.0, 40.0),
        };
        let config = AdapterConfig::default().fit_bounding_box(&bbox, 1.0);
        assert_relative_eq!(config.scale, 1.0);
    }
}

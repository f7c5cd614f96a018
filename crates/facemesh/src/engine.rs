use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use crate::accessory::{bounding_box_center, Accessory};
use crate::annotation_index::AnnotationIndex;
use crate::error::MeshError;
use crate::feature::Color;
use crate::points::PointBuffer;
use crate::surface::{FaceId, Surface, SurfaceKey, SurfaceRegistry};

/// What one [`MeshEngine::update_face`] call touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceUpdate {
    pub created: usize,
    pub updated: usize,
    pub accessories: usize,
}

/// Rewrites every surface of a face from a new point buffer.
#[derive(Debug)]
pub struct MeshEngine {
    index: Arc<AnnotationIndex>,
    registry: SurfaceRegistry,
}

impl MeshEngine {
    pub fn new(index: Arc<AnnotationIndex>, registry: SurfaceRegistry) -> Self {
        Self { index, registry }
    }

    pub fn index(&self) -> &Arc<AnnotationIndex> {
        &self.index
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SurfaceRegistry {
        &mut self.registry
    }

    /// Writes `points` into the skin and feature surfaces of `face`, creating
    /// them on first sight, then recomputes their normals and moves the
    /// face's accessories.
    pub fn update_face(&mut self, face: &FaceId, points: &PointBuffer) -> FaceUpdate {
        let index = Arc::clone(&self.index);
        let mut update = FaceUpdate::default();

        for set in std::iter::once(index.skin()).chain(index.features()) {
            let (surface, created) =
                self.registry
                    .surface_or_create(SurfaceKey::new(face, set.key()), |id, key| {
                        debug!(%key, triangles = set.len(), "creating surface");
                        Surface::new(id, key, set.color(), set)
                    });
            surface.write(index.triangulation(), points);
            surface.recompute_normals();

            if created {
                update.created += 1;
            } else {
                update.updated += 1;
            }
        }

        for accessory in index.accessories() {
            let center = bounding_box_center(accessory.points.iter().map(|&i| points.get(i)));
            if let Some(center) = center {
                place(&mut self.registry, face, &accessory.key, accessory.color, center);
                update.accessories += 1;
            }
        }

        update
    }

    /// Creates the accessory on first call, afterwards only moves it to the
    /// bounding-box centre of `points`. Returns whether it was positioned.
    pub fn render_accessory(&mut self, face: &FaceId, key: &str, points: &[Vec3]) -> Result<bool, MeshError> {
        let color = self
            .index
            .accessory(key)
            .map(|a| a.color)
            .ok_or_else(|| MeshError::UnknownFeature(key.to_string()))?;
        let Some(center) = bounding_box_center(points.iter().copied()) else {
            return Ok(false);
        };
        place(&mut self.registry, face, key, color, center);
        Ok(true)
    }

    /// Surface lookup; keys outside the catalog are programming errors.
    pub fn surface(&self, face: &FaceId, feature: &str) -> Result<&Surface, MeshError> {
        if self.index.feature(feature).is_none() {
            return Err(MeshError::UnknownFeature(feature.to_string()));
        }
        self.registry
            .surface(face, feature)
            .ok_or_else(|| MeshError::UnknownFace(face.to_string()))
    }

    pub fn accessory(&self, face: &FaceId, key: &str) -> Result<&Accessory, MeshError> {
        if self.index.accessory(key).is_none() {
            return Err(MeshError::UnknownFeature(key.to_string()));
        }
        self.registry
            .accessory(face, key)
            .ok_or_else(|| MeshError::UnknownFace(face.to_string()))
    }

    /// Forgets a face that is no longer tracked.
    pub fn release_face(&mut self, face: &FaceId) -> usize {
        let removed = self.registry.remove_face(face);
        if removed > 0 {
            debug!(%face, removed, "released face");
        }
        removed
    }
}

fn place(registry: &mut SurfaceRegistry, face: &FaceId, key: &str, color: Color, center: Vec3) {
    let (accessory, created) = registry.accessory_or_create(SurfaceKey::new(face, key), |id, key| {
        Accessory::new(id, key, color)
    });
    if created {
        debug!(key = %accessory.key(), "creating accessory");
    }
    accessory.move_to(center);
}

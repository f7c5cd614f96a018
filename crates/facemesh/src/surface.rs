use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::accessory::{bounding_box, Accessory};
use crate::annotation_index::FeatureTriangleSet;
use crate::feature::Color;
use crate::points::PointBuffer;
use crate::triangulation::Triangulation;

/// Stable identity of a tracked face, e.g. `face1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(String);

impl FaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for the n-th detection of a frame, counting from zero.
    pub fn nth(n: usize) -> Self {
        Self(format!("face{}", n + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceKey {
    pub face: FaceId,
    pub feature: String,
}

impl SurfaceKey {
    pub fn new(face: &FaceId, feature: &str) -> Self {
        Self {
            face: face.clone(),
            feature: feature.to_string(),
        }
    }
}

impl fmt::Display for SurfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.face, self.feature)
    }
}

/// Identity assigned once when a surface or accessory is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Maps each triangle-vertex slot to a shared vertex.
///
/// Slots that reference the same landmark share a vertex, so normals are
/// smoothed across the triangles around it. Depends only on the triangle
/// indices and is reused by every surface of the same feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weld {
    slots: Vec<u32>,
    vertex_count: usize,
}

impl Weld {
    pub fn new(triangulation: &Triangulation, positions: &[u32]) -> Self {
        let mut vertices: HashMap<u32, u32> = HashMap::new();
        let mut slots = Vec::with_capacity(positions.len() * 3);
        for tri in positions.iter().filter_map(|&t| triangulation.triangle(t)) {
            for landmark in tri {
                let next = vertices.len() as u32;
                slots.push(*vertices.entry(landmark).or_insert(next));
            }
        }
        Self {
            slots,
            vertex_count: vertices.len(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn vertex(&self, slot: usize) -> u32 {
        self.slots[slot]
    }
}

/// Persistent geometry for one `(face, feature)` pair.
///
/// Buffers are non-indexed triangle lists: triangle `n` of the surface owns
/// floats `n * 9 .. n * 9 + 9`. Their lengths never change after creation.
#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    key: SurfaceKey,
    color: Color,
    triangles: Arc<[u32]>,
    weld: Arc<Weld>,
    positions: Vec<f32>,
    normals: Vec<f32>,
    accumulated: Vec<Vec3>,
    dirty: bool,
}

impl Surface {
    pub(crate) fn new(id: SurfaceId, key: SurfaceKey, color: Color, set: &FeatureTriangleSet) -> Self {
        let weld = set.weld().clone();
        let floats = weld.slot_count() * 3;
        Self {
            id,
            key,
            color,
            triangles: set.positions_shared(),
            accumulated: vec![Vec3::ZERO; weld.vertex_count()],
            weld,
            positions: vec![0.0; floats],
            normals: vec![0.0; floats],
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

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 9
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn position(&self, slot: usize) -> Vec3 {
        read(&self.positions, slot)
    }

    pub fn normal(&self, slot: usize) -> Vec3 {
        read(&self.normals, slot)
    }

    /// Extent of the written geometry, `None` for an empty surface.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        bounding_box(self.positions.chunks_exact(3).map(Vec3::from_slice))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the surface changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Copies each triangle's three landmarks into its vertex slots.
    pub(crate) fn write(&mut self, triangulation: &Triangulation, points: &PointBuffer) {
        for (n, tri) in self
            .triangles
            .iter()
            .filter_map(|&t| triangulation.triangle(t))
            .enumerate()
        {
            for (corner, &landmark) in tri.iter().enumerate() {
                let offset = n * 9 + corner * 3;
                self.positions[offset..offset + 3].copy_from_slice(&points.get(landmark).to_array());
            }
        }
        self.dirty = true;
    }

    /// Area-weighted smooth normals over the welded topology.
    pub(crate) fn recompute_normals(&mut self) {
        self.accumulated.fill(Vec3::ZERO);

        for t in 0..self.triangle_count() {
            let a = read(&self.positions, t * 3);
            let b = read(&self.positions, t * 3 + 1);
            let c = read(&self.positions, t * 3 + 2);
            let face_normal = (b - a).cross(c - a);
            for corner in 0..3 {
                let vertex = self.weld.vertex(t * 3 + corner) as usize;
                self.accumulated[vertex] += face_normal;
            }
        }

        for slot in 0..self.weld.slot_count() {
            let normal = self.accumulated[self.weld.vertex(slot) as usize].normalize_or_zero();
            self.normals[slot * 3..slot * 3 + 3].copy_from_slice(&normal.to_array());
        }
    }
}

fn read(buffer: &[f32], slot: usize) -> Vec3 {
    Vec3::from_slice(&buffer[slot * 3..slot * 3 + 3])
}

/// Owns every surface and accessory, keyed by `(face, feature)`.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: HashMap<SurfaceKey, Surface>,
    accessories: HashMap<SurfaceKey, Accessory>,
    next_id: u64,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(next_id: &mut u64) -> SurfaceId {
        let id = SurfaceId(*next_id);
        *next_id += 1;
        id
    }

    /// Looks up a surface, creating it with `create` on first sight.
    pub(crate) fn surface_or_create(
        &mut self,
        key: SurfaceKey,
        create: impl FnOnce(SurfaceId, SurfaceKey) -> Surface,
    ) -> (&mut Surface, bool) {
        match self.surfaces.entry(key) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let id = Self::allocate_id(&mut self.next_id);
                let surface = create(id, entry.key().clone());
                (entry.insert(surface), true)
            }
        }
    }

    pub(crate) fn accessory_or_create(
        &mut self,
        key: SurfaceKey,
        create: impl FnOnce(SurfaceId, SurfaceKey) -> Accessory,
    ) -> (&mut Accessory, bool) {
        match self.accessories.entry(key) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let id = Self::allocate_id(&mut self.next_id);
                let accessory = create(id, entry.key().clone());
                (entry.insert(accessory), true)
            }
        }
    }

    pub fn surface(&self, face: &FaceId, feature: &str) -> Option<&Surface> {
        self.surfaces.get(&SurfaceKey::new(face, feature))
    }

    pub fn accessory(&self, face: &FaceId, key: &str) -> Option<&Accessory> {
        self.accessories.get(&SurfaceKey::new(face, key))
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.values_mut()
    }

    pub fn accessories(&self) -> impl Iterator<Item = &Accessory> {
        self.accessories.values()
    }

    pub fn accessories_mut(&mut self) -> impl Iterator<Item = &mut Accessory> {
        self.accessories.values_mut()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn faces(&self) -> BTreeSet<FaceId> {
        self.surfaces
            .keys()
            .chain(self.accessories.keys())
            .map(|k| k.face.clone())
            .collect()
    }

    pub fn contains_face(&self, face: &FaceId) -> bool {
        self.surfaces.keys().any(|k| &k.face == face)
    }

    /// Drops everything belonging to `face`; returns how many objects went.
    pub fn remove_face(&mut self, face: &FaceId) -> usize {
        let before = self.surfaces.len() + self.accessories.len();
        self.surfaces.retain(|k, _| &k.face != face);
        self.accessories.retain(|k, _| &k.face != face);
        before - self.surfaces.len() - self.accessories.len()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::annotation_index::FeatureTriangleSet;

    fn quad() -> (Triangulation, FeatureTriangleSet) {
        // Two triangles sharing the 1-2 edge, folded along it.
        let triangulation = Triangulation::from_triangles(vec![[0, 1, 2], [2, 1, 3]]);
        let set = FeatureTriangleSet::new("quad", &triangulation, vec![0, 1], Default::default());
        (triangulation, set)
    }

    fn surface(set: &FeatureTriangleSet) -> Surface {
        Surface::new(SurfaceId(7), SurfaceKey::new(&"face1".into(), "quad"), Color::SKIN, set)
    }

    #[test]
    fn test_weld_shares_repeated_landmarks() {
        let (triangulation, _) = quad();
        let weld = Weld::new(&triangulation, &[0, 1]);
        assert_eq!(weld.slot_count(), 6);
        assert_eq!(weld.vertex_count(), 4);
        assert_eq!(weld.vertex(1), weld.vertex(4));
        assert_eq!(weld.vertex(2), weld.vertex(3));
    }

    #[test]
    fn test_new_surface_is_zeroed_and_clean() {
        let (_, set) = quad();
        let surface = surface(&set);
        assert_eq!(surface.positions().len(), 18);
        assert_eq!(surface.normals().len(), 18);
        assert!(surface.positions().iter().all(|v| *v == 0.0));
        assert!(!surface.is_dirty());
    }

    #[test]
    fn test_write_fills_slots_in_triangle_order() {
        let (triangulation, set) = quad();
        let mut surface = surface(&set);
        let points = PointBuffer::filled(Vec3::ZERO)
            .with_point(1, Vec3::X)
            .with_point(2, Vec3::Y)
            .with_point(3, Vec3::ONE);
        surface.write(&triangulation, &points);

        assert_eq!(surface.position(0), Vec3::ZERO);
        assert_eq!(surface.position(1), Vec3::X);
        assert_eq!(surface.position(2), Vec3::Y);
        assert_eq!(surface.position(3), Vec3::Y);
        assert_eq!(surface.position(4), Vec3::X);
        assert_eq!(surface.position(5), Vec3::ONE);
        assert!(surface.take_dirty());
        assert!(!surface.take_dirty());
    }

    #[test]
    fn test_bounds_cover_written_slots() {
        let (triangulation, set) = quad();
        let mut surface = surface(&set);
        let points = PointBuffer::filled(Vec3::new(5.0, 5.0, 5.0))
            .with_point(0, Vec3::new(1.0, 2.0, 0.0))
            .with_point(3, Vec3::new(4.0, 8.0, 1.0));
        surface.write(&triangulation, &points);
        assert_eq!(
            surface.bounds(),
            Some((Vec3::new(1.0, 2.0, 0.0), Vec3::new(5.0, 8.0, 5.0)))
        );

        let empty = FeatureTriangleSet::new("none", &triangulation, Vec::new(), Default::default());
        assert_eq!(Surface::new(SurfaceId(1), SurfaceKey::new(&"face1".into(), "none"), Color::SKIN, &empty).bounds(), None);
    }

    #[test]
    fn test_flat_quad_normals_point_along_z() {
        let (triangulation, set) = quad();
        let mut surface = surface(&set);
        let points = PointBuffer::filled(Vec3::ZERO)
            .with_point(1, Vec3::X)
            .with_point(2, Vec3::Y)
            .with_point(3, Vec3::new(1.0, 1.0, 0.0));
        surface.write(&triangulation, &points);
        surface.recompute_normals();

        for slot in 0..6 {
            let n = surface.normal(slot);
            assert_relative_eq!(n.z, 1.0);
            assert_relative_eq!(n.length(), 1.0);
        }
    }

    #[test]
    fn test_shared_vertices_get_smoothed_normals() {
        let (triangulation, set) = quad();
        let mut surface = surface(&set);
        // Second triangle tilted up out of the plane.
        let points = PointBuffer::filled(Vec3::ZERO)
            .with_point(1, Vec3::X)
            .with_point(2, Vec3::Y)
            .with_point(3, Vec3::new(1.0, 1.0, 1.0));
        surface.write(&triangulation, &points);
        surface.recompute_normals();

        // Landmark 1 appears in both triangles: identical normal in both slots.
        assert_eq!(surface.normal(1), surface.normal(4));
        // Landmark 0 only touches the flat triangle.
        assert_relative_eq!(surface.normal(0).z, 1.0);
        // The shared edge blends the two face normals.
        let shared = surface.normal(1);
        assert!(shared.z < 1.0 && shared.z > 0.0);
    }

    #[test]
    fn test_degenerate_triangles_yield_zero_normals() {
        let (triangulation, set) = quad();
        let mut surface = surface(&set);
        surface.write(&triangulation, &PointBuffer::filled(Vec3::ONE));
        surface.recompute_normals();
        assert!(surface.normals().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_registry_reuses_existing_surface() {
        let (_, set) = quad();
        let mut registry = SurfaceRegistry::new();
        let face = FaceId::nth(0);
        let key = SurfaceKey::new(&face, "quad");

        let (first, created) =
            registry.surface_or_create(key.clone(), |id, key| Surface::new(id, key, Color::SKIN, &set));
        let first_id = first.id();
        assert!(created);

        let (second, created) = registry.surface_or_create(key, |_, _| panic!("must not recreate"));
        assert!(!created);
        assert_eq!(second.id(), first_id);
        assert_eq!(registry.surface_count(), 1);
    }

    #[test]
    fn test_remove_face_only_drops_that_face() {
        let (_, set) = quad();
        let mut registry = SurfaceRegistry::new();
        for face in [FaceId::nth(0), FaceId::nth(1)] {
            registry.surface_or_create(SurfaceKey::new(&face, "quad"), |id, key| {
                Surface::new(id, key, Color::SKIN, &set)
            });
        }
        assert_eq!(registry.remove_face(&FaceId::nth(0)), 1);
        assert!(!registry.contains_face(&FaceId::nth(0)));
        assert!(registry.contains_face(&FaceId::nth(1)));
        assert_eq!(registry.faces(), BTreeSet::from([FaceId::from("face2")]));
    }
}

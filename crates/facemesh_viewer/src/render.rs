use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::mesh::VertexAttributeValues;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::PrimitiveTopology;
use bevy::render::view::NoFrustumCulling;
use facemesh::{
    AnnotationIndex, FaceId, FrameLoop, FrameLoopConfig, FrameOutcome, MeshEngine, Surface, SurfaceId, SurfaceRegistry,
    SKIN,
};
use tracing::debug;

use crate::tracking::FrameInbox;

/// Runs the face mesh engine every frame and mirrors its surfaces into the
/// scene.
pub struct FaceMeshPlugin {
    pub index: Arc<AnnotationIndex>,
    pub config: FrameLoopConfig,
    /// Pupil disc radius as a fraction of the face width.
    pub pupil_size: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, SystemSet)]
pub struct FaceMeshSystems;

impl Plugin for FaceMeshPlugin {
    fn build(&self, app: &mut App) {
        let engine = MeshEngine::new(self.index.clone(), SurfaceRegistry::new());
        app.insert_resource(FaceMeshState {
            frames: FrameLoop::new(self.config.clone(), engine),
            last_outcome: None,
        })
        .insert_resource(PupilSize(self.pupil_size))
        .init_resource::<FrameInbox>()
        .init_resource::<SpawnedSurfaces>()
        .add_systems(
            Update,
            (apply_frames, sync_surfaces, sync_accessories)
                .chain()
                .in_set(FaceMeshSystems),
        );
    }
}

#[derive(Resource)]
pub struct FaceMeshState {
    pub frames: FrameLoop,
    pub last_outcome: Option<FrameOutcome>,
}

#[derive(Debug, Clone, Copy, Resource)]
pub struct PupilSize(pub f32);

#[derive(Debug, Clone, Copy, Component)]
pub struct FaceSurface(pub SurfaceId);

#[derive(Debug, Clone, Copy, Component)]
pub struct FaceAccessory(pub SurfaceId);

/// Scene objects created for engine surfaces and accessories.
#[derive(Debug, Default, Resource)]
pub struct SpawnedSurfaces {
    meshes: HashMap<SurfaceId, (Entity, Handle<Mesh>)>,
    accessories: HashMap<SurfaceId, Entity>,
}

pub fn apply_frames(mut inbox: ResMut<FrameInbox>, mut state: ResMut<FaceMeshState>) {
    let (ready, pending) = inbox.take();
    if ready {
        state.frames.capture_ready();
    }
    if let Some(result) = pending {
        let outcome = state.frames.process(result);
        debug!(?outcome, "processed frame");
        state.last_outcome = Some(outcome);
    }
}

pub fn sync_surfaces(
    mut commands: Commands,
    mut state: ResMut<FaceMeshState>,
    mut spawned: ResMut<SpawnedSurfaces>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let registry = state.frames.engine_mut().registry_mut();
    let mut live = HashSet::new();

    for surface in registry.surfaces_mut() {
        live.insert(surface.id());
        if surface.is_empty() || !surface.take_dirty() {
            continue;
        }

        if let Some((_, handle)) = spawned.meshes.get(&surface.id()) {
            if let Some(mesh) = meshes.get_mut(handle) {
                write_attributes(mesh, surface);
            }
            continue;
        }

        let mesh = meshes.add(surface_mesh(surface));
        let material = materials.add(StandardMaterial {
            base_color: color(surface.color()),
            double_sided: true,
            cull_mode: None,
            perceptual_roughness: 0.9,
            ..default()
        });
        let entity = commands
            .spawn((
                Name::new(format!("__face_{}", surface.key())),
                PbrBundle {
                    mesh: mesh.clone(),
                    material,
                    ..default()
                },
                NoFrustumCulling,
                FaceSurface(surface.id()),
            ))
            .id();
        debug!(key = %surface.key(), ?entity, "spawned surface");
        spawned.meshes.insert(surface.id(), (entity, mesh));
    }

    spawned.meshes.retain(|id, (entity, handle)| {
        if live.contains(id) {
            return true;
        }
        commands.entity(*entity).despawn_recursive();
        meshes.remove(handle.id());
        false
    });
}

pub fn sync_accessories(
    mut commands: Commands,
    mut state: ResMut<FaceMeshState>,
    mut spawned: ResMut<SpawnedSurfaces>,
    mut transforms: Query<&mut Transform, With<FaceAccessory>>,
    size: Res<PupilSize>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let registry = state.frames.engine_mut().registry_mut();
    let face_widths: HashMap<FaceId, f32> = registry
        .faces()
        .into_iter()
        .filter_map(|face| {
            let (min, max) = registry.surface(&face, SKIN)?.bounds()?;
            Some((face, max.x - min.x))
        })
        .collect();
    let mut live = HashSet::new();

    for accessory in registry.accessories_mut() {
        live.insert(accessory.id());
        if !accessory.take_dirty() {
            continue;
        }

        let radius = face_widths.get(&accessory.key().face).copied().unwrap_or_default() * size.0;
        // Nudged towards the camera so the disc is not buried in the eye.
        let translation = accessory.position() + Vec3::Z * radius;
        if let Some(&entity) = spawned.accessories.get(&accessory.id()) {
            if let Ok(mut transform) = transforms.get_mut(entity) {
                transform.translation = translation;
                transform.scale = Vec3::splat(radius);
            }
            continue;
        }

        let entity = commands
            .spawn((
                Name::new(format!("__point_{}", accessory.key())),
                PbrBundle {
                    mesh: meshes.add(Circle::new(1.0)),
                    material: materials.add(StandardMaterial {
                        base_color: color(accessory.color()),
                        unlit: true,
                        double_sided: true,
                        cull_mode: None,
                        ..default()
                    }),
                    transform: Transform::from_translation(translation).with_scale(Vec3::splat(radius)),
                    ..default()
                },
                FaceAccessory(accessory.id()),
            ))
            .id();
        debug!(key = %accessory.key(), ?entity, "spawned accessory");
        spawned.accessories.insert(accessory.id(), entity);
    }

    spawned.accessories.retain(|id, entity| {
        if live.contains(id) {
            return true;
        }
        commands.entity(*entity).despawn_recursive();
        false
    });
}

fn color(color: facemesh::Color) -> Color {
    let [r, g, b] = color.rgb();
    Color::srgb_u8(r, g, b)
}

fn surface_mesh(surface: &Surface) -> Mesh {
    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, to_vertices(surface.positions()))
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, to_vertices(surface.normals()))
}

fn to_vertices(buffer: &[f32]) -> Vec<[f32; 3]> {
    buffer.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

/// Overwrites the mesh's vertex data in place; the vertex count never changes.
fn write_attributes(mesh: &mut Mesh, surface: &Surface) {
    if let Some(VertexAttributeValues::Float32x3(values)) = mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION) {
        copy_vertices(values, surface.positions());
    }
    if let Some(VertexAttributeValues::Float32x3(values)) = mesh.attribute_mut(Mesh::ATTRIBUTE_NORMAL) {
        copy_vertices(values, surface.normals());
    }
}

fn copy_vertices(values: &mut [[f32; 3]], buffer: &[f32]) {
    for (value, chunk) in values.iter_mut().zip(buffer.chunks_exact(3)) {
        value.copy_from_slice(chunk);
    }
}

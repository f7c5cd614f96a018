use bevy::prelude::*;
use facemesh::{AdapterConfig, FaceId, SKIN};
use tracing::debug;

use crate::render::FaceMeshState;

/// Region of render space the adapted landmarks land in when no face box
/// fitting is applied.
#[derive(Debug, Clone, Copy, Resource)]
pub struct FrameSize {
    pub origin: Vec3,
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    pub fn from_adapter(adapter: &AdapterConfig) -> Self {
        Self {
            origin: adapter.offset,
            width: adapter.frame_width * adapter.scale,
            height: adapter.frame_height * adapter.scale,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.origin + Vec3::new(self.width / 2.0, self.height / 2.0, 0.0)
    }
}

/// How the camera is kept on the faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub enum CameraFraming {
    /// Fixed on the whole detector frame.
    Frame,
    /// Moved onto the first face's skin once it appears. The frame size is
    /// meaningless when every face is rescaled to its own box.
    FirstFace,
}

const FOV_DEGREES: f32 = 45.0;
const FACE_MARGIN: f32 = 1.5;

/// Camera distance at which a frame of `height` fills the view.
pub fn camera_distance(height: f32) -> f32 {
    height / (FOV_DEGREES.to_radians() / 2.0).tan()
}

/// Camera transform and far plane for a region of `size` centred on `center`.
pub fn camera_view(center: Vec3, size: Vec2) -> (Transform, f32) {
    let z = camera_distance(size.x.max(size.y));
    let transform = Transform::from_translation(center + Vec3::Z * (z / 2.0)).looking_at(center, Vec3::Y);
    (transform, z * 2.0)
}

pub fn setup_scene(mut commands: Commands, frame: Res<FrameSize>) {
    let center = frame.center();
    let (transform, far) = camera_view(center, Vec2::new(frame.width, frame.height));

    commands.insert_resource(ClearColor(Color::WHITE));
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
    });

    commands.spawn((
        Name::new("Camera"),
        Camera3dBundle {
            projection: PerspectiveProjection {
                fov: FOV_DEGREES.to_radians(),
                near: 0.01,
                far,
                ..default()
            }
            .into(),
            transform,
            ..default()
        },
    ));

    commands.spawn((
        Name::new("Sun"),
        DirectionalLightBundle {
            directional_light: DirectionalLight {
                illuminance: 4000.0,
                ..default()
            },
            transform: Transform::from_translation(center + Vec3::new(frame.width, frame.height, far) / 2.0)
                .looking_at(center, Vec3::Y),
            ..default()
        },
    ));
}

pub fn frame_first_face(
    framing: Res<CameraFraming>,
    mut framed: Local<bool>,
    state: Res<FaceMeshState>,
    mut cameras: Query<(&mut Transform, &mut Projection), With<Camera3d>>,
) {
    if *framing != CameraFraming::FirstFace || *framed {
        return;
    }
    let Ok(skin) = state.frames.engine().surface(&FaceId::nth(0), SKIN) else {
        return;
    };
    let Some((min, max)) = skin.bounds() else {
        return;
    };

    let center = (min + max) / 2.0;
    let size = (max - min).truncate() * FACE_MARGIN;
    let (view, far) = camera_view(center, size);
    for (mut transform, mut projection) in &mut cameras {
        *transform = view;
        if let Projection::Perspective(perspective) = projection.as_mut() {
            perspective.far = far;
        }
    }
    debug!(?center, ?size, "framed camera on first face");
    *framed = true;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use facemesh::{AnnotationIndex, FrameLoopConfig, LANDMARK_COUNT};
    use facemesh_api::{BoundingBox, Face, SetFacesRequest};

    use super::*;
    use crate::render::{FaceMeshPlugin, FaceMeshSystems};
    use crate::tracking::FrameInbox;

    fn app(config: FrameLoopConfig, framing: CameraFraming) -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .insert_resource(FrameSize::from_adapter(&config.adapter))
            .insert_resource(framing)
            .add_plugins(FaceMeshPlugin {
                index: Arc::new(AnnotationIndex::canonical().unwrap()),
                config,
                pupil_size: 0.025,
            })
            .add_systems(Startup, setup_scene)
            .add_systems(Update, frame_first_face.after(FaceMeshSystems));
        app
    }

    fn push_face(app: &mut App) {
        // A face well away from the frame origin, spanning 200 px.
        let scaled_mesh = (0..LANDMARK_COUNT)
            .map(|i| [300.0 + (i % 200) as f32, 100.0 + (i * 7 % 200) as f32, (i % 11) as f32])
            .collect();
        app.world_mut()
            .resource_mut::<FrameInbox>()
            .push_faces(SetFacesRequest {
                faces: vec![Face {
                    scaled_mesh,
                    annotations: Default::default(),
                    bounding_box: Some(BoundingBox {
                        top_left: [300.0, 100.0],
                        bottom_right: [500.0, 300.0],
                    }),
                }],
            });
    }

    fn camera(app: &mut App) -> (Transform, f32) {
        let mut query = app.world_mut().query_filtered::<(&Transform, &Projection), With<Camera3d>>();
        let (transform, projection) = query.single(app.world());
        let Projection::Perspective(perspective) = projection else {
            panic!("expected a perspective camera");
        };
        (*transform, perspective.far)
    }

    #[test]
    fn test_camera_distance_fits_frame_height() {
        let z = camera_distance(500.0);
        assert_relative_eq!(z, 500.0 / 22.5f32.to_radians().tan(), epsilon = 1e-3);
        assert!(z > 500.0);
    }

    #[test]
    fn test_frame_center_includes_offset() {
        let adapter = AdapterConfig {
            scale: 0.5,
            offset: Vec3::new(-100.0, 20.0, 0.0),
            ..Default::default()
        };
        let frame = FrameSize::from_adapter(&adapter);
        assert_eq!(frame.width, 250.0);
        assert_eq!(frame.center(), Vec3::new(25.0, 145.0, 0.0));
    }

    #[test]
    fn test_fitted_face_is_framed_by_camera() {
        let config = FrameLoopConfig {
            fit_bounding_box: Some(1.0),
            ..Default::default()
        };
        let mut app = app(config, CameraFraming::FirstFace);
        app.update();
        push_face(&mut app);
        app.update();

        let state = app.world().resource::<FaceMeshState>();
        let skin = state.frames.engine().surface(&FaceId::nth(0), SKIN).unwrap();
        let (min, max) = skin.bounds().unwrap();
        // Rescaled to roughly one unit, nowhere near the 500 px frame.
        assert!(max.x - min.x < 2.0);

        let (transform, far) = camera(&mut app);
        let center = (min + max) / 2.0;
        assert_relative_eq!(transform.translation.x, center.x, epsilon = 1e-4);
        assert_relative_eq!(transform.translation.y, center.y, epsilon = 1e-4);

        let distance = transform.translation.z - center.z;
        let half_fov = (FOV_DEGREES.to_radians() / 2.0).tan();
        let half_extent = (max - min).truncate().max_element() / 2.0;
        assert!(distance > 0.0);
        assert!(half_extent / distance <= half_fov);
        assert!(far > distance + (max.z - min.z));
    }

    #[test]
    fn test_frame_framing_ignores_faces() {
        let mut app = app(FrameLoopConfig::default(), CameraFraming::Frame);
        app.update();
        let (before, _) = camera(&mut app);
        push_face(&mut app);
        app.update();

        let (after, _) = camera(&mut app);
        assert_eq!(before.translation, after.translation);
        assert_eq!(before.translation.truncate(), Vec2::new(250.0, 250.0));
    }
}

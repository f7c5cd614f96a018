use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;
use bevy_inspector_egui::quick::WorldInspectorPlugin;
use clap::Parser;
use facemesh::{AnnotationGroups, AnnotationIndex, Triangulation};
use tracing::{error, info};

use crate::config::ViewerConfig;
use crate::render::{FaceMeshPlugin, FaceMeshSystems};
use crate::scene::{CameraFraming, FrameSize};

mod api;
mod config;
mod render;
mod scene;
mod tracking;

#[derive(Parser, Debug)]
struct Options {
    #[arg(long, default_value = "127.0.0.1:8888")]
    pub api_bind: String,
    #[arg(long)]
    pub max_faces: Option<NonZeroUsize>,
    #[arg(long, short = 'W')]
    pub frame_width: Option<f32>,
    #[arg(long, short = 'H')]
    pub frame_height: Option<f32>,
    #[arg(long)]
    pub flip_x: Option<bool>,
    #[arg(long)]
    pub flip_y: Option<bool>,
    #[arg(long)]
    pub scale: Option<f32>,
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub inspector: bool,
}

impl Options {
    /// Command-line values take precedence over the config file.
    fn viewer_config(&self) -> anyhow::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };

        let adapter = &mut config.frames.adapter;
        if let Some(width) = self.frame_width {
            adapter.frame_width = width;
        }
        if let Some(height) = self.frame_height {
            adapter.frame_height = height;
        }
        if let Some(flip_x) = self.flip_x {
            adapter.flip_x = flip_x;
        }
        if let Some(flip_y) = self.flip_y {
            adapter.flip_y = flip_y;
        }
        if let Some(scale) = self.scale {
            adapter.scale = scale;
        }
        if let Some(max_faces) = self.max_faces {
            config.frames.max_faces = max_faces;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let options = Options::parse();
    let config = options.viewer_config()?;

    let index = AnnotationIndex::build(
        Triangulation::canonical(),
        AnnotationGroups::canonical(),
        &config.catalog,
    )?;
    info!(
        triangles = index.triangulation().len(),
        features = index.features().len(),
        "annotation index ready"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let api_addr = options.api_bind.parse()?;
    let (api_state, api_resource) = api::ApiState::new();
    runtime.spawn(async move {
        info!("serving API on {}", api_addr);
        if let Err(err) = axum_server::bind(api_addr)
            .serve(api::new_api().with_state(api_state).into_make_service())
            .await
        {
            error!("failed to serve API: {}", err);
        }
    });

    let frame = FrameSize::from_adapter(&config.frames.adapter);
    let framing = match config.frames.fit_bounding_box {
        Some(_) => CameraFraming::FirstFace,
        None => CameraFraming::Frame,
    };

    let mut app = App::new();
    app.add_plugins(DefaultPlugins)
        .add_plugins(FaceMeshPlugin {
            index: Arc::new(index),
            config: config.frames.clone(),
            pupil_size: config.pupil_size,
        })
        .insert_resource(api_resource)
        .insert_resource(frame)
        .insert_resource(framing)
        .add_systems(Startup, scene::setup_scene)
        .add_systems(
            Update,
            (
                api::update_api.before(FaceMeshSystems),
                scene::frame_first_face.after(FaceMeshSystems),
            ),
        );

    if options.inspector {
        app.add_plugins(WorldInspectorPlugin::new());
    }

    app.run();
    Ok(())
}

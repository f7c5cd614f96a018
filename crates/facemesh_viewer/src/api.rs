use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use bevy::prelude::{ResMut, Resource};
use tokio::sync::mpsc;
use tracing::info;

use facemesh::LANDMARK_COUNT;
use facemesh_api::{ApiError, CaptureState, SetCaptureRequest, SetFacesRequest};

use crate::tracking::FrameInbox;

#[derive(Debug)]
pub enum Command {
    SetFaces(SetFacesRequest),
    SetCapture(SetCaptureRequest),
}

pub struct ApiState {
    tx: mpsc::UnboundedSender<Command>,
}

impl ApiState {
    pub fn new() -> (Arc<Self>, ApiResource) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), ApiResource { rx })
    }

    fn send(&self, command: Command) -> Result<StatusCode, ApiError> {
        self.tx
            .send(command)
            .map(|_| StatusCode::NO_CONTENT)
            .map_err(|_| ApiError::unavailable())
    }
}

async fn put_faces(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SetFacesRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate(LANDMARK_COUNT)?;
    state.send(Command::SetFaces(request))
}

async fn put_capture(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SetCaptureRequest>,
) -> Result<StatusCode, ApiError> {
    state.send(Command::SetCapture(request))
}

pub fn new_api() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/v1/faces", put(put_faces))
        .route("/v1/capture", put(put_capture))
}

#[derive(Resource)]
pub struct ApiResource {
    rx: mpsc::UnboundedReceiver<Command>,
}

pub fn update_api(mut api: ResMut<ApiResource>, mut inbox: ResMut<FrameInbox>) {
    while let Ok(command) = api.rx.try_recv() {
        match command {
            Command::SetFaces(request) => inbox.push_faces(request),
            Command::SetCapture(SetCaptureRequest { state, reason }) => match state {
                CaptureState::Ready => {
                    info!("capture source ready");
                    inbox.push_ready();
                }
                CaptureState::Lost => {
                    inbox.push_lost(reason.unwrap_or_else(|| "capture source lost".to_string()));
                }
            },
        }
    }
}

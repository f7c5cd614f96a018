use std::borrow::Cow;
use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Unknown,
    Cancelled,
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    PermissionDenied,
    Unimplemented,
}

impl ErrorCategory {
    pub fn to_status_code(self) -> StatusCode {
        match self {
            ErrorCategory::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCategory::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCategory::FailedPrecondition => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCategory::Unimplemented => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub category: ErrorCategory,
    pub error_code: Cow<'static, str>,
    pub instance_id: String,
    pub message: Cow<'static, str>,
}

impl ApiError {
    pub fn with_message(
        category: ErrorCategory,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            category,
            error_code: code.into(),
            instance_id: nanoid::nanoid!(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(code: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_message(ErrorCategory::InvalidArgument, code, message)
    }

    pub fn unavailable() -> Self {
        Self::with_message(ErrorCategory::Cancelled, "unavailable", "service unavailable")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.category.to_status_code();
        (status_code, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub top_left: [f32; 2],
    pub bottom_right: [f32; 2],
}

/// One detected face. `scaled_mesh` holds the landmarks in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Face {
    pub scaled_mesh: Vec<[f32; 3]>,
    /// Per-group landmark coordinates as sent by the detector. Not used for
    /// geometry, the viewer has its own compiled index.
    #[serde(default)]
    pub annotations: HashMap<String, Vec<[f32; 3]>>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFacesRequest {
    pub faces: Vec<Face>,
}

impl SetFacesRequest {
    /// Checks that every face carries `expected_points` finite landmarks.
    pub fn validate(&self, expected_points: usize) -> Result<(), ApiError> {
        for (n, face) in self.faces.iter().enumerate() {
            if face.scaled_mesh.len() != expected_points {
                return Err(ApiError::invalid_argument(
                    "point_count",
                    format!(
                        "face {} has {} landmarks, expected {}",
                        n,
                        face.scaled_mesh.len(),
                        expected_points
                    ),
                ));
            }

            if face.scaled_mesh.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ApiError::invalid_argument(
                    "non_finite",
                    format!("face {} has a non-finite coordinate", n),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureState {
    Ready,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCaptureRequest {
    pub state: CaptureState,
    #[serde(default)]
    pub reason: Option<String>,
}

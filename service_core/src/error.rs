use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Detail returned to the caller for every [`InferenceError`].
pub const INFERENCE_FAILURE_DETAIL: &str = "Error processing image";

/// The request itself is unacceptable. The message is safe to show to the caller.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid file format. Use {}", accepted_formats(.0))]
    InvalidFormat(&'static [&'static str]),
    #[error("Missing upload field '{0}'")]
    MissingField(&'static str),
    #[error("Malformed multipart request: {0}")]
    Multipart(String),
    #[error("Upload exceeds the maximum allowed size")]
    PayloadTooLarge,
    #[error("Unable to decode image: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> StatusCode {
        match self {
            ClientError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<MultipartError> for ClientError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ClientError::PayloadTooLarge
        } else {
            ClientError::Multipart(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ClientError {
    fn from(rejection: MultipartRejection) -> Self {
        ClientError::Multipart(rejection.body_text())
    }
}

fn accepted_formats(formats: &[&str]) -> String {
    let quoted: Vec<String> = formats.iter().map(|f| format!("'{}'", f)).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

/// The model capability failed on an accepted input. Carries the internal
/// cause for logs only.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("onnx runtime error: {0}")]
    Runtime(#[from] ort::Error),
    #[error("unexpected tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("unexpected model output: {0}")]
    Output(String),
    #[error("failed to encode output: {0}")]
    Encode(String),
    #[error("no image has been set on the predictor")]
    NoImageSet,
    #[error("model session mutex poisoned")]
    SessionPoisoned,
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("inference task failed: {0}")]
    Task(String),
}

/// Boundary error of every HTTP handler.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Client(err) => err.status(),
            ServiceError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed in the response body.
    pub fn detail(&self) -> String {
        match self {
            ServiceError::Client(err) => err.to_string(),
            ServiceError::Inference(_) => INFERENCE_FAILURE_DETAIL.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            ServiceError::Client(err) => tracing::warn!("Rejected request: {}", err),
            ServiceError::Inference(err) => tracing::error!("Error processing image: {}", err),
        }

        let body = serde_json::json!({ "detail": self.detail() });
        (self.status(), Json(body)).into_response()
    }
}

/// The process cannot start serving.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("model file not found: {0:?}")]
    ModelNotFound(PathBuf),
    #[error("failed to create model session: {0}")]
    Session(#[from] ort::Error),
    #[error("failed to initialize telemetry: {0}")]
    Telemetry(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

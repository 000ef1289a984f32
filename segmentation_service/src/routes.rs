use crate::{model_service::EmbeddingService, npy::encode_npy};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderName,
    routing::{get, post},
    Json, Router,
};
use service_core::{
    telemetry::Metrics, upload::read_upload, ClientError, ResponseStream, ServiceError,
};
use std::{sync::Arc, time::Instant};
use tracing::instrument;

pub const UPLOAD_FIELD: &str = "image";
pub const EMBEDDING_FILENAME: &str = "embedding.npy";

pub const ORIGINAL_SIZE_HEADER: HeaderName = HeaderName::from_static("x-original-size");
pub const INPUT_SIZE_HEADER: HeaderName = HeaderName::from_static("x-input-size");

const ROUTE: &str = "/sam";

pub struct SharedState<E> {
    pub embedding_service: Arc<E>,
    pub metrics: Arc<Metrics>,
}

impl<E> Clone for SharedState<E> {
    fn clone(&self) -> Self {
        Self {
            embedding_service: self.embedding_service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn api_routes<E: EmbeddingService>() -> Router<SharedState<E>> {
    Router::new()
        .route("/", get(root))
        .route(ROUTE, post(embed_image::<E>))
}

pub async fn root() -> Json<&'static str> {
    Json("hello world")
}

#[instrument(skip_all)]
pub async fn embed_image<E: EmbeddingService>(
    State(state): State<SharedState<E>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ResponseStream, ServiceError> {
    state.metrics.record_request(ROUTE);

    let result = handle_upload(&state, multipart).await;
    if let Err(e) = &result {
        let kind = match e {
            ServiceError::Client(_) => "client",
            ServiceError::Inference(_) => "inference",
        };
        state.metrics.record_failure(ROUTE, kind);
    }
    result
}

async fn handle_upload<E: EmbeddingService>(
    state: &SharedState<E>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ResponseStream, ServiceError> {
    let upload = read_upload(multipart.map_err(ClientError::from)?, UPLOAD_FIELD).await?;
    tracing::info!(
        "Received image {:?} ({} bytes)",
        upload.file_name,
        upload.data.len()
    );

    let start = Instant::now();
    let embedding = state.embedding_service.embed(upload.data).await?;
    state
        .metrics
        .record_inference_duration(start.elapsed().as_millis() as u64, ROUTE);

    let npy = encode_npy(&embedding.features)?;

    Ok(ResponseStream::attachment(npy, EMBEDDING_FILENAME)
        .with_header(
            ORIGINAL_SIZE_HEADER,
            format_size(embedding.original_size),
        )
        .with_header(INPUT_SIZE_HEADER, format_size(embedding.input_size)))
}

fn format_size((height, width): (u32, u32)) -> String {
    format!("{},{}", height, width)
}

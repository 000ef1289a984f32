use crate::{model_service::MattingService, validation::validate_filename};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Router,
};
use service_core::{
    telemetry::Metrics, upload::read_upload, ClientError, ResponseStream, ServiceError,
};
use std::{sync::Arc, time::Instant};
use tracing::instrument;

pub const UPLOAD_FIELD: &str = "file";
const ROUTE: &str = "/";

pub struct SharedState<M> {
    pub matting_service: Arc<M>,
    pub metrics: Arc<Metrics>,
}

impl<M> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            matting_service: self.matting_service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn api_routes<M: MattingService>() -> Router<SharedState<M>> {
    Router::new().route(ROUTE, post(remove_background::<M>))
}

#[instrument(skip_all)]
pub async fn remove_background<M: MattingService>(
    State(state): State<SharedState<M>>,
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

async fn handle_upload<M: MattingService>(
    state: &SharedState<M>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ResponseStream, ServiceError> {
    let upload = read_upload(multipart.map_err(ClientError::from)?, UPLOAD_FIELD).await?;
    tracing::info!("Received file: {:?}", upload.file_name);

    validate_filename(upload.file_name.as_deref())?;

    let start = Instant::now();
    let png = state.matting_service.remove_background(upload.data).await?;
    state
        .metrics
        .record_inference_duration(start.elapsed().as_millis() as u64, ROUTE);

    Ok(ResponseStream::png(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_router, config::MattingParams, remover::tests::*, BackgroundRemover};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use service_core::config::InferenceConfig;
    use std::{sync::atomic::Ordering, time::Duration};
    use tower::ServiceExt;

    const BOUNDARY: &str = "matting-test-boundary";

    fn multipart_request(field: &str, file_name: Option<&str>, data: &[u8]) -> Request<Body> {
        let disposition = match file_name {
            Some(name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field),
        };

        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::post("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn router(network: Arc<CenterSaliency>) -> Router {
        let remover =
            BackgroundRemover::new(network, MattingParams::default(), Duration::from_secs(10));
        let metrics = Arc::new(Metrics::new("matting_test").unwrap());
        build_router(remover, metrics, &InferenceConfig::default())
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn detail(response: Response) -> String {
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        json["detail"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_valid_png_is_matted() {
        let network = Arc::new(CenterSaliency::default());
        let response = router(network.clone())
            .oneshot(multipart_request("file", Some("cat.png"), &png_bytes(64, 48)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let body = body_bytes(response).await;
        assert!(!body.is_empty());
        let decoded = image::load_from_memory(&body).unwrap();
        assert!(decoded.color().has_alpha());
        assert!(decoded.to_rgba8().get_pixel(32, 24)[3] > 200);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_extension_is_rejected_without_inference() {
        let network = Arc::new(CenterSaliency::default());
        let response = router(network.clone())
            .oneshot(multipart_request("file", Some("cat.txt"), &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            detail(response).await,
            "Invalid file format. Use 'png', 'jpg', 'jpeg' or 'webp'"
        );
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uppercase_extension_is_rejected() {
        let network = Arc::new(CenterSaliency::default());
        let response = router(network.clone())
            .oneshot(multipart_request("file", Some("CAT.PNG"), &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_png_is_internal_error() {
        let response = router(Arc::new(CenterSaliency::default()))
            .oneshot(multipart_request(
                "file",
                Some("cat.png"),
                b"these bytes are not an image",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(body, r#"{"detail":"Error processing image"}"#);
    }

    #[tokio::test]
    async fn test_same_upload_twice_is_byte_identical() {
        let app = router(Arc::new(CenterSaliency::default()));
        let image = png_bytes(50, 30);

        let first = app
            .clone()
            .oneshot(multipart_request("file", Some("cat.jpg"), &image))
            .await
            .unwrap();
        let second = app
            .oneshot(multipart_request("file", Some("cat.jpg"), &image))
            .await
            .unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(body_bytes(first).await, body_bytes(second).await);
    }

    #[tokio::test]
    async fn test_missing_field_is_client_error() {
        let network = Arc::new(CenterSaliency::default());
        let response = router(network.clone())
            .oneshot(multipart_request("image", Some("cat.png"), &png_bytes(8, 8)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(response).await, "Missing upload field 'file'");
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_multipart_request_is_client_error() {
        let response = router(Arc::new(CenterSaliency::default()))
            .oneshot(
                Request::post("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let remover = BackgroundRemover::new(
            Arc::new(CenterSaliency::default()),
            MattingParams::default(),
            Duration::from_secs(10),
        );
        let metrics = Arc::new(Metrics::new("matting_test").unwrap());
        let inference = InferenceConfig {
            timeout_secs: 10,
            max_upload_bytes: 1024,
        };
        let app = build_router(remover, metrics, &inference);

        let response = app
            .oneshot(multipart_request("file", Some("big.png"), &vec![7u8; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_is_served() {
        let response = router(Arc::new(CenterSaliency::default()))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

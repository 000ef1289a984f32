use crate::{
    config::Config,
    embedder::SamEmbedder,
    model_service::EmbeddingService,
    routes::{api_routes, SharedState},
};
use axum::Router;
use service_core::{
    config::InferenceConfig,
    routes::core_routes,
    server::{with_common_layers, HttpServer},
    telemetry::Metrics,
    ModelSession,
};
use std::sync::Arc;

const SERVICE_NAME: &str = "segmentation_service";

pub fn build_router<E: EmbeddingService>(
    embedding_service: E,
    metrics: Arc<Metrics>,
    inference: &InferenceConfig,
) -> Router {
    let state = SharedState {
        embedding_service: Arc::new(embedding_service),
        metrics: metrics.clone(),
    };

    let router = api_routes::<E>()
        .with_state(state)
        .merge(core_routes(metrics));

    with_common_layers(router, inference.max_upload_bytes)
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let session = ModelSession::initialize(&config.model)?;
    tracing::info!(
        "Image encoder {:?} ready on {}",
        session.model_path(),
        session.device()
    );

    let embedder = SamEmbedder::new(Arc::new(session), config.inference.timeout());
    let metrics = Arc::new(Metrics::new(SERVICE_NAME)?);
    let router = build_router(embedder, metrics, &config.inference);

    let server = HttpServer::bind(router, &config.server).await?;
    server.run().await?;

    Ok(())
}

use crate::{
    config::Config,
    model_service::MattingService,
    remover::BackgroundRemover,
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

const SERVICE_NAME: &str = "matting_service";

pub fn build_router<M: MattingService>(
    matting_service: M,
    metrics: Arc<Metrics>,
    inference: &InferenceConfig,
) -> Router {
    let state = SharedState {
        matting_service: Arc::new(matting_service),
        metrics: metrics.clone(),
    };

    let router = api_routes::<M>()
        .with_state(state)
        .merge(core_routes(metrics));

    with_common_layers(router, inference.max_upload_bytes)
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let session = ModelSession::initialize(&config.model)?;
    tracing::info!(
        "Matting model {:?} ready on {}",
        session.model_path(),
        session.device()
    );

    let remover = BackgroundRemover::new(
        Arc::new(session),
        config.matting.clone(),
        config.inference.timeout(),
    );
    let metrics = Arc::new(Metrics::new(SERVICE_NAME)?);
    let router = build_router(remover, metrics, &config.inference);

    let server = HttpServer::bind(router, &config.server).await?;
    server.run().await?;

    Ok(())
}

use matting_service::{config::get_configuration, start_app};
use service_core::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_configuration()?;
    init_tracing(&config.log_level);

    start_app(config).await
}

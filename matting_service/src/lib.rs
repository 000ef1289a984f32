mod app;
mod matting;
mod model_service;
mod remover;
mod routes;
mod validation;

pub mod config;

pub use app::{build_router, start_app};
pub use model_service::MattingService;
pub use remover::BackgroundRemover;
pub use routes::UPLOAD_FIELD;

mod app;
mod decode;
mod embedder;
mod model_service;
mod npy;
mod predictor;
mod routes;

pub mod config;

pub use app::{build_router, start_app};
pub use embedder::SamEmbedder;
pub use model_service::{Embedding, EmbeddingService};
pub use npy::encode_npy;
pub use predictor::{preprocess_shape, SamPredictor};
pub use routes::{EMBEDDING_FILENAME, UPLOAD_FIELD};

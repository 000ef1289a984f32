use async_trait::async_trait;
use bytes::Bytes;
use ndarray::ArrayD;
use service_core::ServiceError;

/// Encoder features of one image, with the sizes recorded while encoding.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub features: ArrayD<f32>,
    /// `(height, width)` of the decoded upload.
    pub original_size: (u32, u32),
    /// `(height, width)` after the longest-side resize, before padding.
    pub input_size: (u32, u32),
}

#[async_trait]
pub trait EmbeddingService: Send + Sync + 'static {
    /// Decodes `image` and returns its embedding. Undecodable input is a
    /// client error, anything after decoding an inference error.
    async fn embed(&self, image: Bytes) -> Result<Embedding, ServiceError>;
}

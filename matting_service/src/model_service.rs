use async_trait::async_trait;
use bytes::Bytes;
use service_core::InferenceError;

#[async_trait]
pub trait MattingService: Send + Sync + 'static {
    /// Returns a PNG with the background made transparent.
    async fn remove_background(&self, image: Bytes) -> Result<Bytes, InferenceError>;
}

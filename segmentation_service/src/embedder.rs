use crate::{
    decode::decode_rgb,
    model_service::{Embedding, EmbeddingService},
    predictor::SamPredictor,
};
use async_trait::async_trait;
use bytes::Bytes;
use service_core::{
    invoke::run_blocking, Cancellation, InferenceError, ServiceError, TensorModel,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::instrument;

/// Image embeddings from a single shared predictor.
pub struct SamEmbedder<N: TensorModel> {
    predictor: Arc<Mutex<SamPredictor<N>>>,
    timeout: Duration,
}

impl<N: TensorModel> SamEmbedder<N> {
    pub fn new(network: Arc<N>, timeout: Duration) -> Self {
        Self {
            predictor: Arc::new(Mutex::new(SamPredictor::new(network))),
            timeout,
        }
    }

    pub fn embed_blocking(
        predictor: &Mutex<SamPredictor<N>>,
        image_data: &[u8],
        cancellation: &Cancellation,
    ) -> Result<Embedding, ServiceError> {
        let image = decode_rgb(image_data)?;

        // set_image and get_image_embedding must not interleave across requests
        let mut predictor = predictor
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;
        cancellation.check()?;
        predictor.set_image(&image, cancellation)?;
        let features = predictor.get_image_embedding()?;
        let original_size = predictor.original_size();
        let input_size = predictor.input_size();
        predictor.reset_image();
        drop(predictor);

        match (original_size, input_size) {
            (Some(original_size), Some(input_size)) => Ok(Embedding {
                features,
                original_size,
                input_size,
            }),
            _ => Err(InferenceError::NoImageSet.into()),
        }
    }
}

#[async_trait]
impl<N: TensorModel> EmbeddingService for SamEmbedder<N> {
    #[instrument(skip_all, fields(size = image.len()))]
    async fn embed(&self, image: Bytes) -> Result<Embedding, ServiceError> {
        let predictor = self.predictor.clone();

        let embedding = run_blocking(self.timeout, move |cancellation| {
            Self::embed_blocking(&predictor, &image, cancellation)
        })
        .await?;

        tracing::debug!(
            "Embedded image {:?} with shape {:?}",
            embedding.original_size,
            embedding.features.shape()
        );
        Ok(embedding)
    }
}

use crate::{
    config::MattingParams,
    matting::{cutout, encode_png, preprocess, refine_with_trimap, saliency_to_mask},
    model_service::MattingService,
};
use async_trait::async_trait;
use bytes::Bytes;
use service_core::{
    imaging::decode_image, invoke::run_blocking, Cancellation, InferenceError, TensorModel,
};
use std::{sync::Arc, time::Duration};
use tracing::instrument;

/// Background removal on top of a shared saliency network.
pub struct BackgroundRemover<N: TensorModel> {
    network: Arc<N>,
    params: MattingParams,
    timeout: Duration,
}

impl<N: TensorModel> BackgroundRemover<N> {
    pub fn new(network: Arc<N>, params: MattingParams, timeout: Duration) -> Self {
        Self {
            network,
            params,
            timeout,
        }
    }

    pub fn remove_background_blocking(
        network: &N,
        image_data: &[u8],
        params: &MattingParams,
        cancellation: &Cancellation,
    ) -> Result<Vec<u8>, InferenceError> {
        let image = decode_image(image_data).map_err(InferenceError::Decode)?;

        let input = preprocess(&image);
        let prediction = network.run(input.view(), cancellation)?;

        let mut mask = saliency_to_mask(&prediction, image.width(), image.height())?;
        if params.alpha_matting {
            mask = refine_with_trimap(&mask, params);
        }

        encode_png(&cutout(&image, &mask))
    }
}

#[async_trait]
impl<N: TensorModel> MattingService for BackgroundRemover<N> {
    #[instrument(skip_all, fields(size = image.len()))]
    async fn remove_background(&self, image: Bytes) -> Result<Bytes, InferenceError> {
        let network = self.network.clone();
        let params = self.params.clone();

        let png = run_blocking(self.timeout, move |cancellation| {
            Self::remove_background_blocking(&network, &image, &params, cancellation)
        })
        .await?;

        tracing::debug!("Produced {} bytes of PNG", png.len());
        Ok(Bytes::from(png))
    }
}

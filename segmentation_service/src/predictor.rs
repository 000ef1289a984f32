use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{Array4, ArrayD};
use service_core::{Cancellation, InferenceError, TensorModel};
use std::sync::Arc;

/// Side of the square encoder input.
pub const IMAGE_SIZE: u32 = 1024;

const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// `(height, width)` after scaling the longest side to `long_side`, rounded
/// to the nearest pixel.
pub fn preprocess_shape(height: u32, width: u32, long_side: u32) -> (u32, u32) {
    let scale = f64::from(long_side) / f64::from(height.max(width));
    let resize = |side: u32| ((f64::from(side) * scale + 0.5) as u32).clamp(1, long_side);
    (resize(height), resize(width))
}

/// Resizes (bilinear), normalizes with the encoder's pixel statistics and
/// zero-pads bottom/right into a `[1, 3, 1024, 1024]` tensor. Also returns the
/// resized `(height, width)`.
pub fn preprocess(image: &RgbImage) -> (Array4<f32>, (u32, u32)) {
    let (height, width) = preprocess_shape(image.height(), image.width(), IMAGE_SIZE);
    let resized = imageops::resize(image, width, height, FilterType::Triangle);

    let size = IMAGE_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            input[[0, c, y, x]] = (f32::from(pixel[c]) - PIXEL_MEAN[c]) / PIXEL_STD[c];
        }
    }

    (input, (height, width))
}

struct ImageState {
    features: ArrayD<f32>,
    original_size: (u32, u32),
    input_size: (u32, u32),
}

/// Holds the encoder and the features of the image last set on it.
///
/// `set_image` followed by `get_image_embedding` is a two-step protocol over
/// shared state; callers serialize access to a predictor.
pub struct SamPredictor<N: TensorModel> {
    network: Arc<N>,
    state: Option<ImageState>,
}

impl<N: TensorModel> SamPredictor<N> {
    pub fn new(network: Arc<N>) -> Self {
        Self {
            network,
            state: None,
        }
    }

    /// Runs the encoder on `image` and keeps its features.
    pub fn set_image(
        &mut self,
        image: &RgbImage,
        cancellation: &Cancellation,
    ) -> Result<(), InferenceError> {
        self.reset_image();

        let original_size = (image.height(), image.width());
        let (input, input_size) = preprocess(image);

        let features = self.network.run(input.view(), cancellation)?;
        if features.ndim() != 4 {
            return Err(InferenceError::Output(format!(
                "expected a 4-d embedding, got shape {:?}",
                features.shape()
            )));
        }

        tracing::debug!(
            "Encoded image {:?} resized to {:?}, embedding shape {:?}",
            original_size,
            input_size,
            features.shape()
        );

        self.state = Some(ImageState {
            features,
            original_size,
            input_size,
        });
        Ok(())
    }

    /// An owned copy of the features of the current image.
    pub fn get_image_embedding(&self) -> Result<ArrayD<f32>, InferenceError> {
        self.state
            .as_ref()
            .map(|state| state.features.clone())
            .ok_or(InferenceError::NoImageSet)
    }

    pub fn original_size(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|state| state.original_size)
    }

    pub fn input_size(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|state| state.input_size)
    }

    pub fn is_image_set(&self) -> bool {
        self.state.is_some()
    }

    pub fn reset_image(&mut self) {
        self.state = None;
    }
}

use image::RgbImage;
use service_core::{imaging::decode_image, ClientError};

/// Decodes an upload into 8-bit RGB. Every input is converted, whatever its
/// source colour type or bit depth.
pub fn decode_rgb(image_data: &[u8]) -> Result<RgbImage, ClientError> {
    let image = decode_image(image_data).map_err(|e| ClientError::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ClientError::Decode("image has no pixels".to_string()));
    }

    Ok(image.into_rgb8())
}

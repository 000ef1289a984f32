use image::{metadata::Orientation, DynamicImage, ImageDecoder, ImageReader, ImageResult};
use std::io::Cursor;

/// Decodes an encoded raster image, guessing the format from its contents and
/// applying the EXIF orientation when the decoder reports one.
pub fn decode_image(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);

    Ok(image)
}

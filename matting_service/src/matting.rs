use crate::config::MattingParams;
use image::{imageops, imageops::FilterType, DynamicImage, GrayImage, Luma, RgbaImage};
use ndarray::{Array4, ArrayD, Ix4};
use service_core::InferenceError;
use std::io::Cursor;

/// Side of the square saliency network input.
pub const MODEL_INPUT_SIZE: u32 = 320;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resizes to the network input, scales by the brightest channel value and
/// normalizes with ImageNet statistics into a `[1, 3, 320, 320]` tensor.
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, FilterType::Lanczos3);

    let max_value = resized.as_raw().iter().copied().max().unwrap_or(0);
    let scale = (max_value as f32).max(1e-6);

    let size = MODEL_INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            input[[0, c, y, x]] = (pixel[c] as f32 / scale - MEAN[c]) / STD[c];
        }
    }

    input
}

/// Turns the raw saliency map (`[1, 1, H, W]`, first channel used) into an
/// 8-bit mask at `width` x `height`, min-max normalized.
pub fn saliency_to_mask(
    prediction: &ArrayD<f32>,
    width: u32,
    height: u32,
) -> Result<GrayImage, InferenceError> {
    let prediction = prediction.view().into_dimensionality::<Ix4>()?;
    let (batch, channels, mask_height, mask_width) = prediction.dim();
    if batch == 0 || channels == 0 || mask_height == 0 || mask_width == 0 {
        return Err(InferenceError::Output(format!(
            "empty saliency map of shape {:?}",
            prediction.shape()
        )));
    }

    let plane = prediction.slice(ndarray::s![0, 0, .., ..]);
    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let mask = GrayImage::from_fn(mask_width as u32, mask_height as u32, |x, y| {
        let value = plane[[y as usize, x as usize]];
        let normalized = if range > f32::EPSILON {
            (value - min) / range
        } else {
            0.0
        };
        Luma([(normalized * 255.0).clamp(0.0, 255.0) as u8])
    });

    if mask.dimensions() == (width, height) {
        return Ok(mask);
    }
    Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
}

/// Trimap refinement. Eroded sure-foreground becomes opaque, eroded
/// sure-background transparent; the unknown band keeps the soft mask.
pub fn refine_with_trimap(mask: &GrayImage, params: &MattingParams) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);

    let is_foreground: Vec<bool> = mask
        .as_raw()
        .iter()
        .map(|&v| u16::from(v) > params.foreground_threshold)
        .collect();
    let is_background: Vec<bool> = mask
        .as_raw()
        .iter()
        .map(|&v| v < params.background_threshold)
        .collect();

    let size = params.erode_size as usize;
    let is_foreground = erode(&is_foreground, w, h, size, false);
    let is_background = erode(&is_background, w, h, size, true);

    let refined = mask
        .as_raw()
        .iter()
        .zip(is_foreground.iter().zip(is_background.iter()))
        .map(|(&v, (&fg, &bg))| match (fg, bg) {
            (true, _) => 255,
            (false, true) => 0,
            (false, false) => v,
        })
        .collect();

    GrayImage::from_raw(width, height, refined).unwrap_or_else(|| mask.clone())
}

/// Binary erosion with a `size` x `size` square, done as a row pass then a
/// column pass. Pixels outside the image count as `border`.
fn erode(mask: &[bool], width: usize, height: usize, size: usize, border: bool) -> Vec<bool> {
    if size <= 1 || mask.is_empty() {
        return mask.to_vec();
    }

    let mut rows = Vec::with_capacity(mask.len());
    for row in mask.chunks(width) {
        rows.extend(erode_line(row, size, border));
    }

    let mut out = vec![false; mask.len()];
    let mut column = Vec::with_capacity(height);
    for x in 0..width {
        column.clear();
        column.extend((0..height).map(|y| rows[y * width + x]));
        for (y, value) in erode_line(&column, size, border).into_iter().enumerate() {
            out[y * width + x] = value;
        }
    }

    out
}

fn erode_line(line: &[bool], size: usize, border: bool) -> Vec<bool> {
    let n = line.len();
    let before = size / 2;
    let after = size - 1 - before;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for &v in line {
        prefix.push(prefix[prefix.len() - 1] + usize::from(v));
    }

    (0..n)
        .map(|i| {
            let out_of_bounds = i < before || i + after >= n;
            if out_of_bounds && !border {
                return false;
            }
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            prefix[hi + 1] - prefix[lo] == hi - lo + 1
        })
        .collect()
}

/// Composites the source over transparent black through `mask`.
pub fn cutout(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
        let m = u16::from(alpha[0]);
        for channel in pixel.0.iter_mut() {
            *channel = ((u16::from(*channel) * m + 127) / 255) as u8;
        }
    }
    rgba
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, InferenceError> {
    let mut buffer: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| InferenceError::Encode(e.to_string()))?;
    Ok(buffer)
}
